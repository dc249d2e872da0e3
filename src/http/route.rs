//! HTTP route components.

use std::fmt;

use crate::error::RouterError;
use crate::router::{Key, Route as CoreRoute};

use super::handler::Request;

/// The four HTTP route components. Empty components default to the
/// wildcards key `**` when registered or matched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Route {
    pub scheme: String,
    pub method: String,
    pub host: String,
    pub path: String,
    /// Treat every component as literal text, skipping glob compilation.
    /// Set when matching a real request against a pattern-populated tree.
    pub literal: bool,
}

impl Route {
    /// Builds a route constraining only the path.
    pub fn path(s: impl Into<String>) -> Self {
        Self {
            path: s.into(),
            ..Self::default()
        }
    }

    /// Builds a route matching everything under a path prefix.
    pub fn path_prefix(s: &str) -> Self {
        Self::path(format!("{}/*", s.trim_end_matches('/')))
    }

    pub(crate) fn from_request(req: &Request) -> Self {
        Self {
            scheme: req.scheme().to_string(),
            method: req.method.as_str().to_string(),
            host: req.host().to_string(),
            path: req.path().to_string(),
            literal: true,
        }
    }

    /// Compiles the components into the core route: one key per
    /// dimension, in scheme/method/host/path order.
    pub(crate) fn to_keys(&self) -> Result<CoreRoute, RouterError> {
        let scheme = normalize(&self.scheme, Case::Lower);
        let method = normalize(&self.method, Case::Upper);
        let host = normalize(&self.host, Case::Lower);
        let path = normalize(&self.path, Case::Lower);

        let single = |s: String| -> Result<Key, RouterError> {
            if self.literal {
                Ok(Key::literal_tokens([s]))
            } else {
                Key::pattern_tokens([s])
            }
        };
        let split = |s: String, sep: char| -> Result<Key, RouterError> {
            if self.literal {
                Ok(Key::literal(&s, sep))
            } else {
                Key::pattern(&s, sep)
            }
        };

        Ok(vec![
            single(scheme)?,
            single(method)?,
            split(host, '.')?,
            split(path, '/')?,
        ])
    }
}

enum Case {
    Lower,
    Upper,
}

fn normalize(s: &str, case: Case) -> String {
    if s.is_empty() {
        return "**".to_string();
    }
    match case {
        Case::Lower => s.to_lowercase(),
        Case::Upper => s.to_uppercase(),
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let method = if self.method.is_empty() { "*" } else { &self.method };
        let scheme = if self.scheme.is_empty() { "*" } else { &self.scheme };
        let host = if self.host.is_empty() { "**" } else { &self.host };
        let path = if self.path.is_empty() { "/**" } else { &self.path };
        write!(f, "{method} {scheme}://{host}{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_fills_omitted_components() {
        assert_eq!(Route::default().to_string(), "* *://**/**");
        assert_eq!(Route::path("/").to_string(), "* *://**/");
        assert_eq!(Route::path("/v1/x").to_string(), "* *://**/v1/x");
        let full = Route {
            scheme: "https".into(),
            method: "GET".into(),
            host: "example.com".into(),
            path: "/v1".into(),
            literal: false,
        };
        assert_eq!(full.to_string(), "GET https://example.com/v1");
    }

    #[test]
    fn keys_default_to_wildcards() {
        let keys = Route::path("/v1").to_keys().unwrap();
        assert_eq!(keys.len(), 4);
        assert!(keys[0].is_wildcards());
        assert!(keys[1].is_wildcards());
        assert!(keys[2].is_wildcards());
        assert_eq!(keys[3].tokens(), ["", "v1"]);
    }

    #[test]
    fn path_splits_and_lowercases() {
        let keys = Route {
            method: "get".into(),
            path: "/V1/X".into(),
            ..Route::default()
        }
        .to_keys()
        .unwrap();
        assert_eq!(keys[1].tokens(), ["GET"]);
        assert_eq!(keys[3].tokens(), ["", "v1", "x"]);
    }

    #[test]
    fn path_prefix_appends_glob() {
        assert_eq!(Route::path_prefix("/static").path, "/static/*");
        assert_eq!(Route::path_prefix("/static/").path, "/static/*");
    }

    #[test]
    fn literal_routes_skip_compilation() {
        let keys = Route {
            path: "/v[2-3]".into(),
            literal: true,
            ..Route::default()
        }
        .to_keys()
        .unwrap();
        assert!(keys[3].labels().iter().all(|l| l.is_literal()));
    }
}
