//! DNS route components.

use std::fmt;

use hickory_proto::rr::Record;

use crate::error::RouterError;
use crate::router::{Key, Route as CoreRoute};

/// The three DNS route components. An empty name means the root zone;
/// empty type and class default to `A` and `IN`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Route {
    pub name: String,
    pub rtype: String,
    pub class: String,
    /// Treat the name as literal text, skipping glob compilation. Set
    /// when matching a real query against a pattern-populated tree.
    pub literal: bool,
}

impl Route {
    /// Builds a route constraining only the query name.
    pub fn name(s: impl Into<String>) -> Self {
        Self {
            name: s.into().to_lowercase(),
            ..Self::default()
        }
    }

    /// Builds a route from a resource record's name, type and class.
    pub fn rr(record: &Record) -> Self {
        Self {
            name: record.name().to_utf8().to_lowercase(),
            rtype: record.record_type().to_string(),
            class: record.dns_class().to_string(),
            literal: false,
        }
    }

    /// Compiles the components into the core route: reversed name key,
    /// then single-token type and class keys.
    pub(crate) fn to_keys(&self) -> Result<CoreRoute, RouterError> {
        let tokens = name_tokens(&self.name.to_lowercase());
        let name_key = if self.literal {
            Key::literal_tokens(tokens)
        } else {
            Key::pattern_tokens(tokens)?
        };

        let rtype = default_upper(&self.rtype, "A");
        let class = default_upper(&self.class, "IN");

        Ok(vec![
            name_key,
            Key::literal_tokens([rtype]),
            Key::literal_tokens([class]),
        ])
    }
}

/// Splits a domain name into labels, appends the empty root label, and
/// reverses so the TLD becomes the key prefix.
fn name_tokens(name: &str) -> Vec<String> {
    let trimmed = name.trim_end_matches('.');
    if trimmed.is_empty() {
        return vec![String::new()];
    }
    let mut tokens: Vec<String> = trimmed.split('.').map(str::to_string).collect();
    tokens.push(String::new());
    tokens.reverse();
    tokens
}

fn default_upper(s: &str, default: &str) -> String {
    if s.is_empty() {
        default.to_string()
    } else {
        s.to_uppercase()
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = if self.name.is_empty() { "." } else { &self.name };
        let rtype = if self.rtype.is_empty() { "A" } else { &self.rtype };
        let class = if self.class.is_empty() { "IN" } else { &self.class };
        write!(f, "{name} {rtype} {class}")
    }
}
