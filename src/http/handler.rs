//! HTTP handler values and the buffered response writer.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use http::header::HOST;
use http::{Extensions, HeaderMap, Method, Response, StatusCode, Uri};

use crate::router::{Key, MatchedLeaf};

use super::middleware::ArcMiddleware;

/// An already-parsed HTTP request. Cheap to clone; middleware clones it
/// to attach per-request extensions.
#[derive(Clone, Debug, Default)]
pub struct Request {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub extensions: Extensions,
}

impl Request {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            ..Self::default()
        }
    }

    /// The request scheme, defaulting to `http` for origin-form URIs.
    pub fn scheme(&self) -> &str {
        self.uri.scheme_str().unwrap_or("http")
    }

    /// The request host with any port stripped, from the URI authority or
    /// the Host header.
    pub fn host(&self) -> &str {
        if let Some(host) = self.uri.host() {
            return host;
        }
        self.headers
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .map(strip_port)
            .unwrap_or("")
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }
}

fn strip_port(host: &str) -> &str {
    // Bracketed IPv6 literals keep their brackets.
    if let Some(end) = host.rfind(']') {
        return &host[..=end];
    }
    match host.rsplit_once(':') {
        Some((h, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => h,
        _ => host,
    }
}

/// Buffered response: headers may be mutated freely, but the first status
/// or body write marks the response written, which stops a
/// [`MultiHandler`] chain.
#[derive(Debug)]
pub struct ResponseWriter {
    status: StatusCode,
    headers: HeaderMap,
    body: BytesMut,
    written: bool,
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: BytesMut::new(),
            written: false,
        }
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Sets the response status. Only the first call takes effect.
    pub fn write_status(&mut self, status: StatusCode) {
        if !self.written {
            self.status = status;
        }
        self.written = true;
    }

    /// Appends body bytes, marking the response written.
    pub fn write(&mut self, bytes: &[u8]) {
        self.written = true;
        self.body.extend_from_slice(bytes);
    }

    pub fn written(&self) -> bool {
        self.written
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_response(self) -> Response<Bytes> {
        let mut response = Response::new(self.body.freeze());
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// An HTTP request responder.
pub trait Handler: Send + Sync {
    fn serve_http(&self, w: &mut ResponseWriter, req: &Request);
}

pub type ArcHandler = Arc<dyn Handler>;

impl<F> Handler for F
where
    F: Fn(&mut ResponseWriter, &Request) + Send + Sync,
{
    fn serve_http(&self, w: &mut ResponseWriter, req: &Request) {
        self(w, req)
    }
}

/// Runs handlers in order until one of them writes a response.
pub struct MultiHandler(pub Vec<ArcHandler>);

impl Handler for MultiHandler {
    fn serve_http(&self, w: &mut ResponseWriter, req: &Request) {
        for handler in &self.0 {
            if w.written() {
                break;
            }
            handler.serve_http(w, req);
        }
    }
}

/// Wildcard captures for the current request: `[0]` is the matched
/// pattern key, later entries the tokens each non-literal slot absorbed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Vars {
    pub host: Vec<String>,
    pub path: Vec<String>,
}

/// The route variables attached to a request by the matcher.
pub fn vars(req: &Request) -> Vars {
    req.extensions.get::<Vars>().cloned().unwrap_or_default()
}

/// Middleware exposing the matched leaf's captures through [`vars`]. The
/// captures come from the most specific match only.
pub(super) fn capture_vars(
    matched: &MatchedLeaf<ArcHandler, ArcMiddleware>,
    route: &[Key],
) -> ArcMiddleware {
    let mut value = Vars::default();

    let path_key = matched.leaf.key();
    value.path.push(path_key.join("/"));
    if let Some(input) = route.last() {
        for group in path_key.capture(input) {
            value.path.push(group.join("/"));
        }
    }

    if let (Some(host_leaf), true) = (matched.leaf.up(), route.len() >= 2) {
        let host_key = host_leaf.key();
        value.host.push(host_key.join("."));
        for group in host_key.capture(&route[route.len() - 2]) {
            value.host.push(group.join("."));
        }
    }

    Arc::new(move |next: ArcHandler| -> ArcHandler {
        let value = value.clone();
        Arc::new(move |w: &mut ResponseWriter, req: &Request| {
            let mut req = req.clone();
            req.extensions.insert(value.clone());
            next.serve_http(w, &req);
        })
    })
}

pub(super) fn not_found() -> ArcHandler {
    Arc::new(|w: &mut ResponseWriter, _: &Request| {
        w.write_status(StatusCode::NOT_FOUND);
        w.write(b"404 page not found\n");
    })
}

pub(super) fn internal_error(message: String) -> ArcHandler {
    Arc::new(move |w: &mut ResponseWriter, _: &Request| {
        w.write_status(StatusCode::INTERNAL_SERVER_ERROR);
        w.write(message.as_bytes());
        w.write(b"\n");
    })
}
