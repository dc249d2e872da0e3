//! HTTP middleware values.

use std::sync::Arc;

use super::handler::ArcHandler;

/// Wraps a handler, returning a new handler. Middleware collected at
/// outer route scopes wraps handlers registered at inner scopes.
pub trait Middleware: Send + Sync {
    fn wrap(&self, next: ArcHandler) -> ArcHandler;
}

pub type ArcMiddleware = Arc<dyn Middleware>;

impl<F> Middleware for F
where
    F: Fn(ArcHandler) -> ArcHandler + Send + Sync,
{
    fn wrap(&self, next: ArcHandler) -> ArcHandler {
        self(next)
    }
}
