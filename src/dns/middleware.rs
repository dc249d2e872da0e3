//! DNS middleware values.

use std::sync::Arc;

use super::handler::ArcHandler;

/// Wraps a handler, returning a new handler. The zone matcher injects
/// CNAME/NS/SOA middleware through this trait at match time.
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
