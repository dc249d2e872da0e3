//! HTTP router: the adapter façade over the generic core.

use std::sync::Arc;

use tracing::warn;

use crate::error::RouterError;
use crate::router::{self, Key, MatchedLeaf};

use super::handler::{
    capture_vars, internal_error, not_found, ArcHandler, Handler, MultiHandler, Request,
    ResponseWriter,
};
use super::middleware::{ArcMiddleware, Middleware};
use super::route::Route;
use super::CloseHandle;

/// Concurrent HTTP mux over scheme, method, host and path.
pub struct Router {
    core: router::Router<ArcHandler, ArcMiddleware>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self {
            core: router::Router::with_radix_nodes(),
        }
    }

    /// See [`router::Router::set_disable_dup_route`].
    pub fn set_disable_dup_route(&self, disable: bool) {
        self.core.set_disable_dup_route(disable);
    }

    /// Registers a handler under the route.
    pub fn handle(
        &self,
        route: Route,
        handler: impl Handler + 'static,
    ) -> Result<CloseHandle, RouterError> {
        let keys = route.to_keys()?;
        self.core.handle(&keys, vec![Arc::new(handler)])
    }

    /// Registers middleware under the route.
    pub fn wrap(
        &self,
        route: Route,
        middleware: impl Middleware + 'static,
    ) -> Result<CloseHandle, RouterError> {
        let keys = route.to_keys()?;
        self.core.wrap(&keys, vec![Arc::new(middleware)])
    }

    /// Every registered route, read back from the tree.
    pub fn routes(&self) -> Vec<Route> {
        self.core
            .routes()
            .into_iter()
            .map(|chain| {
                let mut route = Route::default();
                if let Some(k) = chain.first() {
                    route.scheme = k.join(".");
                }
                if let Some(k) = chain.get(1) {
                    route.method = k.join(".");
                }
                if let Some(k) = chain.get(2) {
                    route.host = k.join(".");
                }
                if let Some(k) = chain.get(3) {
                    route.path = k.join("/");
                }
                route
            })
            .collect()
    }

    /// Returns the composed handler for a route: handlers from every
    /// matched leaf in specificity order, wrapped by a vars-capturing
    /// middleware and by all middleware collected along the match.
    pub fn handler_for(&self, route: &Route) -> ArcHandler {
        match route.to_keys() {
            Ok(keys) => compose(&keys, self.core.match_route(&keys)),
            Err(err) => {
                warn!(route = %route, error = %err, "route parse failed during match");
                internal_error(err.to_string())
            }
        }
    }

    /// Serves a request: builds the literal route, matches, dispatches.
    /// Unmatched requests get a 404 response.
    pub fn serve(&self, w: &mut ResponseWriter, req: &Request) {
        let route = Route::from_request(req);
        self.handler_for(&route).serve_http(w, req);
    }
}

fn compose(route: &[Key], matches: Vec<MatchedLeaf<ArcHandler, ArcMiddleware>>) -> ArcHandler {
    let mut handlers = Vec::new();
    let mut middleware: Vec<ArcMiddleware> = Vec::new();

    if let Some(first) = matches.first() {
        // Request variables come from the most specific match.
        middleware.push(capture_vars(first, route));
    }
    for m in &matches {
        handlers.extend(m.handlers.iter().cloned());
    }
    for m in &matches {
        middleware.extend(m.middleware.iter().cloned());
    }

    let mut handler: ArcHandler = if handlers.is_empty() {
        not_found()
    } else {
        Arc::new(MultiHandler(handlers))
    };
    // First-collected middleware wraps last, so outer scopes wrap inner
    // handlers.
    for mw in middleware.iter().rev() {
        handler = mw.wrap(handler);
    }
    handler
}
