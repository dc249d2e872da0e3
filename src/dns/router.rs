//! DNS router: the adapter façade over the generic core.

use std::sync::Arc;

use hickory_proto::rr::{DNSClass, RecordType};
use tracing::warn;

use crate::error::RouterError;
use crate::router;

use super::handler::{compose, ArcHandler, Handler, Request, ResponseWriter, FORMAT_ERROR, SERVER_FAILURE};
use super::middleware::{ArcMiddleware, Middleware};
use super::route::Route;
use super::zone::ZoneNode;
use super::CloseHandle;

/// Concurrent DNS mux over reversed qname, qtype and qclass, with
/// zone-aware matching.
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
            core: router::Router::new(ZoneNode::breed()),
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
                    let mut tokens = k.tokens();
                    tokens.reverse();
                    route.name = tokens.join(".");
                }
                if let Some(k) = chain.get(1) {
                    route.rtype = k.join(".");
                }
                if let Some(k) = chain.get(2) {
                    route.class = k.join(".");
                }
                route
            })
            .collect()
    }

    /// Returns the composed handler for a route, with the zone cascade
    /// already applied by the matcher.
    pub fn handler_for(&self, route: &Route) -> ArcHandler {
        match route.to_keys() {
            Ok(keys) => compose(self.core.match_route(&keys)),
            Err(err) => {
                warn!(route = %route, error = %err, "route parse failed during match");
                Arc::new(SERVER_FAILURE)
            }
        }
    }

    /// Serves a query. Missing questions and ANY-type or ANY-class
    /// queries are refused with FormatError; queries matching no zone
    /// handler at all are Refused by the composed default.
    pub fn serve_dns(&self, w: &mut ResponseWriter, req: &Request) {
        let Some(query) = req.query() else {
            FORMAT_ERROR.serve_dns(w, req);
            return;
        };

        let rtype = query.query_type();
        let class = query.query_class();
        if rtype == RecordType::ANY || class == DNSClass::ANY {
            FORMAT_ERROR.serve_dns(w, req);
            return;
        }

        let route = Route {
            name: query.name().to_utf8().to_lowercase(),
            rtype: rtype.to_string(),
            class: class.to_string(),
            literal: true,
        };
        self.handler_for(&route).serve_dns(w, req);
    }
}
