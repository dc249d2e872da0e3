//! HTTP adapter: routes requests over four dimensions — scheme, method,
//! host and path.
//!
//! Host keys split on `.`, path keys on `/`; either may use in-token
//! globs (`v[2-3]`, `api-*`) or whole-key wildcards (`**`). Omitted route
//! components default to `**`, so registering only a path leaves scheme,
//! method and host unconstrained. Incoming requests are matched as
//! all-literal routes against the pattern tree; captured wildcard tokens
//! are exposed to handlers through [`vars`].

pub mod handler;
pub mod middleware;
pub mod route;
pub mod router;

pub use handler::{vars, ArcHandler, Handler, MultiHandler, Request, ResponseWriter, Vars};
pub use middleware::{ArcMiddleware, Middleware};
pub use route::Route;
pub use router::Router;

/// Removes one registration batch; see [`crate::router::CloseHandle`].
pub type CloseHandle = crate::router::CloseHandle<ArcHandler, ArcMiddleware>;
