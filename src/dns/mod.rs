//! DNS adapter: routes queries over three dimensions — reversed qname,
//! qtype and qclass — with zone-file semantics applied at match time.
//!
//! Names are split on `.` and reversed so the TLD sits at the tree root,
//! making zone delegation a prefix relationship. The zone node decorates
//! the generic matcher with the CNAME/NS/SOA cascade: missing RRsets fall
//! back to in-zone CNAME chasing, NS referrals with glue, and SOA
//! authority sections, all injected as middleware around the matched
//! handlers without ever mutating the tree.

pub mod handler;
pub mod middleware;
pub mod route;
pub mod router;
mod zone;

pub use handler::{
    ArcHandler, ErrorHandler, Handler, MultiHandler, Request, ResponseWriter, WriteError,
    FORMAT_ERROR, NAME_ERROR, NO_ERROR, REFUSED, SERVER_FAILURE,
};
pub use middleware::{ArcMiddleware, Middleware};
pub use route::Route;
pub use router::Router;

/// Removes one registration batch; see [`crate::router::CloseHandle`].
pub type CloseHandle = crate::router::CloseHandle<ArcHandler, ArcMiddleware>;
