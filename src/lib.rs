//! polymux — a multi-protocol request muxer.
//!
//! The core is a generic, concurrent, glob-patterned radix router
//! ([`router`]): routes are ordered sequences of keys, one per routing
//! dimension, stored in nested compressed radix trees whose edge labels
//! are literals or compiled globs. Handlers and middleware are opaque
//! values registered and removed concurrently, with reference-counted
//! cleanup of emptied branches.
//!
//! Two protocol adapters sit on top of the core:
//!
//! - [`http`]: four dimensions (scheme, method, host, path), wildcard
//!   capture exposed through request vars.
//! - [`dns`]: three dimensions (reversed qname, qtype, qclass), with
//!   zone-file semantics — CNAME chasing, NS glue, SOA fallback —
//!   injected as middleware at match time.
//!
//! The remaining modules carry the daemon's ambient concerns:
//! [`config`], [`observability`] and [`lifecycle`].

pub mod config;
pub mod dns;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod router;

pub use error::RouterError;
