//! Error types surfaced by route registration.

use thiserror::Error;

/// Errors returned when registering handlers or middleware.
///
/// Match-side failures never surface as errors; they fall through to the
/// protocol default handlers (HTTP 404/500, DNS RCODEs).
#[derive(Debug, Error)]
pub enum RouterError {
    /// A route component failed to compile as a glob pattern.
    #[error("invalid glob pattern {pattern:?}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    /// A handler is already registered under this route and duplicate
    /// routes are disabled.
    #[error("existed route")]
    ExistedRoute,
}
