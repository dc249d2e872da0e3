//! Observability: structured logging via tracing, request counters via
//! the metrics facade with a Prometheus exporter.
//!
//! The router core and adapters only *emit* (tracing events, counter
//! increments); initialization and exposition live here and are wired up
//! by the daemon.

pub mod logging;
pub mod metrics;
