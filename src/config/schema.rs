//! Configuration schema definitions.

use serde::{Deserialize, Serialize};

/// Root configuration for the muxd daemon.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MuxdConfig {
    /// HTTP listener settings.
    pub http: HttpListenerConfig,

    /// DNS listener settings.
    pub dns: DnsListenerConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind_address: String,
}

impl Default for HttpListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
        }
    }
}

/// DNS listener configuration (UDP).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DnsListenerConfig {
    /// Bind address (e.g., "127.0.0.1:5353").
    pub bind_address: String,
}

impl Default for DnsListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:5353".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default tracing filter when RUST_LOG is not set.
    pub log_filter: String,

    /// Whether to expose a Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Prometheus exporter bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "polymux=debug".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9100".to_string(),
        }
    }
}
