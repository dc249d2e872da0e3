//! Metrics collection and exposition.

use std::net::SocketAddr;

use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Installs the Prometheus recorder and scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "metrics endpoint listening");
    Ok(())
}

/// Records one served HTTP request.
pub fn record_http_request(method: &str, status: u16) {
    counter!(
        "polymux_http_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
    )
    .increment(1);
}

/// Records one served DNS query.
pub fn record_dns_query(qtype: &str, rcode: &str) {
    counter!(
        "polymux_dns_queries_total",
        "qtype" => qtype.to_string(),
        "rcode" => rcode.to_string(),
    )
    .increment(1);
}
