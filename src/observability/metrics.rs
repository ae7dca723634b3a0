//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): by method, status, outcome
//! - `proxy_request_duration_seconds` (histogram)
//! - `proxy_cache_lookups_total` (counter): by result (hit/miss)
//! - `proxy_blocked_requests_total` (counter)
//! - `proxy_malformed_requests_total` (counter)
//! - `proxy_upstream_errors_total` (counter): by kind
//! - `proxy_store_errors_total` (counter): by store
//! - `proxy_active_connections` (gauge)
//!
//! Without an installed recorder every call is a no-op.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its scrape endpoint.
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a completed request.
pub fn record_request(method: &str, status: u16, outcome: &'static str, start: Instant) {
    counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("proxy_request_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("proxy_cache_lookups_total", "result" => result).increment(1);
}

pub fn record_blocked() {
    counter!("proxy_blocked_requests_total").increment(1);
}

pub fn record_malformed() {
    counter!("proxy_malformed_requests_total").increment(1);
}

pub fn record_upstream_error(kind: &'static str) {
    counter!("proxy_upstream_errors_total", "kind" => kind).increment(1);
}

pub fn record_store_error(store: &'static str) {
    counter!("proxy_store_errors_total", "store" => store).increment(1);
}

pub fn set_active_connections(count: u64) {
    gauge!("proxy_active_connections").set(count as f64);
}
