//! Metrics collection and exposition.
//!
//! # Metrics
//! - `compat_requests_total` (counter): requests by method, status
//! - `compat_request_duration_seconds` (histogram): end-to-end latency
//! - `compat_bootstrap_total` (counter): handshakes by outcome
//! - `compat_sessions` (gauge): session mapping entries

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "compat_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("compat_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

/// `outcome` is `established` or a bootstrap failure reason tag.
pub fn record_bootstrap(outcome: &'static str) {
    counter!("compat_bootstrap_total", "outcome" => outcome).increment(1);
}

pub fn record_sessions(count: usize) {
    gauge!("compat_sessions").set(count as f64);
}
