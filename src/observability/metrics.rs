//! Metrics collection and exposition.
//!
//! # Metrics
//! - `outbound_calls_total` (counter): outbound calls by outcome
//! - `outbound_call_duration_seconds` (histogram): outbound call latency
//! - `queries_total` (counter): statements by outcome
//! - `query_duration_seconds` (histogram): statement latency
//! - `http_requests_total` (counter): inbound requests by status
//! - `http_request_duration_seconds` (histogram): inbound latency
//!
//! Recording is a no-op until an exporter is installed.

use std::net::SocketAddr;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_call(outcome: &'static str, elapsed_secs: f64) {
    counter!("outbound_calls_total", "outcome" => outcome).increment(1);
    histogram!("outbound_call_duration_seconds", "outcome" => outcome).record(elapsed_secs);
}

pub fn record_query(outcome: &'static str, elapsed_secs: f64) {
    counter!("queries_total", "outcome" => outcome).increment(1);
    histogram!("query_duration_seconds").record(elapsed_secs);
}

pub fn record_request(status: u16, elapsed_secs: f64) {
    counter!("http_requests_total", "status" => status.to_string()).increment(1);
    histogram!("http_request_duration_seconds").record(elapsed_secs);
}
