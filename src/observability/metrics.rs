//! Metrics collection and exposition.
//!
//! # Metrics
//! - `bridge_requests_total` (counter): inbound requests by route, status
//! - `bridge_request_duration_seconds` (histogram): inbound latency
//! - `bridge_upstream_requests_total` (counter): upstream calls by endpoint, outcome
//! - `bridge_upstream_duration_seconds` (histogram): upstream latency
//! - `bridge_persisted_parts_total` (counter): parts written, by kind
//! - `bridge_persisted_bytes_total` (counter): bytes written to workspaces
//!
//! Without an installed recorder every call is a no-op, so handlers and
//! tests never need to know whether the exporter runs.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(route: &str, status: u16, start: Instant) {
    let route = route.to_string();
    let status = status.to_string();
    counter!("bridge_requests_total", "route" => route.clone(), "status" => status.clone()).increment(1);
    histogram!("bridge_request_duration_seconds", "route" => route, "status" => status)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_upstream(endpoint: &str, outcome: &'static str, start: Instant) {
    let endpoint = endpoint.to_string();
    counter!("bridge_upstream_requests_total", "endpoint" => endpoint.clone(), "outcome" => outcome)
        .increment(1);
    histogram!("bridge_upstream_duration_seconds", "endpoint" => endpoint, "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_persisted(kind: &'static str, bytes: u64) {
    counter!("bridge_persisted_parts_total", "kind" => kind).increment(1);
    counter!("bridge_persisted_bytes_total").increment(bytes);
}
