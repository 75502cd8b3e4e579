//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): calls by outcome
//! - `gateway_request_duration_seconds` (histogram): session latency
//! - `gateway_fetch_bytes` (histogram): size of fetched bodies
//! - `gateway_connections_dropped_total` (counter): banned sources dropped
//! - `gateway_bans_issued_total` (counter)
//! - `gateway_workers` (gauge): live workers
//! - `gateway_worker_exits_total` (counter): worker exits by reason

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one finished call.
pub fn record_outcome(outcome: &'static str, start: Instant) {
    counter!("gateway_requests_total", "outcome" => outcome).increment(1);
    histogram!("gateway_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_fetch_bytes(len: usize) {
    histogram!("gateway_fetch_bytes").record(len as f64);
}

pub fn record_connection_dropped() {
    counter!("gateway_connections_dropped_total").increment(1);
}

pub fn record_ban_issued() {
    counter!("gateway_bans_issued_total").increment(1);
}

pub fn record_workers(count: usize) {
    gauge!("gateway_workers").set(count as f64);
}

pub fn record_worker_exit(reason: &'static str) {
    counter!("gateway_worker_exits_total", "reason" => reason).increment(1);
}
