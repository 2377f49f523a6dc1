//! Metrics collection and exposition.
//!
//! # Metrics
//! - `wsgate_handshakes_total` (counter): handshakes by outcome and reject reason
//! - `wsgate_active_connections` (gauge): open TCP connections, upgraded or not
//! - `wsgate_exchange_bytes_total` (counter): bytes through exchange loops by direction
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Labels are static strings only

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter with an HTTP scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()
}

/// Count one finished handshake.
pub fn record_handshake(outcome: &'static str, reason: &'static str) {
    ::metrics::counter!("wsgate_handshakes_total", "outcome" => outcome, "reason" => reason)
        .increment(1);
}

pub fn set_active_connections(count: u64) {
    ::metrics::gauge!("wsgate_active_connections").set(count as f64);
}

pub fn record_exchange_bytes(direction: &'static str, bytes: u64) {
    ::metrics::counter!("wsgate_exchange_bytes_total", "direction" => direction).increment(bytes);
}
