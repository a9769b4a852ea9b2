//! Metrics collection and exposition.
//!
//! # Metrics
//! - `server_connections_accepted_total` (counter)
//! - `server_connections_closed_total` (counter): labelled by close `reason`
//! - `server_active_connections` (gauge): current connection count
//! - `server_bytes_received_total` / `server_bytes_sent_total` (counters)
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade and is a no-op until a
//!   recorder is installed, so library users and tests pay nothing
//! - The Prometheus exporter is only installed by the binary, on request
//! - The active gauge moves by deltas in the same places the live counter
//!   does, never by writing a snapshot

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const CONNECTIONS_ACCEPTED: &str = "server_connections_accepted_total";
pub const CONNECTIONS_CLOSED: &str = "server_connections_closed_total";
pub const ACTIVE_CONNECTIONS: &str = "server_active_connections";
pub const BYTES_RECEIVED: &str = "server_bytes_received_total";
pub const BYTES_SENT: &str = "server_bytes_sent_total";

/// Install the Prometheus recorder with an HTTP scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    describe();
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

fn describe() {
    ::metrics::describe_counter!(CONNECTIONS_ACCEPTED, "Connections accepted");
    ::metrics::describe_counter!(CONNECTIONS_CLOSED, "Connections torn down, by reason");
    ::metrics::describe_gauge!(ACTIVE_CONNECTIONS, "Connections currently open");
    ::metrics::describe_counter!(BYTES_RECEIVED, "Bytes read from peers");
    ::metrics::describe_counter!(BYTES_SENT, "Bytes written to peers");
}

pub fn record_accepted() {
    ::metrics::counter!(CONNECTIONS_ACCEPTED).increment(1);
}

pub fn record_closed(reason: &'static str) {
    ::metrics::counter!(CONNECTIONS_CLOSED, "reason" => reason).increment(1);
}

/// Applied alongside every change to the live-connection counter, as a delta
/// so concurrent accepts and closes cannot leave a stale snapshot behind.
pub fn record_slot_acquired() {
    ::metrics::gauge!(ACTIVE_CONNECTIONS).increment(1.0);
}

pub fn record_slot_released() {
    ::metrics::gauge!(ACTIVE_CONNECTIONS).decrement(1.0);
}

pub fn record_received(bytes: usize) {
    ::metrics::counter!(BYTES_RECEIVED).increment(bytes as u64);
}

pub fn record_sent(bytes: usize) {
    ::metrics::counter!(BYTES_SENT).increment(bytes as u64);
}
