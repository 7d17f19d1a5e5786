//! Metrics collection and exposition.
//!
//! # Metrics
//! - `cluster_workers_live` (gauge): workers currently alive
//! - `cluster_worker_respawns_total` (counter): replacements by role
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade and is a no-op until a
//!   recorder is installed
//! - Only the primary installs the Prometheus exporter, so only what the
//!   primary records is exported; per-request timings go to the logs

use std::net::SocketAddr;
use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter with an HTTP listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn set_live_workers(count: usize) {
    gauge!("cluster_workers_live").set(count as f64);
}

pub fn record_worker_respawn(role: &'static str) {
    counter!("cluster_worker_respawns_total", "role" => role).increment(1);
}
