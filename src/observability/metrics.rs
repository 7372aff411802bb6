//! Metrics collection and exposition.
//!
//! # Metrics
//! - `vhost_operations_total` (counter): site operations by op, outcome
//! - `vhost_sync_steps_total` (counter): OS-side sync steps by step, outcome
//! - `vhost_command_duration_seconds` (histogram): external command latency
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so tests and the
//!   CLI never pay for it
//! - Labels are static strings only; domains are never used as labels

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Count a finished site operation. `outcome` is `synced`, `degraded` or `failed`.
pub fn record_operation(op: &'static str, outcome: &'static str) {
    ::metrics::counter!("vhost_operations_total", "op" => op, "outcome" => outcome).increment(1);
}

pub fn record_sync_step(step: &'static str, ok: bool) {
    let outcome = if ok { "ok" } else { "failed" };
    ::metrics::counter!("vhost_sync_steps_total", "step" => step, "outcome" => outcome).increment(1);
}

pub fn record_command(command: &'static str, started: Instant) {
    ::metrics::histogram!("vhost_command_duration_seconds", "command" => command)
        .record(started.elapsed().as_secs_f64());
}
