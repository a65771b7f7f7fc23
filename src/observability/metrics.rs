//! Metrics collection and exposition.
//!
//! # Metrics
//! - `ssr_requests_total` (counter): render-phase requests by outcome, mode
//! - `ssr_render_duration_seconds` (histogram): fall-through to response write
//! - `ssr_module_loads_total` (counter): server entry loads by mode
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - The Prometheus exporter is opt-in via config

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::config::Mode;

/// Install the Prometheus recorder with an HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record a finished render-phase request.
pub fn record_render(mode: Mode, outcome: &'static str, start: Instant) {
    counter!(
        "ssr_requests_total",
        "mode" => mode.as_str(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("ssr_render_duration_seconds", "mode" => mode.as_str())
        .record(start.elapsed().as_secs_f64());
}

/// Record one server entry load.
pub fn record_module_load(mode: Mode) {
    counter!("ssr_module_loads_total", "mode" => mode.as_str()).increment(1);
}
