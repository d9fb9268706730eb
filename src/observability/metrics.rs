//! Metrics collection and exposition.
//!
//! # Metrics
//! - `service_control_requests_total` (counter): control requests by kind
//! - `service_status` (gauge): 1=start_pending, 2=running, 3=stop_pending, 4=stopped
//! - `service_shutdown_duration_seconds` (histogram): drain time by result
//! - `http_requests_total` (counter): requests by method, status
//! - `http_request_duration_seconds` (histogram): request latency
//!
//! Without an installed recorder every call here is a no-op.

use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::lifecycle::status::ServiceStatus;

/// Install the global Prometheus recorder.
///
/// The returned handle renders the scrape body; the HTTP server serves it.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    tracing::info!("Prometheus recorder installed");
    Ok(handle)
}

pub fn record_control_request(kind: &'static str) {
    counter!("service_control_requests_total", "request" => kind).increment(1);
}

pub fn record_status(status: ServiceStatus) {
    gauge!("service_status").set(status.as_gauge());
}

pub fn record_shutdown(elapsed: Duration, drained: bool) {
    let result = if drained { "drained" } else { "failed" };
    histogram!("service_shutdown_duration_seconds", "result" => result)
        .record(elapsed.as_secs_f64());
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("http_request_duration_seconds").record(start.elapsed().as_secs_f64());
}
