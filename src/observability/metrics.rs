//! Metrics collection and exposition.
//!
//! # Metrics
//! - `route_requests_total` (counter): dispatched requests by route, method, status
//! - `route_request_duration_seconds` (histogram): handler latency by route, method
//!
//! # Design Decisions
//! - Labels use the route template, never the concrete path
//! - The exporter serves its own scrape endpoint on a separate address

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const REQUESTS_TOTAL: &str = "route_requests_total";
pub const REQUEST_DURATION: &str = "route_request_duration_seconds";

/// Install the Prometheus recorder and its HTTP listener on `addr`.
///
/// Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one dispatched request.
pub fn record_dispatch(method: &str, route: &str, status: u16, start: Instant) {
    counter!(
        REQUESTS_TOTAL,
        "route" => route.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        REQUEST_DURATION,
        "route" => route.to_string(),
        "method" => method.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}
