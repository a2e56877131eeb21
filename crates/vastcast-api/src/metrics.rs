//! Prometheus metrics for the API server.

use std::sync::LazyLock;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use regex::Regex;

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "vastcast_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "vastcast_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "vastcast_http_requests_in_flight";

    // Pipeline metrics
    pub const RENDERS_TOTAL: &str = "vastcast_renders_total";
    pub const RENDER_DURATION_SECONDS: &str = "vastcast_render_duration_seconds";
    pub const RESOLUTIONS_TOTAL: &str = "vastcast_resolutions_total";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "vastcast_rate_limit_hits_total";
}

static ARTIFACT_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/generated/[^/]+$").expect("valid artifact path pattern"));

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a finished render by terminal state.
pub fn record_render(outcome: &str, duration_secs: f64) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::RENDERS_TOTAL, &labels).increment(1);
    histogram!(names::RENDER_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a clickthrough resolution (`resolved` or `degraded`).
pub fn record_resolution(outcome: &str) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::RESOLUTIONS_TOTAL, &labels).increment(1);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", endpoint.to_string())];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// Collapse per-artifact paths so label cardinality stays bounded.
fn sanitize_path(path: &str) -> String {
    ARTIFACT_PATH.replace(path, "/generated/:filename").into_owned()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    record_http_request(&method, &path, response.status().as_u16(), start.elapsed().as_secs_f64());

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(
            sanitize_path("/generated/output_Nike_1a2b3c4d.mp4"),
            "/generated/:filename"
        );
        assert_eq!(sanitize_path("/api/convert"), "/api/convert");
        assert_eq!(sanitize_path("/health"), "/health");
    }
}
