//! Metrics middleware and Prometheus exposition.
//!
//! Request duration and throughput by endpoint, plus the `/metrics` handler
//! rendering everything recorded through the `metrics` facade (including the
//! queue's allocation and merge metrics).

use std::sync::OnceLock;
use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tally_core::{Error, Result};

// ============================================================================
// Metric Names
// ============================================================================

/// HTTP request duration histogram.
pub const HTTP_REQUEST_DURATION: &str = "tally_http_request_duration_seconds";

/// HTTP request counter.
pub const HTTP_REQUESTS_TOTAL: &str = "tally_http_requests_total";

const UNMATCHED_ENDPOINT: &str = "unmatched";

// ============================================================================
// Prometheus Recorder
// ============================================================================

static PROMETHEUS_HANDLE: OnceLock<std::result::Result<PrometheusHandle, String>> =
    OnceLock::new();

/// Installs the global Prometheus recorder and registers metric descriptions.
///
/// Safe to call multiple times; later calls return the same handle.
///
/// # Errors
///
/// Returns `Error::Configuration` if the recorder could not be installed
/// (for example because another recorder is already global).
pub fn init_metrics() -> Result<PrometheusHandle> {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .map_err(|e| format!("failed to install prometheus recorder: {e}"))?;

            describe_histogram!(HTTP_REQUEST_DURATION, "Duration of HTTP requests in seconds");
            describe_counter!(HTTP_REQUESTS_TOTAL, "Total number of HTTP requests");
            tally_queue::metrics::register_metrics();

            tracing::info!("Prometheus metrics recorder initialized");
            Ok(handle)
        })
        .clone()
        .map_err(Error::configuration)
}

/// Returns the global Prometheus handle, if initialized.
#[must_use]
pub fn prometheus_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE
        .get()
        .and_then(|handle| handle.as_ref().ok())
        .cloned()
}

// ============================================================================
// Metrics Middleware
// ============================================================================

pub(crate) fn endpoint_label<B>(request: &Request<B>) -> String {
    request.extensions().get::<MatchedPath>().map_or_else(
        || UNMATCHED_ENDPOINT.to_string(),
        |path| path.as_str().to_string(),
    )
}

/// Middleware that records request metrics.
///
/// Captures `tally_http_request_duration_seconds` and
/// `tally_http_requests_total`, both labelled by endpoint, method and status
/// class.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let path = endpoint_label(&request);
    let method = request.method().to_string();

    let response = next.run(request).await;

    let duration = start.elapsed().as_secs_f64();
    let status_class = status_class(response.status());
    let labels = [
        ("endpoint", path.clone()),
        ("method", method.clone()),
        ("status_class", status_class.to_string()),
    ];

    histogram!(HTTP_REQUEST_DURATION, &labels).record(duration);
    counter!(HTTP_REQUESTS_TOTAL, &labels).increment(1);

    // Sheets round trips dominate; anything past a few seconds is worth a log line.
    if duration > 5.0 {
        tracing::warn!(
            endpoint = %path,
            method = %method,
            status = response.status().as_u16(),
            duration_secs = duration,
            "Slow request detected"
        );
    }

    response
}

/// Returns the status class (2xx, 3xx, 4xx, 5xx) for a status code.
fn status_class(status: StatusCode) -> &'static str {
    match status.as_u16() {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "unknown",
    }
}

// ============================================================================
// Metrics Endpoint
// ============================================================================

/// Handler for the `/metrics` endpoint.
pub async fn serve_metrics() -> impl IntoResponse {
    prometheus_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain; charset=utf-8")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            (
                StatusCode::OK,
                [("content-type", "text/plain; charset=utf-8")],
                handle.render(),
            )
        },
    )
}
