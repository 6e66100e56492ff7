//! Service middleware for metrics and request tracking.
//!
//! ## Metrics Exposed
//!
//! - `query_gateway_requests_total` - Counter of total requests by path, method, status
//! - `query_gateway_request_duration_seconds` - Histogram of request latency
//! - `query_gateway_admissions_total` - Counter of admission outcomes by code

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::info;

/// Metrics middleware that records request counts and latency.
///
/// Uses tracing for now - can be upgraded to prometheus metrics later.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status().as_u16();

    info!(
        target: "query_gateway::metrics",
        metric_type = "request",
        path = %path,
        method = %method,
        status = status,
        latency_ms = latency.as_millis() as u64,
        "request_metric"
    );

    response
}

/// Record an admission outcome.
///
/// Call this after the pipeline decides, with the code it decided with.
pub fn record_admission(admitted: bool, code: &str) {
    info!(
        target: "query_gateway::metrics",
        metric_type = "admission",
        admitted = admitted,
        code = code,
        "admission_metric"
    );
}
