//! HTTP request metrics
//!
//! Records `kms_http_requests_total` (counter) and
//! `kms_http_request_duration_seconds` (histogram) for every request.

use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};

/// Labels use the matched route template, so `/api/keys/7` and `/api/keys/8`
/// share one series.
pub async fn track_http_metrics(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|mp| mp.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let start = Instant::now();
    let response = next.run(request).await;
    let elapsed = start.elapsed().as_secs_f64();

    let status = response.status().as_u16().to_string();
    metrics::counter!(
        "kms_http_requests_total",
        "method" => method.clone(),
        "path" => path.clone(),
        "status" => status
    )
    .increment(1);
    metrics::histogram!("kms_http_request_duration_seconds", "method" => method, "path" => path)
        .record(elapsed);

    response
}
