//! HTTP metrics middleware

use std::time::Instant;

use axum::{body::Body, http::Request, middleware::Next, response::Response};

use super::route_label;
use crate::infrastructure::observability::record_http_request;

/// Paths polled by infrastructure rather than clients
const UNTRACKED_PATHS: [&str; 4] = ["/health", "/ready", "/live", "/metrics"];

/// Records count, latency and server errors per method, route and status
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let path = route_label(&request);

    if UNTRACKED_PATHS.contains(&path.as_str()) {
        return next.run(request).await;
    }

    let start = Instant::now();
    let method = request.method().clone();

    let response = next.run(request).await;

    record_http_request(
        method.as_str(),
        &path,
        response.status().as_u16(),
        start.elapsed(),
    );

    response
}
