//! Request logging and request IDs

use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tracing::{debug, info, warn};

use super::route_label;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest caller-supplied ID accepted before a fresh one is generated
const MAX_REQUEST_ID_LEN: usize = 128;

/// Correlation ID for one request
#[derive(Debug, Clone, PartialEq, Eq)]
struct RequestId(String);

impl RequestId {
    fn from_request(request: &Request<Body>) -> Self {
        let supplied = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|s| !s.is_empty() && s.len() <= MAX_REQUEST_ID_LEN);

        match supplied {
            Some(id) => Self(id.to_string()),
            None => Self(uuid::Uuid::new_v4().to_string()),
        }
    }
}

/// Logs each request once it completes and echoes `x-request-id`
///
/// Server errors are logged at warn so they stand out from normal traffic.
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let route = route_label(&request);
    let request_id = RequestId::from_request(&request);

    debug!(%method, %route, request_id = %request_id.0, "Request received");

    let mut response = next.run(request).await;

    let status = response.status().as_u16();
    let elapsed_ms = started.elapsed().as_millis() as u64;

    if response.status().is_server_error() {
        warn!(%method, %route, status, elapsed_ms, request_id = %request_id.0, "Request failed");
    } else {
        info!(%method, %route, status, elapsed_ms, request_id = %request_id.0, "Request handled");
    }

    if let Ok(value) = HeaderValue::from_str(&request_id.0) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}
