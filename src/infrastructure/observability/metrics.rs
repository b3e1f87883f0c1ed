//! Prometheus metrics

use std::time::Duration;

use axum::{extract::State, response::IntoResponse, routing::get, Router};
use metrics::{counter, describe_counter, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::config::MetricsConfig;

/// Handle onto the installed recorder
#[derive(Clone)]
pub struct PrometheusMetrics {
    handle: PrometheusHandle,
}

impl PrometheusMetrics {
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Installs the global recorder
///
/// Returns `None` when disabled, or when a recorder is already installed.
pub fn init_metrics(config: &MetricsConfig) -> Option<PrometheusMetrics> {
    if !config.enabled {
        tracing::info!("Prometheus metrics disabled");
        return None;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            describe_metrics();
            gauge!("ab_testing_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
            tracing::info!(path = %config.path, "Prometheus metrics initialized");

            Some(PrometheusMetrics { handle })
        }
        Err(e) => {
            tracing::error!("Failed to initialize Prometheus metrics: {}", e);
            None
        }
    }
}

fn describe_metrics() {
    describe_counter!("http_requests_total", "HTTP requests by method, route and status");
    describe_histogram!(
        "http_request_duration_seconds",
        Unit::Seconds,
        "HTTP request latency"
    );
    describe_counter!("http_server_errors_total", "HTTP responses with a 5xx status");
    describe_counter!("experiment_registrations_total", "Experiments registered");
    describe_histogram!(
        "experiment_variations_per_registration",
        Unit::Count,
        "Variations per registered experiment"
    );
    describe_counter!(
        "experiment_assignments_total",
        "Participants assigned to a variation"
    );
    describe_counter!("experiment_conversions_total", "Conversions recorded");
}

/// Serves the rendered registry at `path`
pub fn create_metrics_router(metrics: PrometheusMetrics, path: &str) -> Router {
    Router::new()
        .route(path, get(render_metrics))
        .with_state(metrics)
}

async fn render_metrics(State(metrics): State<PrometheusMetrics>) -> impl IntoResponse {
    metrics.render()
}

pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!("http_requests_total", &labels).increment(1);
    histogram!("http_request_duration_seconds", &labels).record(duration.as_secs_f64());

    if status >= 500 {
        counter!("http_server_errors_total", &labels).increment(1);
    }
}

pub fn record_registration(variations: usize) {
    counter!("experiment_registrations_total").increment(1);
    histogram!("experiment_variations_per_registration").record(variations as f64);
}

pub fn record_assignment() {
    counter!("experiment_assignments_total").increment(1);
}

pub fn record_conversion() {
    counter!("experiment_conversions_total").increment(1);
}

/// Replace numeric path segments so raw IDs never become label values
fn sanitize_path(path: &str) -> String {
    let path = path
        .split('/')
        .map(|segment| {
            if !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit()) {
                "{id}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/");

    if path.len() > 50 {
        path.chars().take(50).collect()
    } else {
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path_numeric_id() {
        assert_eq!(
            sanitize_path("/api/experiments/123/assign"),
            "/api/experiments/{id}/assign"
        );
        assert_eq!(
            sanitize_path("/api/variations/7/convert"),
            "/api/variations/{id}/convert"
        );
    }

    #[test]
    fn test_sanitize_path_keeps_route_patterns() {
        assert_eq!(
            sanitize_path("/api/experiments/{id}/assign"),
            "/api/experiments/{id}/assign"
        );
        assert_eq!(sanitize_path("/health"), "/health");
        assert_eq!(sanitize_path("/api/experiments/v2"), "/api/experiments/v2");
    }

    #[test]
    fn test_sanitize_path_truncates_long_paths() {
        let path = "/very/long/path/that/exceeds/the/maximum/allowed/length/for/metrics";
        assert!(sanitize_path(path).len() <= 50);
    }
}
