//! Observability infrastructure - Prometheus metrics

mod metrics;

pub use metrics::{
    create_metrics_router, init_metrics, record_assignment, record_conversion,
    record_http_request, record_registration, PrometheusMetrics,
};
