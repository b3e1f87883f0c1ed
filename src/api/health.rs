//! Probe endpoints

use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;

use super::state::AppState;
use crate::api::types::Json;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Up,
    Down,
}

impl ProbeStatus {
    fn status_code(self) -> StatusCode {
        match self {
            Self::Up => StatusCode::OK,
            Self::Down => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Body of `/health` and `/ready`
#[derive(Debug, Serialize)]
pub struct ProbeReport {
    pub status: ProbeStatus,
    pub version: &'static str,
    /// Present on `/ready` only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<StoreProbe>,
}

#[derive(Debug, Serialize)]
pub struct StoreProbe {
    pub status: ProbeStatus,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct PingResponse {
    pub message: &'static str,
}

/// Dashboard connectivity check
pub async fn ping() -> impl IntoResponse {
    Json(PingResponse { message: "pong" })
}

/// Process is up; dependencies are not consulted
pub async fn health_check() -> impl IntoResponse {
    Json(ProbeReport {
        status: ProbeStatus::Up,
        version: VERSION,
        store: None,
    })
}

/// 503 while the experiment store cannot answer
pub async fn ready_check(State(state): State<AppState>) -> impl IntoResponse {
    let store = probe_store(&state).await;
    let status = store.status;

    (
        status.status_code(),
        Json(ProbeReport {
            status,
            version: VERSION,
            store: Some(store),
        }),
    )
}

pub async fn live_check() -> impl IntoResponse {
    StatusCode::OK
}

async fn probe_store(state: &AppState) -> StoreProbe {
    let start = Instant::now();
    let result = state.experiment_service.health_check().await;
    let latency_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(()) => StoreProbe {
            status: ProbeStatus::Up,
            latency_ms,
            error: None,
        },
        Err(e) => StoreProbe {
            status: ProbeStatus::Down,
            latency_ms,
            error: Some(e.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_status_codes() {
        assert_eq!(ProbeStatus::Up.status_code(), StatusCode::OK);
        assert_eq!(
            ProbeStatus::Down.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_report_serialization() {
        let report = ProbeReport {
            status: ProbeStatus::Down,
            version: "1.0.0",
            store: Some(StoreProbe {
                status: ProbeStatus::Down,
                latency_ms: 12,
                error: Some("Store unavailable: connection refused".to_string()),
            }),
        };

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "down");
        assert_eq!(json["store"]["latency_ms"], 12);
        assert!(json["store"]["error"]
            .as_str()
            .unwrap()
            .contains("connection refused"));
    }

    #[test]
    fn test_health_report_omits_store() {
        let report = ProbeReport {
            status: ProbeStatus::Up,
            version: "1.0.0",
            store: None,
        };

        let json = serde_json::to_string(&report).unwrap();
        assert_eq!(json, r#"{"status":"up","version":"1.0.0"}"#);
    }

    #[test]
    fn test_ping_response() {
        let json = serde_json::to_string(&PingResponse { message: "pong" }).unwrap();
        assert_eq!(json, r#"{"message":"pong"}"#);
    }
}
