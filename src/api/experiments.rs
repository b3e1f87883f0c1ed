//! Experiment endpoints: registration, assignment, conversions and queries

use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::experiment::{Experiment, ExperimentId, Variation, VariationId};
use crate::infrastructure::services::RegisterExperimentRequest;

// ============================================================================
// Request Types
// ============================================================================

/// Request to register an experiment
#[derive(Debug, Clone, Deserialize)]
pub struct CreateExperimentApiRequest {
    pub name: String,
    /// Variation names, created in this order
    #[serde(default)]
    pub variations: Vec<String>,
}

// ============================================================================
// Response Types
// ============================================================================

/// Experiment with its variations and current counters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentResponse {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub variations: Vec<VariationResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariationResponse {
    pub id: i64,
    pub experiment_id: i64,
    pub name: String,
    pub participants: u64,
    pub conversions: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentResponse {
    pub variation_id: i64,
    pub variation_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResponse {
    pub message: String,
}

impl From<&Variation> for VariationResponse {
    fn from(variation: &Variation) -> Self {
        Self {
            id: variation.id().value(),
            experiment_id: variation.experiment_id().value(),
            name: variation.name().to_string(),
            participants: variation.participants(),
            conversions: variation.conversions(),
            created_at: variation.created_at(),
        }
    }
}

impl From<&Experiment> for ExperimentResponse {
    fn from(experiment: &Experiment) -> Self {
        Self {
            id: experiment.id().value(),
            name: experiment.name().to_string(),
            created_at: experiment.created_at(),
            variations: experiment
                .variations()
                .iter()
                .map(VariationResponse::from)
                .collect(),
        }
    }
}

// ============================================================================
// Path parsing
// ============================================================================

// No entity can carry a non-positive or non-numeric ID, so those are lookups
// that miss.
fn parse_experiment_id(raw: &str) -> Result<ExperimentId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::not_found(format!("Experiment '{}' not found", raw)))
}

fn parse_variation_id(raw: &str) -> Result<VariationId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::not_found(format!("Variation '{}' not found", raw)))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/experiments
pub async fn list_experiments(
    State(state): State<AppState>,
) -> Result<Json<Vec<ExperimentResponse>>, ApiError> {
    debug!("Listing experiments");

    let experiments = state.experiment_service.list().await?;

    Ok(Json(
        experiments.iter().map(ExperimentResponse::from).collect(),
    ))
}

/// POST /api/experiments
pub async fn create_experiment(
    State(state): State<AppState>,
    Json(request): Json<CreateExperimentApiRequest>,
) -> Result<(StatusCode, Json<ExperimentResponse>), ApiError> {
    debug!(name = %request.name, "Creating experiment");

    let experiment = state
        .experiment_service
        .register(RegisterExperimentRequest {
            name: request.name,
            variation_names: request.variations,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ExperimentResponse::from(&experiment)),
    ))
}

/// GET /api/experiments/{id}
pub async fn get_experiment(
    State(state): State<AppState>,
    Path(experiment_id): Path<String>,
) -> Result<Json<ExperimentResponse>, ApiError> {
    let id = parse_experiment_id(&experiment_id)?;
    let experiment = state.experiment_service.get(&id).await?;

    Ok(Json(ExperimentResponse::from(&experiment)))
}

/// GET|POST /api/experiments/{id}/assign
pub async fn assign_variation(
    State(state): State<AppState>,
    Path(experiment_id): Path<String>,
) -> Result<Json<AssignmentResponse>, ApiError> {
    let id = parse_experiment_id(&experiment_id)?;
    let assignment = state.experiment_service.assign(&id).await?;

    Ok(Json(AssignmentResponse {
        variation_id: assignment.variation_id().value(),
        variation_name: assignment.variation_name().to_string(),
    }))
}

/// GET /api/variations/{id}
pub async fn get_variation(
    State(state): State<AppState>,
    Path(variation_id): Path<String>,
) -> Result<Json<VariationResponse>, ApiError> {
    let id = parse_variation_id(&variation_id)?;
    let variation = state.experiment_service.get_variation(&id).await?;

    Ok(Json(VariationResponse::from(&variation)))
}

/// POST /api/variations/{id}/convert
pub async fn record_conversion(
    State(state): State<AppState>,
    Path(variation_id): Path<String>,
) -> Result<Json<ConversionResponse>, ApiError> {
    let id = parse_variation_id(&variation_id)?;
    state.experiment_service.record_conversion(&id).await?;

    Ok(Json(ConversionResponse {
        message: "Conversion recorded".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_deserialization() {
        let json = r#"{"name": "Button Color", "variations": ["Red", "Blue"]}"#;

        let request: CreateExperimentApiRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.name, "Button Color");
        assert_eq!(request.variations, vec!["Red", "Blue"]);
    }

    #[test]
    fn test_create_request_without_variations() {
        let request: CreateExperimentApiRequest =
            serde_json::from_str(r#"{"name": "Bare"}"#).unwrap();
        assert!(request.variations.is_empty());
    }

    #[test]
    fn test_experiment_response_is_camel_case() {
        let exp_id = ExperimentId::new(1).unwrap();
        let experiment = Experiment::new(exp_id, "Button Color").with_variation(
            Variation::new(VariationId::new(2).unwrap(), exp_id, "Red").with_counts(3, 1),
        );

        let json = serde_json::to_value(ExperimentResponse::from(&experiment)).unwrap();

        assert_eq!(json["id"], 1);
        assert_eq!(json["name"], "Button Color");
        assert!(json.get("createdAt").is_some());
        assert_eq!(json["variations"][0]["id"], 2);
        assert_eq!(json["variations"][0]["experimentId"], 1);
        assert_eq!(json["variations"][0]["participants"], 3);
        assert_eq!(json["variations"][0]["conversions"], 1);
        assert!(json["variations"][0].get("createdAt").is_some());
    }

    #[test]
    fn test_assignment_response_shape() {
        let response = AssignmentResponse {
            variation_id: 4,
            variation_name: "Blue".to_string(),
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["variationId"], 4);
        assert_eq!(json["variationName"], "Blue");
    }

    #[test]
    fn test_bad_path_ids_are_not_found() {
        for raw in ["abc", "0", "-5", "1.5", ""] {
            let err = parse_experiment_id(raw).unwrap_err();
            assert_eq!(err.status, StatusCode::NOT_FOUND);

            let err = parse_variation_id(raw).unwrap_err();
            assert_eq!(err.status, StatusCode::NOT_FOUND);
        }
    }
}
