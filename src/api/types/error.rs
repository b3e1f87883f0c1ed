//! API error envelope
//!
//! Every failure is rendered as
//! `{"error": {"message", "type", "param"?, "code"?}}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Value of the `type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorType {
    InvalidRequestError,
    NotFoundError,
    ServerError,
    ServiceUnavailableError,
}

impl ApiErrorType {
    /// Status used when the error is raised without an explicit one
    pub fn status(self) -> StatusCode {
        match self {
            Self::InvalidRequestError => StatusCode::BAD_REQUEST,
            Self::NotFoundError => StatusCode::NOT_FOUND,
            Self::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailableError => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: ApiErrorType,
    /// Request field at fault
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    /// Machine-readable reason, e.g. `duplicate_name`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub response: ApiErrorResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, error_type: ApiErrorType, message: impl Into<String>) -> Self {
        Self {
            status,
            response: ApiErrorResponse {
                error: ApiErrorDetail {
                    message: message.into(),
                    error_type,
                    param: None,
                    code: None,
                },
            },
        }
    }

    /// Error with the default status of its type
    pub fn of(error_type: ApiErrorType, message: impl Into<String>) -> Self {
        Self::new(error_type.status(), error_type, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::of(ApiErrorType::NotFoundError, message)
    }

    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.response.error.param = Some(param.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.response.error.code = Some(code.into());
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.response)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        use ApiErrorType::*;

        match err {
            DomainError::InvalidInput { message } => {
                Self::of(InvalidRequestError, message).with_code("invalid_input")
            }
            DomainError::DuplicateName { message } => Self::of(InvalidRequestError, message)
                .with_param("name")
                .with_code("duplicate_name"),
            DomainError::NotFound { message } => Self::of(NotFoundError, message),
            // Registration guarantees at least two arms, so this is a server fault
            DomainError::NoVariations { message } => {
                Self::of(ServerError, message).with_code("no_variations")
            }
            DomainError::StoreUnavailable { message } => {
                Self::of(ServiceUnavailableError, message).with_code("store_unavailable")
            }
            DomainError::Internal { message } => Self::of(ServerError, message),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.status.as_u16(), self.response.error.message)
    }
}

impl std::error::Error for ApiError {}
