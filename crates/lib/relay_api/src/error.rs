//! Application error types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use relay_core::relay::RelayError;
use thiserror::Error;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Prefix of every 500 response body.
pub const INTERNAL_ERROR_PREFIX: &str = "Internal Server Error: ";

/// Application-level errors with HTTP status mapping.
///
/// Bodies are plain text. Upstream failures answer with a fixed message; the
/// underlying error is only logged.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Agent service call failed.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Local failure with no upstream involved; currently only the OpenAPI
    /// YAML serialization in `GET /api/openapi.yaml`.
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, m),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            AppError::Configuration(m) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("{INTERNAL_ERROR_PREFIX}{m}"),
            ),
            AppError::Upstream(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("{INTERNAL_ERROR_PREFIX}agent service request failed."),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("{INTERNAL_ERROR_PREFIX}unexpected error."),
            ),
        };
        (status, body).into_response()
    }
}

impl From<RelayError> for AppError {
    fn from(e: RelayError) -> Self {
        match e {
            RelayError::AgentNotFound(_) => AppError::NotFound(e.to_string()),
            RelayError::Service(inner) => AppError::Upstream(inner.to_string()),
        }
    }
}
