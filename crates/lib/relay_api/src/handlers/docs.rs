//! OpenAPI YAML endpoint. The JSON description and Swagger UI are served by
//! `utoipa-swagger-ui`, merged in [`crate::router`].

use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::error::{AppError, AppResult};
use crate::openapi;

/// `GET /api/openapi.yaml` — OpenAPI description as YAML.
pub async fn openapi_yaml() -> AppResult<Response> {
    let yaml = serde_yaml::to_string(&openapi::document())
        .inspect_err(|e| error!(error = %e, "OpenAPI YAML serialization failed"))
        .map_err(|e| AppError::Internal(format!("OpenAPI YAML serialization failed: {e}")))?;
    Ok(([(CONTENT_TYPE, "application/x-yaml")], yaml).into_response())
}
