// crates/server/src/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use curation_export_jobs::{ExportError, JobId};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Structured JSON error response for API errors
#[derive(Debug, Serialize, ToSchema)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

/// API error types that map to HTTP status codes
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Export job not found: {0}")]
    JobNotFound(JobId),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<ExportError> for ApiError {
    fn from(err: ExportError) -> Self {
        match &err {
            ExportError::JobNotFound(id) => ApiError::JobNotFound(*id),
            ExportError::ProjectNotSet | ExportError::FormatNotSet => {
                ApiError::BadRequest(err.to_string())
            }
            ExportError::AlreadyFinished(_) => ApiError::Conflict(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            ApiError::JobNotFound(id) => {
                tracing::warn!(job_id = %id, "Export job not found");
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse::with_details("Export job not found", format!("Job ID: {}", id)),
                )
            }
            ApiError::BadRequest(msg) => {
                tracing::warn!(message = %msg, "Bad request");
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::with_details("Bad request", msg.clone()),
                )
            }
            ApiError::Conflict(msg) => {
                tracing::warn!(message = %msg, "Conflict");
                (
                    StatusCode::CONFLICT,
                    ErrorResponse::with_details("Conflict", msg.clone()),
                )
            }
            ApiError::Internal(msg) => {
                tracing::error!(message = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("Internal server error"),
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    /// Helper to extract status code and body from a response
    async fn extract_response(response: Response) -> (StatusCode, ErrorResponse) {
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let error_response: ErrorResponse = serde_json::from_slice(&body).unwrap();
        (status, error_response)
    }

    #[tokio::test]
    async fn test_job_not_found_returns_404() {
        let response = ApiError::JobNotFound(17).into_response();
        let (status, body) = extract_response(response).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error, "Export job not found");
        assert!(body.details.unwrap().contains("17"));
    }

    #[tokio::test]
    async fn test_missing_project_returns_400() {
        let response = ApiError::from(ExportError::ProjectNotSet).into_response();
        let (status, body) = extract_response(response).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "Bad request");
        assert!(body.details.unwrap().contains("no target project"));
    }

    #[tokio::test]
    async fn test_already_finished_returns_409() {
        let response = ApiError::from(ExportError::AlreadyFinished(4)).into_response();
        let (status, body) = extract_response(response).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.error, "Conflict");
    }

    #[tokio::test]
    async fn test_internal_error_hides_details() {
        let response = ApiError::Internal("lock poisoned".to_string()).into_response();
        let (status, body) = extract_response(response).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Internal server error");
        assert!(body.details.is_none());
    }

    #[test]
    fn test_job_not_found_maps_from_export_error() {
        assert!(matches!(
            ApiError::from(ExportError::JobNotFound(8)),
            ApiError::JobNotFound(8)
        ));
    }
}
