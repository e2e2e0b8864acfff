//! HTTP-facing error type for trailmark-engine

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Missing or bad credentials (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Rejected state change (409) - e.g., email already registered
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Transient contention that survived a retry (503)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<trailmark_common::Error> for ApiError {
    fn from(err: trailmark_common::Error) -> Self {
        use trailmark_common::Error;
        match err {
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::InvalidState(msg) => ApiError::InvalidState(msg),
            Error::Conflict(msg) => ApiError::Conflict(msg),
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            Error::ExpiredCredential(msg) => ApiError::Unauthorized(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ApiError::InvalidState(msg) => (StatusCode::CONFLICT, "INVALID_STATE", msg),
            ApiError::Conflict(msg) => (StatusCode::SERVICE_UNAVAILABLE, "CONFLICT", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Other(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        use trailmark_common::Error;
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (Error::NotFound("x".into()).into(), StatusCode::NOT_FOUND),
            (Error::InvalidState("x".into()).into(), StatusCode::CONFLICT),
            (
                Error::Conflict("x".into()).into(),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (Error::InvalidInput("x".into()).into(), StatusCode::BAD_REQUEST),
            (
                Error::ExpiredCredential("x".into()).into(),
                StatusCode::UNAUTHORIZED,
            ),
            (
                Error::Internal("x".into()).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
