//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use catwatch_examiner::ExaminerError;
use serde::Serialize;
use thiserror::Error;

/// API errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed payload.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The examiner stopped accepting events.
    #[error("examiner unavailable")]
    Unavailable,

    /// Examiner error.
    #[error("examiner error: {0}")]
    Examiner(#[from] ExaminerError),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Unavailable => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
            ApiError::Examiner(_) => (StatusCode::INTERNAL_SERVER_ERROR, "examiner_error"),
        };

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        };

        (status, axum::Json(body)).into_response()
    }
}

/// Result type for API operations.
pub type Result<T> = std::result::Result<T, ApiError>;
