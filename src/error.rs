use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::models::job::JobStatus;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid transition: {from:?} -> {to:?}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    /// Caller is not the driver assigned to this job.
    #[error("verification failed")]
    NotAssigned,

    /// Supplied code does not match. Retryable; nothing is consumed.
    #[error("verification failed")]
    InvalidCode,

    #[error("no eligible driver")]
    NoEligibleDriver,

    /// Lost the race on the atomic assignment write.
    #[error("job was assigned concurrently")]
    ConcurrentAssignment,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::InvalidTransition { .. } => (StatusCode::CONFLICT, self.to_string()),
            // One opaque body for both, so a caller cannot probe whether a
            // code was close or the job/driver pairing was wrong.
            AppError::NotAssigned | AppError::InvalidCode => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "verification failed".to_string(),
            ),
            AppError::NoEligibleDriver => (
                StatusCode::SERVICE_UNAVAILABLE,
                "no eligible driver".to_string(),
            ),
            AppError::ConcurrentAssignment => (StatusCode::CONFLICT, self.to_string()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
