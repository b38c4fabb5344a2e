use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use mediaproxy_core::error::CoreError;
use mediaproxy_processor::{ErrorClass, JobError};
use mediaproxy_storage::StorageError;

use crate::response::ApiResponse;

/// Application-level error type for HTTP handlers.
///
/// Every variant renders as the standard `{status, message, data}` envelope
/// with `data: null`. Server-side failures are logged and reported with a
/// generic message.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `mediaproxy_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A job that was rejected, failed or timed out.
    #[error(transparent)]
    Job(#[from] JobError),

    /// The processed output could not be stored.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A malformed request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The request body exceeded the configured upload limit.
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

const INTERNAL_MESSAGE: &str = "An internal error occurred";

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
                CoreError::InputTooLarge { .. } => (StatusCode::BAD_REQUEST, core.to_string()),
                CoreError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
                CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE.to_string())
                }
            },

            // --- Job outcomes ---
            AppError::Job(job) => match job.class() {
                ErrorClass::Input => (StatusCode::BAD_REQUEST, job.to_string()),
                ErrorClass::Admission => {
                    tracing::warn!(error = %job, "Job rejected");
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "Service is shutting down".to_string(),
                    )
                }
                ErrorClass::Timeout => {
                    tracing::warn!(error = %job, "Job timed out");
                    (
                        StatusCode::GATEWAY_TIMEOUT,
                        "Processing timed out".to_string(),
                    )
                }
                ErrorClass::Transform => {
                    tracing::error!(error = %job, "Job failed");
                    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE.to_string())
                }
            },

            // --- Storage ---
            AppError::Storage(err) => {
                tracing::error!(error = %err, "Storage error");
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE.to_string())
            }

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE.to_string())
            }
        };

        let body = ApiResponse::<()>::error(status, message);
        (status, Json(body)).into_response()
    }
}
