//! Shared response envelope types for API handlers.
//!
//! Every response, success or error, is `{ "status", "message", "data" }`,
//! where `status` repeats the HTTP status code.

use axum::http::StatusCode;
use serde::Serialize;

/// Standard response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub status: u16,
    pub message: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// `200 ok` carrying `data`.
    pub fn ok(data: T) -> Self {
        Self {
            status: StatusCode::OK.as_u16(),
            message: "ok".to_string(),
            data: Some(data),
        }
    }

    /// Error envelope with `data: null`.
    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: status.as_u16(),
            message: message.into(),
            data: None,
        }
    }
}

/// Location of a stored output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathResponse {
    /// Storage locator (file path or object key).
    pub path: String,
    /// Public URL: the CDN host joined with `path`.
    pub url: String,
}
