//! Multipart parsing and result delivery shared by the upload handlers.

use std::collections::HashMap;

use axum::extract::multipart::{Multipart, MultipartError};
use axum::http::StatusCode;
use axum::Json;
use bytes::Bytes;
use mediaproxy_core::hashing::content_name;
use mediaproxy_processor::ResultFuture;

use crate::error::{AppError, AppResult};
use crate::response::{ApiResponse, PathResponse};
use crate::state::AppState;

/// Response type of every upload route.
pub type UploadResponse = Json<ApiResponse<PathResponse>>;

/// A parsed upload: the file part plus any text fields.
#[derive(Debug, Default)]
pub struct UploadForm {
    file: Option<Bytes>,
    fields: HashMap<String, String>,
}

impl UploadForm {
    /// Read every part of `multipart`. The part named `file_field` is kept
    /// as bytes; all other parts are read as text.
    pub async fn read(multipart: &mut Multipart, file_field: &str) -> AppResult<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or("").to_string();
            if name == file_field {
                form.file = Some(field.bytes().await.map_err(multipart_error)?);
            } else if !name.is_empty() {
                let text = field.text().await.map_err(multipart_error)?;
                form.fields.insert(name, text);
            }
        }

        Ok(form)
    }

    /// Take the file part, failing with 400 when it is absent or empty.
    pub fn take_file(&mut self, file_field: &str) -> AppResult<Bytes> {
        match self.file.take() {
            Some(data) if !data.is_empty() => Ok(data),
            Some(_) => Err(AppError::BadRequest(format!("Field '{file_field}' is empty"))),
            None => Err(AppError::BadRequest(format!(
                "Missing required '{file_field}' field"
            ))),
        }
    }

    /// A text field, trimmed; blank values count as absent.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::BadRequest(err.body_text())
    }
}

/// Wait for a job, store its output under its content hash and build the
/// success response.
pub async fn deliver(
    state: &AppState,
    kind: &'static str,
    future: ResultFuture,
    extension: &str,
    content_type: &str,
) -> AppResult<UploadResponse> {
    let output = future.wait(state.config.process_timeout()).await?;

    let name = content_name(&output, extension);
    let path = state.storage.save(&name, content_type, &output).await?;
    tracing::info!(kind, %path, bytes = output.len(), "Upload processed");

    let url = state.config.public_url(&path);
    Ok(Json(ApiResponse::ok(PathResponse { path, url })))
}
