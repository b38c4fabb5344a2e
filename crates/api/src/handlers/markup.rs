use axum::extract::{Multipart, State};
use mediaproxy_processor::capabilities::markup::{OUTPUT_CONTENT_TYPE, OUTPUT_EXTENSION};
use mediaproxy_processor::capabilities::MarkupCapability;
use mediaproxy_processor::Capability;

use crate::error::AppResult;
use crate::handlers::upload::{deliver, UploadForm, UploadResponse};
use crate::middleware::auth::Caller;
use crate::state::AppState;

/// Multipart field carrying the SVG document.
pub const SVG_FILE_FIELD: &str = "svgFile";

/// POST /api/v1/markup/upload
pub async fn upload(
    State(state): State<AppState>,
    _caller: Caller,
    mut multipart: Multipart,
) -> AppResult<UploadResponse> {
    let mut form = UploadForm::read(&mut multipart, SVG_FILE_FIELD).await?;
    let payload = form.take_file(SVG_FILE_FIELD)?;

    let future = state.processors.markup.submit(payload, None).await?;
    deliver(
        &state,
        MarkupCapability::KIND,
        future,
        OUTPUT_EXTENSION,
        OUTPUT_CONTENT_TYPE,
    )
    .await
}
