use axum::extract::{Multipart, State};
use mediaproxy_processor::capabilities::audio::{OUTPUT_CONTENT_TYPE, OUTPUT_EXTENSION};
use mediaproxy_processor::capabilities::AudioCapability;
use mediaproxy_processor::Capability;

use crate::error::AppResult;
use crate::handlers::upload::{deliver, UploadForm, UploadResponse};
use crate::middleware::auth::Caller;
use crate::state::AppState;

/// Multipart field carrying the audio file.
pub const AUDIO_FILE_FIELD: &str = "audioFile";

/// POST /api/v1/audio/upload
///
/// Down-samples any audio input to a 128k mp3 and stores it.
pub async fn upload(
    State(state): State<AppState>,
    _caller: Caller,
    mut multipart: Multipart,
) -> AppResult<UploadResponse> {
    let mut form = UploadForm::read(&mut multipart, AUDIO_FILE_FIELD).await?;
    let payload = form.take_file(AUDIO_FILE_FIELD)?;

    let future = state.processors.audio.submit(payload, None).await?;
    deliver(
        &state,
        AudioCapability::KIND,
        future,
        OUTPUT_EXTENSION,
        OUTPUT_CONTENT_TYPE,
    )
    .await
}
