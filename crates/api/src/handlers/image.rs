use axum::extract::{Multipart, State};
use mediaproxy_core::error::CoreError;
use mediaproxy_core::image_policy::{
    derive_options, validate_custom, ImageFormat, ImageOptions, QualityTier,
};
use mediaproxy_processor::capabilities::image::header_dimensions;
use mediaproxy_processor::capabilities::ImageCapability;
use mediaproxy_processor::Capability;

use crate::error::{AppError, AppResult};
use crate::handlers::upload::{deliver, UploadForm, UploadResponse};
use crate::middleware::auth::Caller;
use crate::state::AppState;

/// Multipart field carrying the image file.
pub const IMAGE_FILE_FIELD: &str = "imageFile";

/// Optional quality tier field (`avatar`, `organization`, `default`, `custom`).
pub const QUALITY_FIELD: &str = "quality";

/// Fields read for the `custom` tier.
pub const WIDTH_FIELD: &str = "width";
pub const HEIGHT_FIELD: &str = "height";
pub const FORMAT_FIELD: &str = "format";
pub const RESIZE_FIELD: &str = "resize";

/// POST /api/v1/image/upload
///
/// The header is inspected before the job is queued so malformed images and
/// impossible sizes are rejected with 400 without occupying a worker.
pub async fn upload(
    State(state): State<AppState>,
    caller: Caller,
    mut multipart: Multipart,
) -> AppResult<UploadResponse> {
    let mut form = UploadForm::read(&mut multipart, IMAGE_FILE_FIELD).await?;
    let payload = form.take_file(IMAGE_FILE_FIELD)?;
    let tier = QualityTier::from_field(form.field(QUALITY_FIELD))?;
    let max_dimension = state.config.image_max_dimension;

    if tier == QualityTier::Custom && !caller.privileged {
        return Err(AppError::Core(CoreError::Forbidden(
            "The 'custom' quality tier requires the special token".into(),
        )));
    }
    let (width, height) = header_dimensions(&payload)?;

    let options = match tier {
        QualityTier::Custom => {
            let options = custom_options(&form)?;
            validate_custom(&options, width, height, max_dimension)?;
            options
        }
        tier => derive_options(width, height, tier, max_dimension)?,
    };

    tracing::debug!(
        tier = tier.name(),
        width = options.width,
        height = options.height,
        format = options.format.extension(),
        "Image options resolved",
    );

    let future = state.processors.image.submit(payload, Some(options)).await?;
    deliver(
        &state,
        ImageCapability::KIND,
        future,
        options.format.extension(),
        options.format.content_type(),
    )
    .await
}

/// Build options from the `custom` tier's form fields. Format defaults to
/// JPEG and `resize` to `true`; width and height are only read when
/// resizing.
fn custom_options(form: &UploadForm) -> AppResult<ImageOptions> {
    let format = match form.field(FORMAT_FIELD) {
        Some(name) => ImageFormat::from_name(name)?,
        None => ImageFormat::Jpeg,
    };
    let resize = match form.field(RESIZE_FIELD) {
        None => true,
        Some(v) if v.eq_ignore_ascii_case("true") || v == "1" => true,
        Some(v) if v.eq_ignore_ascii_case("false") || v == "0" => false,
        Some(v) => {
            return Err(AppError::BadRequest(format!(
                "Field '{RESIZE_FIELD}' must be true or false, got '{v}'"
            )))
        }
    };
    let (width, height) = if resize {
        (
            parse_dimension(form, WIDTH_FIELD)?,
            parse_dimension(form, HEIGHT_FIELD)?,
        )
    } else {
        (0, 0)
    };

    Ok(ImageOptions {
        format,
        width,
        height,
        resize,
    })
}

fn parse_dimension(form: &UploadForm, name: &str) -> AppResult<u32> {
    let raw = form
        .field(name)
        .ok_or_else(|| AppError::BadRequest(format!("Missing required '{name}' field")))?;
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("Field '{name}' must be a positive integer")))
}
