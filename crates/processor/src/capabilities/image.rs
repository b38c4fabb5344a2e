//! Image resize and re-encode.
//!
//! Decoding, resampling and encoding are CPU-bound and run on the blocking
//! pool. The worker's output buffer is moved into the blocking task and back
//! so its allocation survives across jobs.

use std::io::Cursor;

use ::image::codecs::jpeg::JpegEncoder;
use ::image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use ::image::codecs::webp::WebPEncoder;
use ::image::imageops::FilterType;
use ::image::{DynamicImage, ImageReader, ImageResult};
use bytes::Bytes;
use mediaproxy_core::image_policy::{
    derive_options, validate_custom, ImageFormat, ImageOptions, QualityTier,
    DEFAULT_MAX_DIMENSION,
};

use crate::capability::{Capability, TransformContext};
use crate::error::JobError;

/// JPEG encoder quality (0-100).
pub const JPEG_QUALITY: u8 = 75;

/// Assumed encoded bytes per output pixel, used to size the buffer.
const TYPICAL_BYTES_PER_PIXEL: usize = 3;
const TYPICAL_COMPRESSION_RATIO: usize = 8;

/// Encoded size of a `max_dimension` square at a typical compression ratio.
pub fn typical_encoded_bytes(max_dimension: u32) -> usize {
    let side = max_dimension as usize;
    side * side * TYPICAL_BYTES_PER_PIXEL / TYPICAL_COMPRESSION_RATIO
}

/// Read only the header and return `(width, height)`.
pub fn header_dimensions(payload: &[u8]) -> Result<(u32, u32), JobError> {
    ImageReader::new(Cursor::new(payload))
        .with_guessed_format()
        .map_err(|e| JobError::InvalidInput(format!("unreadable image header: {e}")))?
        .into_dimensions()
        .map_err(|e| JobError::InvalidInput(format!("unreadable image header: {e}")))
}

#[derive(Debug, Clone, Copy)]
pub struct ImageConfig {
    /// Upper bound on either side of the output.
    pub max_dimension: u32,
    /// Tier used to derive options for jobs submitted without any.
    pub default_tier: QualityTier,
    /// Initial capacity of each worker's output buffer.
    pub buffer_bytes: usize,
}

impl ImageConfig {
    pub fn new(max_dimension: u32) -> Self {
        Self {
            max_dimension,
            default_tier: QualityTier::Default,
            buffer_bytes: typical_encoded_bytes(max_dimension),
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DIMENSION)
    }
}

/// Per-worker encode buffer.
#[derive(Debug)]
pub struct ImageContext {
    buffer: Vec<u8>,
    typical: usize,
}

impl ImageContext {
    fn new(typical: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(typical),
            typical,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }
}

impl TransformContext for ImageContext {
    fn reset(&mut self) {
        self.buffer.clear();
        // Give back memory from an unusually large output, and restore the
        // preallocation if a failed job lost the buffer.
        if self.buffer.capacity() > self.typical * 2 {
            self.buffer.shrink_to(self.typical);
        } else if self.buffer.capacity() < self.typical {
            self.buffer.reserve(self.typical);
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImageCapability {
    config: ImageConfig,
}

impl ImageCapability {
    pub fn new(config: ImageConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ImageConfig {
        &self.config
    }

    /// Resolve the options for one job: validate explicit ones, or derive
    /// them from the header with the default tier.
    fn resolve(
        &self,
        payload: &[u8],
        options: Option<&ImageOptions>,
    ) -> Result<ImageOptions, JobError> {
        let (width, height) = header_dimensions(payload)?;
        match options {
            Some(options) => {
                validate_custom(options, width, height, self.config.max_dimension)?;
                Ok(*options)
            }
            None => {
                Ok(derive_options(
                    width,
                    height,
                    self.config.default_tier,
                    self.config.max_dimension,
                )?)
            }
        }
    }
}

impl Capability for ImageCapability {
    type Options = ImageOptions;
    type Context = ImageContext;
    const KIND: &'static str = "image";

    fn new_context(&self) -> ImageContext {
        ImageContext::new(self.config.buffer_bytes)
    }

    async fn transform(
        &self,
        payload: &Bytes,
        options: Option<&ImageOptions>,
        context: &mut ImageContext,
    ) -> Result<Bytes, JobError> {
        let options = self.resolve(payload, options)?;

        let input = payload.clone();
        let mut buffer = std::mem::take(&mut context.buffer);
        let (buffer, result) = tokio::task::spawn_blocking(move || {
            let result = render(&input, &options, &mut buffer);
            (buffer, result)
        })
        .await
        .map_err(|e| JobError::Transform(format!("image task failed: {e}")))?;

        context.buffer = buffer;
        result?;
        Ok(Bytes::copy_from_slice(&context.buffer))
    }
}

/// Decode `payload`, resize it if requested and encode it into `out`.
fn render(payload: &[u8], options: &ImageOptions, out: &mut Vec<u8>) -> Result<(), JobError> {
    let decoded = ::image::load_from_memory(payload)
        .map_err(|e| JobError::InvalidInput(format!("image decode failed: {e}")))?;

    let image = if options.resize {
        decoded.resize_to_fill(options.width, options.height, FilterType::Lanczos3)
    } else {
        decoded
    };

    out.clear();
    encode(&image, options.format, out)
        .map_err(|e| JobError::Transform(format!("image encode failed: {e}")))
}

fn encode(image: &DynamicImage, format: ImageFormat, out: &mut Vec<u8>) -> ImageResult<()> {
    match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8())
            .write_with_encoder(JpegEncoder::new_with_quality(out, JPEG_QUALITY)),
        ImageFormat::Png => image.write_with_encoder(PngEncoder::new_with_quality(
            out,
            CompressionType::Best,
            PngFilter::Adaptive,
        )),
        // The pure-Rust WebP encoder only writes lossless output.
        ImageFormat::Webp => {
            let image = if image.color().has_alpha() {
                DynamicImage::ImageRgba8(image.to_rgba8())
            } else {
                DynamicImage::ImageRgb8(image.to_rgb8())
            };
            image.write_with_encoder(WebPEncoder::new_lossless(out))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
