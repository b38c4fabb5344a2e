//! Image sizing policy: quality tiers and default-option derivation.
//!
//! When an image job arrives without explicit options, the target size and
//! format are derived from the input's header dimensions using the rule of a
//! named quality tier. Derivation is deterministic and pure so the API layer
//! and the image capability share exactly the same behaviour.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/* --------------------------------------------------------------------------
Named constants
-------------------------------------------------------------------------- */

/// Edge length of the square avatar output.
pub const AVATAR_SIZE: u32 = 150;

/// Default bound on the longest side of a derived target.
pub const DEFAULT_MAX_DIMENSION: u32 = 1080;

/// Largest accepted ratio between the input's longest side and the derived
/// target's longest side. Anything beyond this is rejected instead of being
/// squeezed into a degenerate thumbnail.
pub const MAX_DOWNSCALE_RATIO: f64 = 16.0;

/// Tier name: fixed-size avatar.
pub const TIER_AVATAR: &str = "avatar";

/// Tier name: preserve native size, bounded by the max dimension.
pub const TIER_ORGANIZATION: &str = "organization";

/// Tier name: half size.
pub const TIER_DEFAULT: &str = "default";

/// Tier name: caller-supplied options.
pub const TIER_CUSTOM: &str = "custom";

/// All recognized tier names.
pub const ALL_TIER_NAMES: &[&str] = &[TIER_AVATAR, TIER_ORGANIZATION, TIER_DEFAULT, TIER_CUSTOM];

/* --------------------------------------------------------------------------
Types
-------------------------------------------------------------------------- */

/// Output encoding of an image job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
}

impl ImageFormat {
    /// Parse a format name as sent by clients (`jpeg`, `jpg`, `png`, `webp`).
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "webp" => Ok(Self::Webp),
            other => Err(CoreError::Validation(format!(
                "Unknown image format '{other}'. Must be one of: jpeg, png, webp"
            ))),
        }
    }

    /// File extension used for stored objects.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Webp => "webp",
        }
    }

    /// MIME type used for stored objects.
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
        }
    }
}

/// Target size and encoding for one image job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageOptions {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    /// When `false` the image is re-encoded at its native size.
    pub resize: bool,
}

impl ImageOptions {
    /// JPEG output resized to `width` x `height`.
    pub fn jpeg(width: u32, height: u32) -> Self {
        Self {
            format: ImageFormat::Jpeg,
            width,
            height,
            resize: true,
        }
    }
}

/// Named rule for deriving [`ImageOptions`] from input dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    /// Fixed 150x150, centre-cropped.
    Avatar,
    /// Keep native size; scale down only when above the max dimension.
    Organization,
    /// Half size; scale to half the max dimension when above it.
    #[default]
    Default,
    /// Caller supplies the options explicitly.
    Custom,
}

impl QualityTier {
    /// Parse the `quality` request field. An absent or blank value selects
    /// [`QualityTier::Default`].
    pub fn from_field(value: Option<&str>) -> Result<Self, CoreError> {
        match value.map(str::trim).unwrap_or_default() {
            "" | TIER_DEFAULT => Ok(Self::Default),
            TIER_AVATAR => Ok(Self::Avatar),
            TIER_ORGANIZATION => Ok(Self::Organization),
            TIER_CUSTOM => Ok(Self::Custom),
            other => Err(CoreError::Validation(format!(
                "Unknown quality tier '{other}'. Valid tiers: {}",
                ALL_TIER_NAMES.join(", ")
            ))),
        }
    }

    /// Canonical tier name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Avatar => TIER_AVATAR,
            Self::Organization => TIER_ORGANIZATION,
            Self::Default => TIER_DEFAULT,
            Self::Custom => TIER_CUSTOM,
        }
    }
}

/* --------------------------------------------------------------------------
Derivation
-------------------------------------------------------------------------- */

/// Derive options for an image of `width` x `height` under `tier`.
///
/// Fails with [`CoreError::InputTooLarge`] when the required downscale
/// exceeds [`MAX_DOWNSCALE_RATIO`] or a derived side would collapse to zero,
/// and with [`CoreError::Validation`] for zero-sized input or the
/// [`QualityTier::Custom`] tier (which has no derivation rule).
pub fn derive_options(
    width: u32,
    height: u32,
    tier: QualityTier,
    max_dimension: u32,
) -> Result<ImageOptions, CoreError> {
    validate_dimensions(width, height)?;
    if max_dimension == 0 {
        return Err(CoreError::Validation(
            "Max dimension must be greater than 0".to_string(),
        ));
    }

    match tier {
        QualityTier::Avatar => Ok(ImageOptions::jpeg(AVATAR_SIZE, AVATAR_SIZE)),
        QualityTier::Organization => {
            if width <= max_dimension && height <= max_dimension {
                Ok(ImageOptions::jpeg(width, height))
            } else {
                scale_to_fit(width, height, max_dimension, tier)
            }
        }
        QualityTier::Default => {
            if width <= max_dimension && height <= max_dimension {
                Ok(ImageOptions::jpeg((width / 2).max(1), (height / 2).max(1)))
            } else {
                scale_to_fit(width, height, (max_dimension / 2).max(1), tier)
            }
        }
        QualityTier::Custom => Err(CoreError::Validation(
            "The 'custom' quality tier requires explicit width, height and format".to_string(),
        )),
    }
}

/// Validate caller-supplied options for an input of `width` x `height`.
///
/// A resized output must fit within `max_dimension`. Without resizing the
/// output keeps the input's size, so the input itself must fit.
pub fn validate_custom(
    options: &ImageOptions,
    width: u32,
    height: u32,
    max_dimension: u32,
) -> Result<(), CoreError> {
    validate_dimensions(width, height)?;
    if !options.resize {
        if width > max_dimension || height > max_dimension {
            return Err(CoreError::InputTooLarge {
                width,
                height,
                tier: TIER_CUSTOM,
            });
        }
        return Ok(());
    }
    validate_dimensions(options.width, options.height)?;
    if options.width > max_dimension || options.height > max_dimension {
        return Err(CoreError::Validation(format!(
            "Requested size {}x{} exceeds the {max_dimension}px limit",
            options.width, options.height
        )));
    }
    Ok(())
}

/// Validate that width and height are positive.
pub fn validate_dimensions(width: u32, height: u32) -> Result<(), CoreError> {
    if width == 0 || height == 0 {
        return Err(CoreError::Validation(
            "Width and height must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

/// Scale proportionally so the longest side equals `bound`.
fn scale_to_fit(
    width: u32,
    height: u32,
    bound: u32,
    tier: QualityTier,
) -> Result<ImageOptions, CoreError> {
    let too_large = CoreError::InputTooLarge {
        width,
        height,
        tier: tier.name(),
    };

    let ratio = f64::from(width.max(height)) / f64::from(bound);
    if ratio > MAX_DOWNSCALE_RATIO {
        return Err(too_large);
    }

    let new_width = (f64::from(width) / ratio).round() as u32;
    let new_height = (f64::from(height) / ratio).round() as u32;
    if new_width == 0 || new_height == 0 {
        return Err(too_large);
    }

    Ok(ImageOptions::jpeg(new_width.min(bound), new_height.min(bound)))
}

/* --------------------------------------------------------------------------
Tests
-------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    // -- QualityTier --

    #[test]
    fn blank_quality_selects_default() {
        assert_eq!(QualityTier::from_field(None).unwrap(), QualityTier::Default);
        assert_eq!(QualityTier::from_field(Some("  ")).unwrap(), QualityTier::Default);
    }

    #[test]
    fn known_quality_names_parse() {
        for name in ALL_TIER_NAMES {
            let tier = QualityTier::from_field(Some(name)).unwrap();
            assert_eq!(tier.name(), *name);
        }
    }

    #[test]
    fn unknown_quality_rejected() {
        let result = QualityTier::from_field(Some("ultra"));
        assert_matches!(result, Err(CoreError::Validation(_)));
    }

    // -- ImageFormat --

    #[test]
    fn format_aliases_parse() {
        assert_eq!(ImageFormat::from_name("JPG").unwrap(), ImageFormat::Jpeg);
        assert_eq!(ImageFormat::from_name("png").unwrap(), ImageFormat::Png);
        assert!(ImageFormat::from_name("gif").is_err());
    }

    // -- derive_options --

    #[test]
    fn avatar_is_fixed_size() {
        let opts = derive_options(4000, 3000, QualityTier::Avatar, 1080).unwrap();
        assert_eq!((opts.width, opts.height), (AVATAR_SIZE, AVATAR_SIZE));
        assert_eq!(opts.format, ImageFormat::Jpeg);
    }

    #[test]
    fn organization_scales_large_input_within_bound() {
        let opts = derive_options(4000, 3000, QualityTier::Organization, 1080).unwrap();
        assert!(opts.width.max(opts.height) <= 1080);
        assert_eq!((opts.width, opts.height), (1080, 810));
    }

    #[test]
    fn organization_preserves_aspect_ratio() {
        let opts = derive_options(3000, 4000, QualityTier::Organization, 1080).unwrap();
        let input_ratio = 3000.0 / 4000.0;
        let output_ratio = f64::from(opts.width) / f64::from(opts.height);
        assert!((input_ratio - output_ratio).abs() < 0.01);
    }

    #[test]
    fn organization_keeps_small_input_native() {
        let opts = derive_options(100, 100, QualityTier::Organization, 1080).unwrap();
        assert_eq!((opts.width, opts.height), (100, 100));
    }

    #[test]
    fn default_halves_small_input() {
        let opts = derive_options(800, 600, QualityTier::Default, 1080).unwrap();
        assert_eq!((opts.width, opts.height), (400, 300));
    }

    #[test]
    fn default_scales_large_input_to_half_bound() {
        let opts = derive_options(4000, 3000, QualityTier::Default, 1080).unwrap();
        assert_eq!(opts.width.max(opts.height), 540);
    }

    #[test]
    fn default_never_produces_zero_side() {
        let opts = derive_options(1, 1, QualityTier::Default, 1080).unwrap();
        assert_eq!((opts.width, opts.height), (1, 1));
    }

    #[test]
    fn excessive_downscale_rejected() {
        let result = derive_options(20_000, 10_000, QualityTier::Organization, 1080);
        assert_matches!(
            result,
            Err(CoreError::InputTooLarge { width: 20_000, height: 10_000, tier: TIER_ORGANIZATION })
        );
    }

    #[test]
    fn degenerate_aspect_rejected() {
        let result = derive_options(10_000, 1, QualityTier::Organization, 1080);
        assert_matches!(result, Err(CoreError::InputTooLarge { .. }));
    }

    #[test]
    fn zero_dimension_rejected() {
        assert_matches!(
            derive_options(0, 10, QualityTier::Default, 1080),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn custom_tier_has_no_derivation() {
        assert_matches!(
            derive_options(10, 10, QualityTier::Custom, 1080),
            Err(CoreError::Validation(_))
        );
    }

    // -- validate_custom --

    #[test]
    fn custom_within_bound_accepted() {
        assert!(validate_custom(&ImageOptions::jpeg(1080, 720), 4000, 3000, 1080).is_ok());
    }

    #[test]
    fn custom_above_bound_rejected() {
        assert!(validate_custom(&ImageOptions::jpeg(2000, 720), 400, 400, 1080).is_err());
    }

    fn native(format: ImageFormat) -> ImageOptions {
        ImageOptions {
            format,
            width: 0,
            height: 0,
            resize: false,
        }
    }

    #[test]
    fn custom_without_resize_accepts_input_within_bound() {
        assert!(validate_custom(&native(ImageFormat::Png), 1080, 640, 1080).is_ok());
    }

    #[test]
    fn custom_without_resize_rejects_oversized_input() {
        let err = validate_custom(&native(ImageFormat::Png), 1081, 10, 1080).unwrap_err();
        assert_eq!(
            err,
            CoreError::InputTooLarge {
                width: 1081,
                height: 10,
                tier: TIER_CUSTOM,
            }
        );
    }
}
