//! The three job kinds served by mediaproxy.

pub mod audio;
pub mod image;
pub mod markup;

pub use self::audio::{AudioCapability, AudioConfig, AudioContext};
pub use self::image::{ImageCapability, ImageConfig, ImageContext};
pub use self::markup::{MarkupCapability, MarkupContext};
