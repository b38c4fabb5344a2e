//! Upload handlers, one module per job kind.

pub mod audio;
pub mod image;
pub mod markup;
pub mod upload;
