//! Destinations for processed media.
//!
//! Outputs are content-addressed by the caller, so a [`Storage`] only has
//! to write bytes under a flat object name and report where they went.

pub mod fs;
pub mod s3;

use async_trait::async_trait;

pub use fs::FsStorage;
pub use s3::S3Storage;

/// Error type for storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Invalid object name '{0}'")]
    InvalidName(String),

    #[error("Unknown storage backend '{0}'. Must be one of: fs, s3")]
    UnknownBackend(String),

    #[error("Storage backend is misconfigured: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Upload failed: {0}")]
    Upload(String),
}

/// Writes an object and returns its locator (a path or object key).
#[async_trait]
pub trait Storage: Send + Sync {
    async fn save(&self, name: &str, content_type: &str, data: &[u8])
        -> Result<String, StorageError>;

    /// Short backend name for logs and health output.
    fn backend(&self) -> &'static str;
}

/// Which [`Storage`] implementation to build at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackendType {
    Fs,
    S3,
}

impl StorageBackendType {
    /// Parse the `STORAGE_BACKEND` value.
    pub fn from_name(name: &str) -> Result<Self, StorageError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "fs" | "local" => Ok(Self::Fs),
            "s3" => Ok(Self::S3),
            other => Err(StorageError::UnknownBackend(other.to_string())),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Fs => "fs",
            Self::S3 => "s3",
        }
    }
}

/// Object names are flat: no separators, no parent references.
pub(crate) fn validate_name(name: &str) -> Result<(), StorageError> {
    let bad = name.is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name == "."
        || name == ".."
        || name.starts_with('.');
    if bad {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(())
}
