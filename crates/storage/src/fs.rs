//! Local filesystem backend.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use uuid::Uuid;

use crate::{validate_name, Storage, StorageError};

/// Writes objects as files directly under `root`.
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl Storage for FsStorage {
    async fn save(
        &self,
        name: &str,
        _content_type: &str,
        data: &[u8],
    ) -> Result<String, StorageError> {
        validate_name(name)?;
        tokio::fs::create_dir_all(&self.root).await?;

        // Each call writes its own temp file and renames it into place, so
        // concurrent saves of the same name never share a partial file.
        let path = self.root.join(name);
        let temp_path = self.root.join(format!(".{name}.{}.tmp", Uuid::new_v4()));
        let written = match tokio::fs::write(&temp_path, data).await {
            Ok(()) => tokio::fs::rename(&temp_path, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            if let Err(cleanup) = tokio::fs::remove_file(&temp_path).await {
                tracing::debug!(
                    path = %temp_path.display(),
                    error = %cleanup,
                    "Temp file not removed",
                );
            }
            return Err(e.into());
        }

        tracing::debug!(path = %path.display(), bytes = data.len(), "Object written");
        Ok(path.to_string_lossy().into_owned())
    }

    fn backend(&self) -> &'static str {
        "fs"
    }
}
