//! S3 (or S3-compatible) backend. Objects are uploaded world-readable so
//! they can be served straight from a CDN.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::Client;

use crate::{validate_name, Storage, StorageError};

#[derive(Debug, Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3Storage {
    pub fn new(client: Client, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: prefix.into().trim_matches('/').to_string(),
        }
    }

    /// Build a client from the standard AWS environment (credentials,
    /// region, endpoint overrides).
    pub async fn from_env(
        bucket: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Result<Self, StorageError> {
        let bucket = bucket.into();
        if bucket.trim().is_empty() {
            return Err(StorageError::Config("S3_BUCKET must be set".into()));
        }
        let config = aws_config::load_from_env().await;
        Ok(Self::new(Client::new(&config), bucket, prefix))
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Object key for `name` under the configured prefix.
    pub fn key_for(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{name}", self.prefix)
        }
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn save(
        &self,
        name: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<String, StorageError> {
        validate_name(name)?;
        let key = self.key_for(name);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(content_type)
            .acl(ObjectCannedAcl::PublicRead)
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .map_err(|e| StorageError::Upload(e.to_string()))?;

        tracing::debug!(bucket = %self.bucket, %key, bytes = data.len(), "Object uploaded");
        Ok(key)
    }

    fn backend(&self) -> &'static str {
        "s3"
    }
}
