use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use mediaproxy_core::ffmpeg::DEFAULT_FFMPEG_PATH;
use mediaproxy_core::image_policy::DEFAULT_MAX_DIMENSION;
use mediaproxy_processor::processor::DEFAULT_CONCURRENCY;
use mediaproxy_processor::ProcessorConfig;
use mediaproxy_storage::StorageBackendType;

/// Default queue slots for image jobs. Image uploads are frequent and cheap
/// to hold, so the image queue is much deeper than the others.
pub const DEFAULT_IMAGE_QUEUE: usize = 500;

/// Default queue slots for audio jobs.
pub const DEFAULT_AUDIO_QUEUE: usize = 10;

/// Default queue slots for markup jobs.
pub const DEFAULT_MARKUP_QUEUE: usize = 10;

/// Bearer tokens accepted on upload routes.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Regular upload token.
    pub token: String,
    /// Privileged token; unlocks caller-supplied image options. `None`
    /// disables privileged access.
    pub special_token: Option<String>,
}

/// Where processed outputs are written.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackendType,
    /// Root directory for the `fs` backend.
    pub path: PathBuf,
    /// Bucket for the `s3` backend.
    pub s3_bucket: String,
    /// Key prefix inside the bucket.
    pub s3_prefix: String,
}

/// Server configuration loaded from environment variables.
///
/// All fields except the auth token have defaults suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `60`).
    pub request_timeout_secs: u64,
    /// Upper bound on post-shutdown processor draining (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// How long a handler waits for its job's result (default: `30`).
    pub process_timeout_secs: u64,
    /// Maximum request body size in bytes (`MAX_UPLOAD_MB`, default: 10 MiB).
    pub max_upload_bytes: usize,
    /// Prefix joined with stored paths to form public URLs.
    pub cdn_host: String,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub image_processor: ProcessorConfig,
    pub audio_processor: ProcessorConfig,
    pub markup_processor: ProcessorConfig,
    /// Longest side of any image output (default: `1080`).
    pub image_max_dimension: u32,
    /// Transcoder binary (default: `ffmpeg` on `PATH`).
    pub ffmpeg_path: String,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default       |
    /// |-------------------------|---------------|
    /// | `HOST`                  | `0.0.0.0`     |
    /// | `PORT`                  | `3000`        |
    /// | `CORS_ORIGINS`          | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`  | `60`          |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`          |
    /// | `PROCESS_TIMEOUT_SECS`  | `30`          |
    /// | `MAX_UPLOAD_MB`         | `10`          |
    /// | `AUTH_TOKEN`            | required      |
    /// | `SPECIAL_AUTH_TOKEN`    | unset         |
    /// | `CDN_HOST`              | empty         |
    /// | `STORAGE_BACKEND`       | `fs`          |
    /// | `STORAGE_PATH`          | `./data`      |
    /// | `S3_BUCKET`/`S3_PREFIX` | empty         |
    /// | `IMAGE_WORKERS`, `AUDIO_WORKERS`, `MARKUP_WORKERS` | `3` |
    /// | `IMAGE_QUEUE`           | `500`         |
    /// | `AUDIO_QUEUE`, `MARKUP_QUEUE` | `10`    |
    /// | `IMAGE_MAX_DIMENSION`   | `1080`        |
    /// | `FFMPEG_PATH`           | `ffmpeg`      |
    ///
    /// Panics on malformed values; misconfiguration should fail at startup.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = env_parse("PORT", 3000);

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let max_upload_mb: usize = env_parse("MAX_UPLOAD_MB", 10);

        let token = std::env::var("AUTH_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .expect("AUTH_TOKEN must be set");
        let special_token = std::env::var("SPECIAL_AUTH_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());

        let backend = StorageBackendType::from_name(
            &std::env::var("STORAGE_BACKEND").unwrap_or_else(|_| "fs".into()),
        )
        .unwrap_or_else(|e| panic!("{e}"));

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", 60),
            shutdown_timeout_secs: env_parse("SHUTDOWN_TIMEOUT_SECS", 30),
            process_timeout_secs: env_parse("PROCESS_TIMEOUT_SECS", 30),
            max_upload_bytes: max_upload_mb * 1024 * 1024,
            cdn_host: std::env::var("CDN_HOST").unwrap_or_default(),
            auth: AuthConfig {
                token,
                special_token,
            },
            storage: StorageConfig {
                backend,
                path: std::env::var("STORAGE_PATH")
                    .unwrap_or_else(|_| "./data".into())
                    .into(),
                s3_bucket: std::env::var("S3_BUCKET").unwrap_or_default(),
                s3_prefix: std::env::var("S3_PREFIX").unwrap_or_default(),
            },
            image_processor: ProcessorConfig::new(
                env_parse("IMAGE_WORKERS", DEFAULT_CONCURRENCY),
                env_parse("IMAGE_QUEUE", DEFAULT_IMAGE_QUEUE),
            ),
            audio_processor: ProcessorConfig::new(
                env_parse("AUDIO_WORKERS", DEFAULT_CONCURRENCY),
                env_parse("AUDIO_QUEUE", DEFAULT_AUDIO_QUEUE),
            ),
            markup_processor: ProcessorConfig::new(
                env_parse("MARKUP_WORKERS", DEFAULT_CONCURRENCY),
                env_parse("MARKUP_QUEUE", DEFAULT_MARKUP_QUEUE),
            ),
            image_max_dimension: env_parse("IMAGE_MAX_DIMENSION", DEFAULT_MAX_DIMENSION),
            ffmpeg_path: std::env::var("FFMPEG_PATH")
                .unwrap_or_else(|_| DEFAULT_FFMPEG_PATH.into()),
        }
    }

    /// Deadline for awaiting a job's result.
    pub fn process_timeout(&self) -> Duration {
        Duration::from_secs(self.process_timeout_secs)
    }

    /// Public URL for a stored object.
    pub fn public_url(&self, path: &str) -> String {
        format!("{}{path}", self.cdn_host)
    }
}

/// Read and parse `key`, falling back to `default` when unset.
fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{key} must be a valid {}: {e}", std::any::type_name::<T>())),
        Err(_) => default,
    }
}
