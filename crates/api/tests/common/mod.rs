#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use mediaproxy_core::ffmpeg::TranscodeCommand;
use mediaproxy_processor::capabilities::{
    AudioCapability, AudioConfig, ImageCapability, ImageConfig, MarkupCapability,
};
use mediaproxy_processor::{Processor, ProcessorConfig};
use mediaproxy_storage::{FsStorage, StorageBackendType};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use mediaproxy_api::config::{AuthConfig, ServerConfig, StorageConfig};
use mediaproxy_api::router::build_app_router;
use mediaproxy_api::state::{AppState, Processors};

pub const TOKEN: &str = "test-token";
pub const SPECIAL_TOKEN: &str = "special-token";
pub const CDN_HOST: &str = "https://cdn.test/";

const BOUNDARY: &str = "mediaproxy-test-boundary";

/// Build a test `ServerConfig` with small processors and fs storage under
/// `storage_dir`.
pub fn test_config(storage_dir: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        process_timeout_secs: 10,
        max_upload_bytes: 1024 * 1024,
        cdn_host: CDN_HOST.to_string(),
        auth: AuthConfig {
            token: TOKEN.to_string(),
            special_token: Some(SPECIAL_TOKEN.to_string()),
        },
        storage: StorageConfig {
            backend: StorageBackendType::Fs,
            path: storage_dir.to_path_buf(),
            s3_bucket: String::new(),
            s3_prefix: String::new(),
        },
        image_processor: ProcessorConfig::new(2, 4),
        audio_processor: ProcessorConfig::new(1, 2),
        markup_processor: ProcessorConfig::new(1, 2),
        image_max_dimension: 1080,
        ffmpeg_path: "ffmpeg".to_string(),
    }
}

/// Build the full application router, using the same builder as `main.rs`.
///
/// The audio processor runs `cat` instead of ffmpeg so tests do not depend
/// on a transcoder being installed.
pub fn build_test_app(storage_dir: &Path) -> (Router, AppState) {
    let config = test_config(storage_dir);
    let root = CancellationToken::new();

    let audio = AudioCapability::new(AudioConfig::new(TranscodeCommand {
        program: "sh".to_string(),
        args: vec!["-c".to_string(), "cat".to_string()],
        timeout: Duration::from_secs(5),
    }));

    let processors = Processors {
        image: Processor::with_parent(
            config.image_processor,
            ImageCapability::new(ImageConfig::new(config.image_max_dimension)),
            &root,
        )
        .unwrap(),
        audio: Processor::with_parent(config.audio_processor, audio, &root).unwrap(),
        markup: Processor::with_parent(config.markup_processor, MarkupCapability, &root)
            .unwrap(),
    };
    processors.start().unwrap();

    let state = AppState {
        config: Arc::new(config.clone()),
        processors: Arc::new(processors),
        storage: Arc::new(FsStorage::new(storage_dir)),
    };

    (build_app_router(state.clone(), &config), state)
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

/// One part of a multipart body.
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

/// Encode `parts` as a `multipart/form-data` body.
pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n")
                        .as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(name, filename, data) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// POST a multipart form to `uri`, optionally with a bearer token.
pub async fn post_multipart(
    app: Router,
    uri: &str,
    token: Option<&str>,
    parts: &[Part<'_>],
) -> Response<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    app.oneshot(builder.body(Body::from(multipart_body(parts))).unwrap())
        .await
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Encode a solid-colour PNG of the given size.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 40, 90]));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

