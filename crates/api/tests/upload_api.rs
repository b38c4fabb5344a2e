//! End-to-end tests for the upload routes: auth, form validation, processing
//! and storage.

mod common;

use std::path::Path;

use axum::http::StatusCode;
use common::{body_json, png, post_multipart, Part, CDN_HOST, SPECIAL_TOKEN, TOKEN};
use mediaproxy_core::hashing::sha256_hex;

const SVG: &str = r#"<?xml version="1.0"?>
<!-- exported by an editor -->
<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10">
    <metadata>editor state</metadata>
    <rect width="10" height="10"/>
</svg>
"#;

/// Assert the envelope is a success and return `(path, url)`.
async fn success_paths(response: axum::http::Response<axum::body::Body>) -> (String, String) {
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], 200);
    assert_eq!(json["message"], "ok");
    let path = json["data"]["path"].as_str().unwrap().to_string();
    let url = json["data"]["url"].as_str().unwrap().to_string();
    (path, url)
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_authorization_header_returns_403() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _state) = common::build_test_app(dir.path());

    let response = post_multipart(
        app,
        "/api/v1/markup/upload",
        None,
        &[Part::File("svgFile", "a.svg", SVG.as_bytes())],
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["status"], 403);
}

#[tokio::test]
async fn wrong_token_returns_401() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _state) = common::build_test_app(dir.path());

    let response = post_multipart(
        app,
        "/api/v1/audio/upload",
        Some("not-the-token"),
        &[Part::File("audioFile", "a.mp3", b"audio")],
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// Form validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_file_field_returns_400() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _state) = common::build_test_app(dir.path());

    let response = post_multipart(
        app,
        "/api/v1/markup/upload",
        Some(TOKEN),
        &[Part::File("wrongField", "a.svg", SVG.as_bytes())],
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["message"], "Missing required 'svgFile' field");
}

#[tokio::test]
async fn oversized_body_returns_413() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _state) = common::build_test_app(dir.path());
    let big = vec![b'a'; 2 * 1024 * 1024];

    let response = post_multipart(
        app,
        "/api/v1/markup/upload",
        Some(TOKEN),
        &[Part::File("svgFile", "a.svg", &big)],
    )
    .await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

// ---------------------------------------------------------------------------
// Markup
// ---------------------------------------------------------------------------

#[tokio::test]
async fn markup_upload_stores_minified_svg_under_content_hash() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _state) = common::build_test_app(dir.path());

    let response = post_multipart(
        app,
        "/api/v1/markup/upload",
        Some(TOKEN),
        &[Part::File("svgFile", "a.svg", SVG.as_bytes())],
    )
    .await;
    let (path, url) = success_paths(response).await;

    assert_eq!(url, format!("{CDN_HOST}{path}"));

    let stored = std::fs::read(&path).unwrap();
    let text = std::str::from_utf8(&stored).unwrap();
    assert!(text.starts_with("<?xml"));
    assert!(!text.contains("<!--"));
    assert!(!text.contains("<metadata"));

    let file_name = Path::new(&path).file_name().unwrap().to_str().unwrap();
    assert_eq!(file_name, format!("{}.svg", sha256_hex(&stored)));
}

#[tokio::test]
async fn non_svg_markup_returns_400() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _state) = common::build_test_app(dir.path());

    let response = post_multipart(
        app,
        "/api/v1/markup/upload",
        Some(TOKEN),
        &[Part::File("svgFile", "a.svg", b"<html></html>")],
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Image
// ---------------------------------------------------------------------------

#[tokio::test]
async fn image_upload_default_tier_halves_small_images() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _state) = common::build_test_app(dir.path());
    let input = png(64, 48);

    let response = post_multipart(
        app,
        "/api/v1/image/upload",
        Some(TOKEN),
        &[Part::File("imageFile", "a.png", &input)],
    )
    .await;
    let (path, _url) = success_paths(response).await;

    assert!(path.ends_with(".jpeg"), "unexpected path {path}");
    let output = image::open(&path).unwrap();
    assert_eq!((output.width(), output.height()), (32, 24));
}

#[tokio::test]
async fn image_upload_avatar_tier_is_square() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _state) = common::build_test_app(dir.path());
    let input = png(300, 200);

    let response = post_multipart(
        app,
        "/api/v1/image/upload",
        Some(TOKEN),
        &[
            Part::File("imageFile", "a.png", &input),
            Part::Text("quality", "avatar"),
        ],
    )
    .await;
    let (path, _url) = success_paths(response).await;

    let output = image::open(&path).unwrap();
    assert_eq!(output.width(), output.height());
}

#[tokio::test]
async fn custom_tier_requires_special_token() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _state) = common::build_test_app(dir.path());
    let input = png(64, 64);

    let response = post_multipart(
        app,
        "/api/v1/image/upload",
        Some(TOKEN),
        &[
            Part::File("imageFile", "a.png", &input),
            Part::Text("quality", "custom"),
            Part::Text("width", "20"),
            Part::Text("height", "20"),
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn custom_tier_with_special_token_uses_requested_options() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _state) = common::build_test_app(dir.path());
    let input = png(64, 64);

    let response = post_multipart(
        app,
        "/api/v1/image/upload",
        Some(SPECIAL_TOKEN),
        &[
            Part::File("imageFile", "a.png", &input),
            Part::Text("quality", "custom"),
            Part::Text("width", "20"),
            Part::Text("height", "10"),
            Part::Text("format", "png"),
        ],
    )
    .await;
    let (path, _url) = success_paths(response).await;

    assert!(path.ends_with(".png"), "unexpected path {path}");
    let output = image::open(&path).unwrap();
    assert_eq!((output.width(), output.height()), (20, 10));
}

#[tokio::test]
async fn custom_tier_without_resize_rejects_oversized_input() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _state) = common::build_test_app(dir.path());
    let input = png(1200, 8);

    let response = post_multipart(
        app,
        "/api/v1/image/upload",
        Some(SPECIAL_TOKEN),
        &[
            Part::File("imageFile", "a.png", &input),
            Part::Text("quality", "custom"),
            Part::Text("resize", "false"),
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn custom_tier_without_resize_keeps_native_size() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _state) = common::build_test_app(dir.path());
    let input = png(40, 30);

    let response = post_multipart(
        app,
        "/api/v1/image/upload",
        Some(SPECIAL_TOKEN),
        &[
            Part::File("imageFile", "a.png", &input),
            Part::Text("quality", "custom"),
            Part::Text("resize", "false"),
            Part::Text("format", "png"),
        ],
    )
    .await;
    let (path, _url) = success_paths(response).await;

    let output = image::open(&path).unwrap();
    assert_eq!((output.width(), output.height()), (40, 30));
}

#[tokio::test]
async fn custom_tier_missing_width_returns_400() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _state) = common::build_test_app(dir.path());
    let input = png(64, 64);

    let response = post_multipart(
        app,
        "/api/v1/image/upload",
        Some(SPECIAL_TOKEN),
        &[
            Part::File("imageFile", "a.png", &input),
            Part::Text("quality", "custom"),
            Part::Text("height", "10"),
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_quality_returns_400() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _state) = common::build_test_app(dir.path());
    let input = png(16, 16);

    let response = post_multipart(
        app,
        "/api/v1/image/upload",
        Some(TOKEN),
        &[
            Part::File("imageFile", "a.png", &input),
            Part::Text("quality", "ultra"),
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn undecodable_image_returns_400() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _state) = common::build_test_app(dir.path());

    let response = post_multipart(
        app,
        "/api/v1/image/upload",
        Some(TOKEN),
        &[Part::File("imageFile", "a.png", b"definitely not an image")],
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["status"], 400);
}

// ---------------------------------------------------------------------------
// Audio
// ---------------------------------------------------------------------------

#[cfg(unix)]
#[tokio::test]
async fn audio_upload_stores_transcoder_output_as_mp3() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _state) = common::build_test_app(dir.path());

    let response = post_multipart(
        app,
        "/api/v1/audio/upload",
        Some(TOKEN),
        &[Part::File("audioFile", "a.wav", b"RIFF-not-really-audio")],
    )
    .await;
    let (path, _url) = success_paths(response).await;

    assert!(path.ends_with(".mp3"), "unexpected path {path}");
    assert_eq!(std::fs::read(&path).unwrap(), b"RIFF-not-really-audio");
}

// ---------------------------------------------------------------------------
// Shutdown
// ---------------------------------------------------------------------------

#[tokio::test]
async fn upload_after_shutdown_returns_503() {
    let dir = tempfile::tempdir().unwrap();
    let (app, state) = common::build_test_app(dir.path());
    state.processors.shutdown_all().await;

    let response = post_multipart(
        app,
        "/api/v1/markup/upload",
        Some(TOKEN),
        &[Part::File("svgFile", "a.svg", SVG.as_bytes())],
    )
    .await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
