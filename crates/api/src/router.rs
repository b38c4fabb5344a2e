//! HTTP surface assembly shared by `main.rs` and the integration tests.
//!
//! Upload routes live under `/api/v1` and are the only ones that accept a
//! body, so the multipart size limit is attached there. Everything else
//! (request ids, tracing, the outer timeout, CORS) wraps the whole app.

use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, StatusCode};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::config::ServerConfig;
use crate::routes;
use crate::state::AppState;

/// Header carrying the per-request id, set when absent and echoed back.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Headroom past the job deadline so the handler, not the outer timeout,
/// answers a slow job (504 with the envelope instead of a bare 408).
const TIMEOUT_HEADROOM: Duration = Duration::from_secs(5);

/// Build the application [`Router`].
pub fn build_app_router(state: AppState, config: &ServerConfig) -> Router {
    let uploads = routes::api_routes().layer(DefaultBodyLimit::max(config.max_upload_bytes));
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", uploads)
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout(config),
        ))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(cors_layer(config))
        .with_state(state)
}

/// Outer per-request timeout. Never shorter than the job deadline plus
/// [`TIMEOUT_HEADROOM`], whatever `REQUEST_TIMEOUT_SECS` says.
pub fn request_timeout(config: &ServerConfig) -> Duration {
    Duration::from_secs(config.request_timeout_secs)
        .max(config.process_timeout() + TIMEOUT_HEADROOM)
}

/// CORS for browser uploads. Auth is a bearer header, not cookies, so
/// credentials are not allowed.
///
/// Panics on an unparsable origin; misconfiguration fails at startup.
pub fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins = config.cors_origins.iter().map(|origin| {
        origin
            .parse()
            .unwrap_or_else(|e| panic!("Invalid CORS origin '{origin}': {e}"))
    });

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .expose_headers([HeaderName::from_static(REQUEST_ID_HEADER)])
        .max_age(Duration::from_secs(3600))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::config::{AuthConfig, StorageConfig};
    use mediaproxy_processor::ProcessorConfig;
    use mediaproxy_storage::StorageBackendType;

    fn config(request_secs: u64, process_secs: u64) -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            cors_origins: vec!["http://localhost:5173".into()],
            request_timeout_secs: request_secs,
            shutdown_timeout_secs: 5,
            process_timeout_secs: process_secs,
            max_upload_bytes: 1024,
            cdn_host: String::new(),
            auth: AuthConfig {
                token: "t".into(),
                special_token: None,
            },
            storage: StorageConfig {
                backend: StorageBackendType::Fs,
                path: Path::new("data").to_path_buf(),
                s3_bucket: String::new(),
                s3_prefix: String::new(),
            },
            image_processor: ProcessorConfig::default(),
            audio_processor: ProcessorConfig::default(),
            markup_processor: ProcessorConfig::default(),
            image_max_dimension: 1080,
            ffmpeg_path: "ffmpeg".into(),
        }
    }

    #[test]
    fn request_timeout_uses_configured_value_when_longer() {
        assert_eq!(request_timeout(&config(60, 30)), Duration::from_secs(60));
    }

    #[test]
    fn request_timeout_outlasts_job_deadline() {
        assert_eq!(request_timeout(&config(10, 30)), Duration::from_secs(35));
    }

    #[test]
    #[should_panic(expected = "Invalid CORS origin")]
    fn invalid_cors_origin_panics() {
        let mut config = config(60, 30);
        config.cors_origins = vec!["not a url\n".into()];
        cors_layer(&config);
    }
}
