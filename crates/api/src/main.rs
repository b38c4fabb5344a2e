use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mediaproxy_api::config::ServerConfig;
use mediaproxy_api::router::build_app_router;
use mediaproxy_api::state::{AppState, Processors};
use mediaproxy_storage::fs::FsStorage;
use mediaproxy_storage::s3::S3Storage;
use mediaproxy_storage::{Storage, StorageBackendType};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "mediaproxy_api=debug,mediaproxy_processor=debug,tower_http=debug".into()
    });
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Storage ---
    let storage: Arc<dyn Storage> = match config.storage.backend {
        StorageBackendType::Fs => Arc::new(FsStorage::new(config.storage.path.clone())),
        StorageBackendType::S3 => Arc::new(
            S3Storage::from_env(
                config.storage.s3_bucket.clone(),
                config.storage.s3_prefix.clone(),
            )
            .await
            .expect("Failed to configure S3 storage"),
        ),
    };
    tracing::info!(backend = storage.backend(), "Storage backend ready");

    // --- Processors ---
    let root = CancellationToken::new();
    let processors =
        Arc::new(Processors::from_config(&config, &root).expect("Invalid processor configuration"));
    processors.start().expect("Failed to start processors");
    tracing::info!(
        image_workers = processors.image.concurrency(),
        audio_workers = processors.audio.concurrency(),
        markup_workers = processors.markup.concurrency(),
        "Processors started",
    );

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        processors: Arc::clone(&processors),
        storage,
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, draining processors");

    root.cancel();
    let deadline = Duration::from_secs(config.shutdown_timeout_secs);
    if tokio::time::timeout(deadline, processors.shutdown_all())
        .await
        .is_err()
    {
        tracing::error!(
            timeout_secs = config.shutdown_timeout_secs,
            "Processors did not stop in time, exiting",
        );
        std::process::exit(1);
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
