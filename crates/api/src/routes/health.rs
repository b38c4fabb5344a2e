use axum::extract::State;
use axum::{routing::get, Json, Router};
use mediaproxy_processor::{Capability, Processor};
use serde::Serialize;

use crate::state::AppState;

/// Snapshot of one processor.
#[derive(Debug, Serialize)]
pub struct ProcessorHealth {
    pub concurrency: usize,
    pub queue_capacity: usize,
    pub queued: usize,
    pub in_flight: usize,
    pub closed: bool,
}

impl<C: Capability> From<&Processor<C>> for ProcessorHealth {
    fn from(processor: &Processor<C>) -> Self {
        Self {
            concurrency: processor.concurrency(),
            queue_capacity: processor.queue_capacity(),
            queued: processor.queued(),
            in_flight: processor.in_flight(),
            closed: processor.is_closed(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProcessorsHealth {
    pub image: ProcessorHealth,
    pub audio: ProcessorHealth,
    pub markup: ProcessorHealth,
}

/// Health check response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` once any processor has stopped accepting jobs.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    pub storage: &'static str,
    pub processors: ProcessorsHealth,
}

/// GET /health -- returns service and processor health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let processors = ProcessorsHealth {
        image: (&state.processors.image).into(),
        audio: (&state.processors.audio).into(),
        markup: (&state.processors.markup).into(),
    };

    let any_closed =
        processors.image.closed || processors.audio.closed || processors.markup.closed;
    let status = if any_closed { "degraded" } else { "ok" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        storage: state.storage.backend(),
        processors,
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
