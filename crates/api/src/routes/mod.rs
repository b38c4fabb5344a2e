pub mod health;

use axum::routing::post;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /image/upload     POST  multipart `imageFile` (+ `quality`, custom fields)
/// /audio/upload     POST  multipart `audioFile`
/// /markup/upload    POST  multipart `svgFile`
/// ```
///
/// Every route requires `Authorization: Bearer <token>`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/image/upload", post(handlers::image::upload))
        .route("/audio/upload", post(handlers::audio::upload))
        .route("/markup/upload", post(handlers::markup::upload))
}
