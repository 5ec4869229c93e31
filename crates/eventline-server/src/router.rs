//! Axum router construction for the ingest API.
//!
//! Assembles the `/api` routes, the `/api` fallback, and static file
//! serving for everything else into a single [`Router`].

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, header};
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the complete Axum router for the ingest server.
///
/// The router includes:
/// - `POST`/`GET` `/api/instant-events` (alias `/api/events/instant`)
/// - `POST`/`GET` `/api/batch-events` (alias `/api/events/batch`)
/// - `GET`/`DELETE` `/api/events`
/// - `GET` `/api/health`
/// - 405 with `Allow` for any other `/api` path
/// - static files from the configured public directory otherwise
///
/// Bodies above the configured limit are rejected with 413 before parsing.
/// API responses carry `Cache-Control: no-store`.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let instant = get(handlers::list_instant).post(handlers::post_instant);
    let batch = get(handlers::list_batch).post(handlers::post_batch);

    let api = Router::new()
        .route("/events", get(handlers::list_events).delete(handlers::clear_events))
        .route("/instant-events", instant.clone())
        .route("/events/instant", instant)
        .route("/batch-events", batch.clone())
        .route("/events/batch", batch)
        .route("/health", get(handlers::health))
        .fallback(handlers::api_fallback)
        .layer(DefaultBodyLimit::max(state.limits.max_body_bytes))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ));

    Router::new()
        .nest("/api", api)
        .fallback_service(ServeDir::new(&state.public_dir))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
