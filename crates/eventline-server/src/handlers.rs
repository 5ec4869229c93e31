//! REST API endpoint handlers for the ingest server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/instant-events` | Store one event |
//! | `POST` | `/api/batch-events` | Store a batch of events |
//! | `GET` | `/api/events` | Both channels with counts |
//! | `GET` | `/api/instant-events` | Instant channel items |
//! | `GET` | `/api/batch-events` | Batch channel items |
//! | `DELETE` | `/api/events` | Truncate both channels |
//! | `GET` | `/api/health` | Liveness probe |
//!
//! The in-memory indexes are extended by the log writers only after a
//! write is durable, so reads may briefly lag an in-flight write but never
//! show a write that failed.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{SecondsFormat, Utc};
use eventline_types::{BatchId, ChannelCounts, EventsSnapshot, InstantRecord};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::extract::JsonPayload;
use crate::ingest;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Body of a successful instant submission.
#[derive(Debug, Serialize)]
struct InstantAccepted {
    ok: bool,
    event: InstantRecord,
}

/// Body of a successful batch submission.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchAccepted {
    ok: bool,
    batch_id: BatchId,
    stored: usize,
}

/// Body of a single-channel listing.
#[derive(Debug, Serialize)]
struct Items<T> {
    items: Vec<T>,
}

fn next_seq(len: usize) -> u64 {
    u64::try_from(len).unwrap_or(u64::MAX).saturating_add(1)
}

// ---------------------------------------------------------------------------
// POST /api/instant-events
// ---------------------------------------------------------------------------

/// Validate, stamp, and durably append one instant-channel event.
pub async fn post_instant(
    State(state): State<Arc<AppState>>,
    JsonPayload(payload): JsonPayload,
) -> Result<impl IntoResponse, ApiError> {
    let log = state.store.instant();
    let fallback_seq = next_seq(log.len().await);
    let record = ingest::build_instant_record(&payload, fallback_seq, &state.clock)?;

    log.append(vec![record.clone()]).await?;
    debug!(seq = record.seq, id = %record.id, "instant event stored");

    Ok((
        StatusCode::CREATED,
        Json(InstantAccepted {
            ok: true,
            event: record,
        }),
    ))
}

// ---------------------------------------------------------------------------
// POST /api/batch-events
// ---------------------------------------------------------------------------

/// Validate a whole batch, then append every item as one write.
pub async fn post_batch(
    State(state): State<Arc<AppState>>,
    JsonPayload(payload): JsonPayload,
) -> Result<impl IntoResponse, ApiError> {
    let log = state.store.batch();
    let fallback_start = next_seq(log.len().await);
    let batch = ingest::build_batch(&payload, fallback_start, state.limits, &state.clock)?;

    let stored = log.append(batch.records).await?;
    info!(batch_id = %batch.batch_id, stored, "batch stored");

    Ok((
        StatusCode::CREATED,
        Json(BatchAccepted {
            ok: true,
            batch_id: batch.batch_id,
            stored,
        }),
    ))
}

// ---------------------------------------------------------------------------
// GET /api/events, /api/instant-events, /api/batch-events
// ---------------------------------------------------------------------------

/// Return both channels in full with per-channel counts.
pub async fn list_events(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let instant = state.store.instant().records().await;
    let batch = state.store.batch().records().await;
    let counts = ChannelCounts {
        instant: instant.len(),
        batch: batch.len(),
    };
    Json(EventsSnapshot {
        instant,
        batch,
        counts,
        updated_at: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
    })
}

/// Return the instant channel.
pub async fn list_instant(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(Items {
        items: state.store.instant().records().await,
    })
}

/// Return the batch channel.
pub async fn list_batch(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(Items {
        items: state.store.batch().records().await,
    })
}

// ---------------------------------------------------------------------------
// DELETE /api/events
// ---------------------------------------------------------------------------

/// Truncate both channel files, then empty the in-memory logs.
pub async fn clear_events(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    state.store.clear().await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

// ---------------------------------------------------------------------------
// GET /api/health, fallback
// ---------------------------------------------------------------------------

/// Liveness probe.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Any unmatched path under `/api`.
pub async fn api_fallback() -> ApiError {
    ApiError::MethodNotAllowed
}
