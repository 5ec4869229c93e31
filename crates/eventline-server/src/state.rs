//! Shared application state for the ingest API server.
//!
//! [`AppState`] owns the two channel logs (and through them the in-memory
//! indexes that answer reads), the server clock, and the request limits.
//! It is wrapped in [`Arc`](std::sync::Arc) and injected via Axum's
//! `State` extractor.

use std::path::PathBuf;

use eventline_store::{EventStore, StoreError};

use crate::clock::ServerClock;
use crate::config::ServerConfig;
use crate::ingest::IngestLimits;

/// Shared state for the Axum application.
pub struct AppState {
    /// Instant and batch channel logs.
    pub store: EventStore,
    /// Clock used to stamp accepted events.
    pub clock: ServerClock,
    /// Body-size and batch-size limits.
    pub limits: IngestLimits,
    /// Directory served for non-API paths.
    pub public_dir: PathBuf,
}

impl AppState {
    /// Open the channel logs under `config.data_dir` and build the state.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if either log cannot be opened.
    pub async fn open(config: &ServerConfig) -> Result<Self, StoreError> {
        let store = EventStore::open(&config.data_dir).await?;
        Ok(Self {
            store,
            clock: ServerClock::new(&config.timezone),
            limits: config.limits(),
            public_dir: config.public_dir.clone(),
        })
    }
}
