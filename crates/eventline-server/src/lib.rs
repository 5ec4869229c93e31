//! Event ingest API server for the Eventline event recorder.
//!
//! This crate provides an Axum HTTP server that accepts client events on
//! two channels and persists them in arrival order:
//!
//! - **Instant channel** (`/api/instant-events`): one event per request,
//!   validated in isolation, stamped, and appended
//! - **Batch channel** (`/api/batch-events`): a list of events validated as
//!   a unit; either every item is appended in one write or none is
//! - **Reads and reset** (`/api/events`): both channels in full, or a
//!   truncate of both
//!
//! # Architecture
//!
//! Handlers run concurrently until they reach a channel log. Each log is
//! owned by a single writer task (see [`eventline_store::AppendLog`]) that
//! serializes writes to its file, so requests on the same channel are
//! written in submission order while the two channels proceed in parallel.

pub mod clock;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod ingest;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;

// Re-export primary types for convenience.
pub use config::{ConfigError, ServerConfig};
pub use error::ApiError;
pub use router::build_router;
pub use server::{ServerError, serve, start_server};
pub use startup::spawn_server;
pub use state::AppState;
