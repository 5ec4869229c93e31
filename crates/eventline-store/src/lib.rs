//! Durable, order-preserving storage for ingested events.
//!
//! # Modules
//!
//! - [`append_log`] -- One NDJSON file per channel, written by a single task
//! - [`event_store`] -- The instant and batch logs opened together
//! - [`error`] -- [`StoreError`]

pub mod append_log;
pub mod error;
pub mod event_store;

pub use append_log::{AppendLog, LoadReport, WriteFault};
pub use error::StoreError;
pub use event_store::{BATCH_FILE, EventStore, INSTANT_FILE};
