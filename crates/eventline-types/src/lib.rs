//! Shared type definitions for the Eventline event recorder.
//!
//! This crate is the single source of truth for the wire and on-disk shapes
//! exchanged between the client, the ingest server, and the append logs.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for record and batch identifiers
//! - [`time`] -- The server-time stamp attached to every record
//! - [`records`] -- Persisted instant and batch records, channel enum
//! - [`journal`] -- Client journal entries and outbound payloads

pub mod ids;
pub mod journal;
pub mod records;
pub mod time;

// Re-export all public types at crate root for convenience.
pub use ids::{BatchId, RecordId};
pub use journal::{BatchItem, BatchPayload, InstantPayload, JournalEntry};
pub use records::{BatchRecord, Channel, ChannelCounts, EventsSnapshot, InstantRecord, Metadata};
pub use time::ServerTime;
