//! Recording client for the Eventline event recorder.
//!
//! The client records events locally first and delivers them to the ingest
//! server on two channels:
//!
//! - **Instant**: each event is sent as it is logged, through a per-channel
//!   [`DeliveryQueue`] that keeps sends in order and never overlaps them
//! - **Batch**: on [`Session::close`], every journal entry past the batch
//!   cursor is sent in batches of at most [`MAX_BATCH_EVENTS`]; the cursor
//!   advances after each acknowledged batch
//!
//! # Modules
//!
//! - [`store`] -- Local key/value storage (files or memory)
//! - [`sequence`] -- Restart-safe sequence numbers
//! - [`cursor`] -- Batch cursor
//! - [`journal`] -- Durable local journal
//! - [`http`] -- Ingest API client
//! - [`delivery`] -- Ordered per-channel send queues
//! - [`reconcile`] -- Server vs local comparison table
//! - [`session`] -- Facade tying the pieces together

pub mod config;
pub mod cursor;
pub mod delivery;
pub mod error;
pub mod http;
pub mod journal;
pub mod reconcile;
pub mod sequence;
pub mod session;
pub mod store;

pub use config::ClientConfig;
pub use cursor::BatchCursor;
pub use delivery::{DeliveryHandle, DeliveryQueue};
pub use error::ClientError;
pub use http::{BatchAck, EventsClient};
pub use journal::LocalEventJournal;
pub use reconcile::{Alignment, ReconciliationRow, ReconciliationView};
pub use sequence::SequenceAllocator;
pub use session::{BatchOutcome, CloseReport, LoggedEvent, MAX_BATCH_EVENTS, Session};
pub use store::LocalStore;
