//! Client-side journal entries and the payloads built from them.

use serde::{Deserialize, Serialize};

use crate::records::Metadata;

/// One event as recorded in the client's local journal.
///
/// Persisted independently of any server acknowledgement. An entry with
/// sequence `n` corresponds to the instant or batch record eventually
/// produced from it, but no shared id links the two.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    /// Local sequence number, unique and increasing within one journal epoch.
    pub seq: u64,
    /// Optional event category.
    pub event_type: Option<String>,
    /// Event message.
    pub message: String,
    /// Local UTC time the event was logged (RFC 3339).
    pub local_time: String,
    /// Client metadata object.
    pub extra: Option<Metadata>,
}

/// Body of `POST /api/instant-events`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstantPayload {
    /// Local sequence number.
    pub seq: u64,
    /// Event message.
    pub message: String,
    /// Optional event category.
    pub event_type: Option<String>,
    /// Local time of the event.
    pub client_time: Option<String>,
    /// Client metadata object.
    pub meta: Option<Metadata>,
}

impl From<&JournalEntry> for InstantPayload {
    fn from(entry: &JournalEntry) -> Self {
        Self {
            seq: entry.seq,
            message: entry.message.clone(),
            event_type: entry.event_type.clone(),
            client_time: Some(entry.local_time.clone()),
            meta: entry.extra.clone(),
        }
    }
}

/// One item of a batch submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem {
    /// Local sequence number.
    pub seq: u64,
    /// Event message.
    pub message: String,
    /// Optional event category.
    pub event_type: Option<String>,
    /// Local time of the event.
    pub local_time: Option<String>,
    /// Client metadata object.
    pub extra: Option<Metadata>,
}

impl From<&JournalEntry> for BatchItem {
    fn from(entry: &JournalEntry) -> Self {
        Self {
            seq: entry.seq,
            message: entry.message.clone(),
            event_type: entry.event_type.clone(),
            local_time: Some(entry.local_time.clone()),
            extra: entry.extra.clone(),
        }
    }
}

/// Body of `POST /api/batch-events`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchPayload {
    /// Items in journal order.
    pub events: Vec<BatchItem>,
}

impl BatchPayload {
    /// Build a batch payload from journal entries, preserving their order.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a JournalEntry>) -> Self {
        Self {
            events: entries.into_iter().map(BatchItem::from).collect(),
        }
    }
}
