//! Records persisted by the server, one per ingested event.
//!
//! Both record kinds serialize to one self-describing JSON object per line
//! in their channel's log file. Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::{BatchId, RecordId};
use crate::time::ServerTime;

/// Free-form client metadata attached to an event. Always a JSON object.
pub type Metadata = Map<String, Value>;

/// The delivery channel an event travels on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Per-event delivery at the moment the event occurs.
    Instant,
    /// Deferred bulk delivery at session end.
    Batch,
}

impl Channel {
    /// Short lowercase name used in logs and file names.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Instant => "instant",
            Self::Batch => "batch",
        }
    }
}

impl core::fmt::Display for Channel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single event accepted on the instant channel.
///
/// Immutable once written; removed only by clearing the whole log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstantRecord {
    /// Server-assigned identity.
    pub id: RecordId,
    /// Client sequence number, or the server fallback when the client's was invalid.
    pub seq: u64,
    /// Trimmed, non-empty event message.
    pub message: String,
    /// Optional event category.
    pub event_type: Option<String>,
    /// Client-side timestamp as sent by the client.
    pub client_time: Option<String>,
    /// Client metadata object.
    pub meta: Option<Metadata>,
    /// Server time stamps.
    #[serde(flatten)]
    pub time: ServerTime,
}

/// A single event accepted as part of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRecord {
    /// Server-assigned identity.
    pub id: RecordId,
    /// Shared by every record of the same batch call.
    pub batch_id: BatchId,
    /// Client sequence number, or the server fallback.
    pub seq: u64,
    /// Trimmed, non-empty event message.
    pub message: String,
    /// Optional event category.
    pub event_type: Option<String>,
    /// Client-side timestamp of the original event.
    pub local_time: Option<String>,
    /// Client metadata object.
    pub extra: Option<Metadata>,
    /// Server time stamps (identical across one batch).
    #[serde(flatten)]
    pub time: ServerTime,
}

/// Per-channel record counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelCounts {
    /// Number of instant records.
    pub instant: usize,
    /// Number of batch records.
    pub batch: usize,
}

/// Full view of both channels as returned by `GET /api/events`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsSnapshot {
    /// Every instant record in append order.
    #[serde(default)]
    pub instant: Vec<InstantRecord>,
    /// Every batch record in append order.
    #[serde(default)]
    pub batch: Vec<BatchRecord>,
    /// Record counts per channel.
    #[serde(default)]
    pub counts: ChannelCounts,
    /// When the snapshot was taken (UTC, RFC 3339).
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn sample_time() -> ServerTime {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        ServerTime {
            server_time: at,
            server_time_local: String::from("2023-11-15 00:13:20"),
            server_time_zone: String::from("Europe/Kyiv"),
            server_time_ms: at.timestamp_millis(),
        }
    }

    #[test]
    fn instant_record_flattens_server_time_in_camel_case() {
        let record = InstantRecord {
            id: RecordId::new(),
            seq: 1,
            message: String::from("Play clicked"),
            event_type: Some(String::from("control")),
            client_time: None,
            meta: None,
            time: sample_time(),
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["seq"], 1);
        assert_eq!(json["eventType"], "control");
        assert_eq!(json["serverTimeMs"], 1_700_000_000_123_i64);
        assert_eq!(json["serverTimeZone"], "Europe/Kyiv");
        assert!(json["serverTime"].as_str().unwrap().starts_with("2023-11-14T22:13:20.123"));
        assert!(json["clientTime"].is_null());
        assert!(json.get("time").is_none());
    }

    #[test]
    fn batch_record_parses_from_log_line() {
        let line = r#"{"id":"0190b2a4-0000-7000-8000-000000000001","batchId":"0190b2a4-0000-7000-8000-000000000002","seq":4,"message":"Bounce","eventType":null,"localTime":"2024-07-01T10:00:00.000Z","extra":{"x":3},"serverTime":"2024-07-01T10:00:01.000Z","serverTimeLocal":"2024-07-01 13:00:01","serverTimeZone":"Europe/Kyiv","serverTimeMs":1719828001000}"#;
        let record: BatchRecord = serde_json::from_str(line).unwrap();
        assert_eq!(record.seq, 4);
        assert_eq!(record.extra.unwrap()["x"], 3);
        assert_eq!(record.time.server_time_ms, 1_719_828_001_000);
    }

    #[test]
    fn channel_display_matches_file_naming() {
        assert_eq!(Channel::Instant.to_string(), "instant");
        assert_eq!(Channel::Batch.as_str(), "batch");
    }
}
