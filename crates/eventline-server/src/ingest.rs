//! Validation and stamping of incoming event payloads.
//!
//! Both channels share the per-field rules: `message` must be a non-empty
//! string after trimming; `seq` must be a positive integer or the server
//! substitutes a fallback; optional strings collapse to `None` when absent,
//! non-string, or blank; metadata must be a JSON object or is dropped.
//!
//! The instant channel validates one event in isolation. A batch is
//! all-or-nothing: the first invalid item rejects the whole batch, and
//! its index is reported.

use eventline_types::{BatchId, BatchRecord, InstantRecord, Metadata, RecordId, ServerTime};
use serde_json::Value;

use crate::clock::ServerClock;

/// Largest integer a JSON client can represent exactly (2^53 - 1).
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Size limits applied to incoming requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestLimits {
    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
    /// Maximum number of items in one batch.
    pub max_batch_events: usize,
}

impl Default for IngestLimits {
    fn default() -> Self {
        Self {
            max_body_bytes: 2 * 1024 * 1024,
            max_batch_events: 5000,
        }
    }
}

/// Why a payload was rejected. The display text is the client-facing reason.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IngestError {
    /// An instant event had no usable message.
    #[error("message is required")]
    MissingMessage,

    /// The batch body had neither an `events` nor an `items` array.
    #[error("events must be an array")]
    NotAnArray,

    /// The batch array was empty.
    #[error("events array is empty")]
    EmptyBatch,

    /// The batch array was longer than the configured maximum.
    #[error("events array exceeds {limit}")]
    TooManyEvents {
        /// The configured maximum.
        limit: usize,
    },

    /// A batch item had no usable message.
    #[error("events[{index}] message is required")]
    ItemMissingMessage {
        /// Zero-based position of the offending item.
        index: usize,
    },
}

/// A validated batch, ready to append as one write.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedBatch {
    /// Shared by every record below.
    pub batch_id: BatchId,
    /// Records in submission order.
    pub records: Vec<BatchRecord>,
}

/// Validate one instant-channel payload and build its record.
///
/// `fallback_seq` is used when the payload's `seq` is missing or invalid;
/// callers pass the current instant-log length plus one.
///
/// # Errors
///
/// Returns [`IngestError::MissingMessage`] if `message` is absent or blank.
pub fn build_instant_record(
    payload: &Value,
    fallback_seq: u64,
    clock: &ServerClock,
) -> Result<InstantRecord, IngestError> {
    let message = normalize_string(payload.get("message")).ok_or(IngestError::MissingMessage)?;
    Ok(InstantRecord {
        id: RecordId::new(),
        seq: normalize_seq(payload.get("seq"), fallback_seq),
        message,
        event_type: normalize_string(payload.get("eventType")),
        client_time: normalize_string(payload.get("clientTime")),
        meta: object_or_none(payload.get("meta")),
        time: clock.now(),
    })
}

/// Validate a batch body and build one record per item.
///
/// The list is read from `events`, or from `items` when `events` is not an
/// array. Item `i` falls back to `fallback_start + i` for its `seq`; callers
/// pass the current batch-log length plus one. Every record shares one
/// [`BatchId`] and one server-time snapshot.
///
/// # Errors
///
/// Returns the first [`IngestError`] found; nothing is built in that case.
pub fn build_batch(
    payload: &Value,
    fallback_start: u64,
    limits: IngestLimits,
    clock: &ServerClock,
) -> Result<AcceptedBatch, IngestError> {
    let list = payload
        .get("events")
        .and_then(Value::as_array)
        .or_else(|| payload.get("items").and_then(Value::as_array))
        .ok_or(IngestError::NotAnArray)?;
    if list.is_empty() {
        return Err(IngestError::EmptyBatch);
    }
    if list.len() > limits.max_batch_events {
        return Err(IngestError::TooManyEvents {
            limit: limits.max_batch_events,
        });
    }

    let batch_id = BatchId::new();
    let time = clock.now();
    let records = list
        .iter()
        .enumerate()
        .map(|(index, item)| build_batch_record(item, index, fallback_start, batch_id, &time))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(AcceptedBatch { batch_id, records })
}

fn build_batch_record(
    item: &Value,
    index: usize,
    fallback_start: u64,
    batch_id: BatchId,
    time: &ServerTime,
) -> Result<BatchRecord, IngestError> {
    let message = normalize_string(item.get("message")).ok_or(IngestError::ItemMissingMessage { index })?;
    let offset = u64::try_from(index).unwrap_or(u64::MAX);
    Ok(BatchRecord {
        id: RecordId::new(),
        batch_id,
        seq: normalize_seq(item.get("seq"), fallback_start.saturating_add(offset)),
        message,
        event_type: normalize_string(item.get("eventType")),
        local_time: normalize_string(item.get("localTime"))
            .or_else(|| normalize_string(item.get("clientTime"))),
        extra: object_or_none(item.get("extra")),
        time: time.clone(),
    })
}

/// Trimmed string, or `None` when absent, not a string, or blank.
fn normalize_string(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}

/// Positive integer sequence number, or `fallback`.
///
/// Accepts JSON integers, integral floats, and numeric strings.
fn normalize_seq(value: Option<&Value>, fallback: u64) -> u64 {
    let seq = match value {
        Some(Value::Number(n)) => n.as_u64().or_else(|| n.as_f64().and_then(integral)),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<u64>().ok().or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    };
    seq.filter(|seq| *seq >= 1).unwrap_or(fallback)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn integral(value: f64) -> Option<u64> {
    let whole = value.is_finite() && value.fract().abs() < f64::EPSILON;
    (whole && (1.0..=MAX_SAFE_INTEGER).contains(&value)).then_some(value as u64)
}

/// The value itself when it is a JSON object; arrays and scalars are dropped.
fn object_or_none(value: Option<&Value>) -> Option<Metadata> {
    value.and_then(Value::as_object).cloned()
}
