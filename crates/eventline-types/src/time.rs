//! Server-side time stamps attached to every persisted record.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// The four mutually consistent server-time fields of a record.
///
/// All four are derived from a single clock read, truncated to millisecond
/// precision, so `server_time` and `server_time_ms` always denote the same
/// instant and `server_time_local` is a rendering of that instant in
/// `server_time_zone`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerTime {
    /// UTC instant in RFC 3339 form, always with three fraction digits.
    #[serde(serialize_with = "serialize_millis")]
    pub server_time: DateTime<Utc>,
    /// `YYYY-MM-DD HH:MM:SS` rendering in the configured zone.
    pub server_time_local: String,
    /// Name of the configured zone (for example `Europe/Kyiv`).
    pub server_time_zone: String,
    /// Milliseconds since the Unix epoch.
    pub server_time_ms: i64,
}

fn serialize_millis<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn stamp(at: DateTime<Utc>) -> ServerTime {
        ServerTime {
            server_time: at,
            server_time_local: String::from("2024-07-01 13:00:00"),
            server_time_zone: String::from("Europe/Kyiv"),
            server_time_ms: at.timestamp_millis(),
        }
    }

    #[test]
    fn whole_second_keeps_millisecond_fraction() {
        let time = stamp(Utc.with_ymd_and_hms(2024, 7, 1, 10, 0, 0).unwrap());

        let json = serde_json::to_value(&time).unwrap();

        assert_eq!(json["serverTime"], "2024-07-01T10:00:00.000Z");
        assert_eq!(serde_json::from_value::<ServerTime>(json).unwrap(), time);
    }

    #[test]
    fn fraction_is_always_three_digits() {
        let at = DateTime::from_timestamp_millis(1_719_828_000_120).unwrap();

        let json = serde_json::to_value(stamp(at)).unwrap();

        assert_eq!(json["serverTime"], "2024-07-01T10:00:00.120Z");
    }
}
