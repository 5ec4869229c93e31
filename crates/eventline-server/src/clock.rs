//! Server clock producing mutually consistent time stamps.

use chrono::{DateTime, Local, Utc};
use chrono_tz::Tz;
use eventline_types::ServerTime;
use tracing::warn;

/// Layout of `serverTimeLocal`.
const LOCAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Stamps records with UTC time, a zone-local rendering, the zone name,
/// and epoch milliseconds, all taken from a single clock read.
#[derive(Debug, Clone)]
pub struct ServerClock {
    zone_name: String,
    zone: Option<Tz>,
}

impl ServerClock {
    /// Create a clock for the named IANA zone.
    ///
    /// An unknown zone name is kept for `serverTimeZone`, but the local
    /// rendering falls back to the host's local zone.
    pub fn new(zone_name: &str) -> Self {
        let zone = zone_name.parse::<Tz>().ok();
        if zone.is_none() {
            warn!(zone = zone_name, "unknown time zone, rendering local time in host zone");
        }
        Self {
            zone_name: zone_name.to_owned(),
            zone,
        }
    }

    /// The configured zone name.
    pub fn zone_name(&self) -> &str {
        &self.zone_name
    }

    /// Stamp the current instant.
    pub fn now(&self) -> ServerTime {
        self.stamp(Utc::now())
    }

    /// Stamp a given instant, truncated to millisecond precision.
    pub fn stamp(&self, at: DateTime<Utc>) -> ServerTime {
        let ms = at.timestamp_millis();
        let at = DateTime::from_timestamp_millis(ms).unwrap_or(at);
        let local = match self.zone {
            Some(tz) => at.with_timezone(&tz).format(LOCAL_FORMAT).to_string(),
            None => at.with_timezone(&Local).format(LOCAL_FORMAT).to_string(),
        };
        ServerTime {
            server_time: at,
            server_time_local: local,
            server_time_zone: self.zone_name.clone(),
            server_time_ms: ms,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn stamp_fields_are_mutually_consistent() {
        let clock = ServerClock::new("Europe/Kyiv");
        let at = Utc.with_ymd_and_hms(2024, 7, 1, 10, 0, 0).unwrap()
            + chrono::Duration::microseconds(123_456);

        let stamp = clock.stamp(at);

        assert_eq!(stamp.server_time_ms, 1_719_828_000_123);
        assert_eq!(stamp.server_time.timestamp_millis(), stamp.server_time_ms);
        assert_eq!(stamp.server_time.timestamp_subsec_micros(), 123_000);
        assert_eq!(stamp.server_time_local, "2024-07-01 13:00:00");
        assert_eq!(stamp.server_time_zone, "Europe/Kyiv");
    }

    #[test]
    fn unknown_zone_keeps_configured_name() {
        let clock = ServerClock::new("Mars/Olympus");
        let stamp = clock.now();
        assert_eq!(stamp.server_time_zone, "Mars/Olympus");
        assert_eq!(stamp.server_time_local.len(), 19);
    }
}
