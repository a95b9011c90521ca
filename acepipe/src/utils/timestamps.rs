//! Timestamp helpers.

use chrono::{DateTime, SubsecRound, Utc};

/// Represents a UTC timestamp that can be serialized/deserialized.
pub type Timestamp = DateTime<Utc>;

/// Formats a timestamp as ISO 8601 with microseconds.
///
/// Format: `YYYY-MM-DDTHH:MM:SS.ffffff+00:00`
///
/// # Examples
///
/// ```
/// use acepipe::utils::{format_timestamp, now_utc};
///
/// let ts = format_timestamp(&now_utc());
/// assert!(ts.ends_with("+00:00"));
/// ```
#[must_use]
pub fn format_timestamp(ts: &Timestamp) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
}

/// Returns the current UTC timestamp, truncated to microseconds.
///
/// Stored timestamps use microsecond precision, so a stamped value
/// survives a write and re-read unchanged.
#[must_use]
pub fn now_utc() -> Timestamp {
    Utc::now().trunc_subsecs(6)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_timestamp_fixed() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap();
        assert_eq!(format_timestamp(&ts), "2024-03-01T12:30:05.000000+00:00");
    }

    #[test]
    fn test_format_round_trips_through_rfc3339() {
        let ts = now_utc();
        let parsed = DateTime::parse_from_rfc3339(&format_timestamp(&ts)).unwrap();
        assert_eq!(parsed.timestamp(), ts.timestamp());
    }

    #[test]
    fn test_now_survives_format_and_parse_exactly() {
        let ts = now_utc();
        assert_eq!(ts.timestamp_subsec_nanos() % 1_000, 0);
        let parsed = DateTime::parse_from_rfc3339(&format_timestamp(&ts))
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(parsed, ts);
    }
}
