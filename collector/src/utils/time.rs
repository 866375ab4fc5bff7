//! Time utility functions

use std::time::Instant;

use chrono::{DateTime, Utc};

/// Milliseconds elapsed since `start`, as a fractional value
pub fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Convert a timestamp to milliseconds since Unix epoch (storage format)
pub fn datetime_to_millis(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

/// Convert milliseconds since Unix epoch to DateTime<Utc>
pub fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_else(|| {
        tracing::warn!(millis, "Invalid timestamp, using epoch");
        DateTime::UNIX_EPOCH
    })
}

/// Current time in milliseconds since Unix epoch
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone};

    #[test]
    fn test_elapsed_ms_non_negative() {
        let start = Instant::now();
        assert!(elapsed_ms(start) >= 0.0);
    }

    #[test]
    fn test_millis_roundtrip_known_value() {
        // 2024-01-01 00:00:00.250 UTC
        let dt = Utc.timestamp_millis_opt(1_704_067_200_250).unwrap();
        let millis = datetime_to_millis(&dt);
        assert_eq!(millis, 1_704_067_200_250);

        let back = millis_to_datetime(millis);
        assert_eq!(back.year(), 2024);
        assert_eq!(back.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn test_millis_to_datetime_invalid_uses_epoch() {
        assert_eq!(millis_to_datetime(i64::MAX), DateTime::UNIX_EPOCH);
    }
}
