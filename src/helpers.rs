//! Shared helpers for session-relative time conversions.
//!
//! The provider reports wall-clock timestamps and lap durations as float
//! seconds; the pipeline works on `chrono::Duration` offsets from the
//! session start, and the routes hand plain seconds to the charts.
//!
//! Durations are kept at millisecond resolution, which is what the timing
//! feed publishes.

use chrono::{DateTime, Duration, Utc};

/// Offset of `at` from `session_start` (negative when `at` precedes it).
pub(crate) fn offset_since(session_start: DateTime<Utc>, at: DateTime<Utc>) -> Duration {
    at.signed_duration_since(session_start)
}

/// Longest duration the feed can meaningfully report (one day).
const MAX_DURATION_SECS: f64 = 86_400.0;

/// Convert a float number of seconds to a `Duration`.
///
/// Returns `None` for non-finite, negative or longer-than-a-day inputs, which
/// the feed uses for laps that were never completed.
pub(crate) fn seconds_to_duration(secs: f64) -> Option<Duration> {
    if !(0.0..=MAX_DURATION_SECS).contains(&secs) {
        tracing::warn!("seconds_to_duration received invalid value {}, treating as missing", secs);
        return None;
    }
    Some(Duration::milliseconds((secs * 1000.0).round() as i64))
}

/// Convert a `Duration` to float seconds (millisecond resolution).
pub(crate) fn duration_to_seconds(d: Duration) -> f64 {
    d.num_milliseconds() as f64 / 1000.0
}

/// Convert an optional `Duration` to optional float seconds.
pub(crate) fn opt_duration_to_seconds(d: Option<Duration>) -> Option<f64> {
    d.map(duration_to_seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_since_positive() {
        let start = "2023-09-03T13:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let at = "2023-09-03T13:03:31.264Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(offset_since(start, at), Duration::milliseconds(211_264));
    }

    #[test]
    fn test_offset_since_negative() {
        let start = "2023-09-03T13:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let at = "2023-09-03T12:59:00Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(offset_since(start, at), Duration::seconds(-60));
    }

    #[test]
    fn test_seconds_to_duration_normal() {
        assert_eq!(seconds_to_duration(85.123), Some(Duration::milliseconds(85_123)));
    }

    #[test]
    fn test_seconds_to_duration_rounds() {
        // 0.0004 s rounds away below millisecond resolution
        assert_eq!(seconds_to_duration(60.0004), Some(Duration::seconds(60)));
    }

    #[test]
    fn test_seconds_to_duration_nan() {
        assert_eq!(seconds_to_duration(f64::NAN), None);
    }

    #[test]
    fn test_seconds_to_duration_infinity() {
        assert_eq!(seconds_to_duration(f64::INFINITY), None);
    }

    #[test]
    fn test_seconds_to_duration_negative() {
        assert_eq!(seconds_to_duration(-1.0), None);
    }

    #[test]
    fn test_seconds_to_duration_rejects_absurd_values() {
        assert_eq!(seconds_to_duration(1e300), None);
        assert_eq!(seconds_to_duration(86_400.5), None);
        assert_eq!(seconds_to_duration(86_400.0), Some(Duration::days(1)));
    }

    #[test]
    fn test_duration_to_seconds() {
        assert!((duration_to_seconds(Duration::milliseconds(61_500)) - 61.5).abs() < 1e-12);
    }

    #[test]
    fn test_opt_duration_to_seconds() {
        assert_eq!(opt_duration_to_seconds(None), None);
        assert_eq!(opt_duration_to_seconds(Some(Duration::seconds(58))), Some(58.0));
    }
}
