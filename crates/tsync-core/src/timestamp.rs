//! Naive local timestamp helpers
//!
//! Every store exchanges timestamps as naive local wall-clock values. The
//! text form used on the wire is `YYYY-MM-DD HH:MM:SS`, which DuckDB casts
//! to `TIMESTAMP` without loss.

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, TimeZone, Timelike, Utc};

use crate::error::{CoreError, CoreResult};

/// Canonical text format for timestamps exchanged with the stores.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const ACCEPTED_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Drop seconds and sub-second precision.
pub fn truncate_to_minute(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(ts)
}

/// Format a timestamp in the canonical store text format.
pub fn format_ts(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a timestamp from any of the accepted text forms.
pub fn parse_ts(value: &str) -> CoreResult<NaiveDateTime> {
    let trimmed = value.trim();
    ACCEPTED_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .ok_or_else(|| CoreError::InvalidTimestamp {
            value: value.to_string(),
        })
}

/// Convert naive local time to UTC given the local offset from UTC in minutes.
pub fn local_to_utc(local: NaiveDateTime, utc_offset_minutes: i32) -> NaiveDateTime {
    local - Duration::minutes(i64::from(utc_offset_minutes))
}

/// Current wall-clock time expressed as naive local time.
pub fn local_now(utc_offset_minutes: i32) -> NaiveDateTime {
    let now: DateTime<Utc> = Utc::now();
    match FixedOffset::east_opt(utc_offset_minutes * 60) {
        Some(offset) => offset.from_utc_datetime(&now.naive_utc()).naive_local(),
        None => now.naive_utc(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_truncate_to_minute() {
        assert_eq!(truncate_to_minute(at(7, 27, 59)), at(7, 27, 0));
        assert_eq!(truncate_to_minute(at(7, 27, 0)), at(7, 27, 0));
    }

    #[test]
    fn test_parse_accepts_short_and_iso_forms() {
        assert_eq!(parse_ts("2025-06-01 07:27").unwrap(), at(7, 27, 0));
        assert_eq!(parse_ts("2025-06-01T07:27:13").unwrap(), at(7, 27, 13));
        assert_eq!(parse_ts(" 2025-06-01 07:27:13.250 ").unwrap().second(), 13);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = parse_ts("yesterday").unwrap_err();
        assert!(err.to_string().contains("E003"));
    }

    #[test]
    fn test_format_roundtrip() {
        let ts = at(23, 59, 0);
        assert_eq!(format_ts(ts), "2025-06-01 23:59:00");
        assert_eq!(parse_ts(&format_ts(ts)).unwrap(), ts);
    }

    #[test]
    fn test_local_to_utc_negative_offset() {
        // UTC-5: local 07:00 is 12:00 UTC
        assert_eq!(local_to_utc(at(7, 0, 0), -300), at(12, 0, 0));
    }
}
