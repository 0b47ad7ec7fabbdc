//! Minute-resolution time windows

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, CoreResult};
use crate::timestamp::{format_ts, truncate_to_minute};

/// A closed range of minutes `[start, end]`.
///
/// Both bounds are truncated to the minute on construction. A sample belongs
/// to the window when its own minute falls inside the range, so store queries
/// use the half-open instant range `[start, end + 1 minute)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl TimeWindow {
    /// Create a window, rejecting an end that precedes the start.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> CoreResult<Self> {
        let start = truncate_to_minute(start);
        let end = truncate_to_minute(end);
        if end < start {
            return Err(CoreError::InvalidWindow {
                start: format_ts(start),
                end: format_ts(end),
            });
        }
        Ok(Self { start, end })
    }

    /// The full calendar day `[00:00, 23:59]`.
    pub fn day(date: NaiveDate) -> Self {
        let start = date.and_time(NaiveTime::MIN);
        Self {
            start,
            end: start + Duration::days(1) - Duration::minutes(1),
        }
    }

    /// The `radius` minutes before `center` plus the `radius` minutes
    /// starting at it, so `end_exclusive()` is `center + radius`.
    ///
    /// A zero radius still covers the minute of `center`.
    pub fn around(center: NaiveDateTime, radius: Duration) -> Self {
        let center = truncate_to_minute(center);
        let end = center + radius - Duration::minutes(1);
        Self {
            start: center - radius,
            end: end.max(center),
        }
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    /// Last minute included in the window.
    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    /// Exclusive instant bound for store range queries.
    pub fn end_exclusive(&self) -> NaiveDateTime {
        self.end + Duration::minutes(1)
    }

    /// Whether the minute of `ts` falls inside the window.
    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        let minute = truncate_to_minute(ts);
        minute >= self.start && minute <= self.end
    }

    /// Extend the window by `margin` on both sides.
    pub fn widen(&self, margin: Duration) -> Self {
        Self {
            start: self.start - margin,
            end: self.end + margin,
        }
    }

    /// Number of minutes covered, counting both bounds.
    pub fn minute_count(&self) -> i64 {
        (self.end - self.start).num_minutes() + 1
    }

    /// Iterate every minute of the window in ascending order.
    pub fn minutes(&self) -> impl Iterator<Item = NaiveDateTime> {
        let start = self.start;
        (0..self.minute_count()).map(move |i| start + Duration::minutes(i))
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", format_ts(self.start), format_ts(self.end))
    }
}
