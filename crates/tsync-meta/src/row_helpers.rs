//! Shared helpers for moving timestamps in and out of DuckDB rows.
//!
//! Timestamps travel as `YYYY-MM-DD HH:MM:SS` text: bound parameters are
//! wrapped in `CAST(? AS TIMESTAMP)` and selected columns in `strftime`.

use crate::error::{MetaError, MetaResult};
use chrono::{NaiveDate, NaiveDateTime};
use tsync_core::timestamp::{parse_ts, TIMESTAMP_FORMAT};

/// `strftime(<column>, '<canonical format>')`
pub(crate) fn ts_text(column: &str) -> String {
    format!("strftime({column}, '{TIMESTAMP_FORMAT}')")
}

/// Parse a timestamp produced by [`ts_text`].
pub(crate) fn parse_stored_ts(value: &str) -> MetaResult<NaiveDateTime> {
    parse_ts(value).map_err(|e| MetaError::InvalidData(e.to_string()))
}

/// Parse a date produced by `strftime(<date>, '%Y-%m-%d')`.
pub(crate) fn parse_stored_date(value: &str) -> MetaResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| MetaError::InvalidData(format!("date '{value}': {e}")))
}

/// Read a column value as an optional String.
///
/// DuckDB integer columns return `None` for `Option<String>`, so we try
/// String -> i64 -> f64 -> bool.
pub(crate) fn get_column_as_string(row: &duckdb::Row<'_>, idx: usize) -> Option<String> {
    if let Ok(Some(s)) = row.get::<_, Option<String>>(idx) {
        return Some(s);
    }
    if let Ok(Some(n)) = row.get::<_, Option<i64>>(idx) {
        return Some(n.to_string());
    }
    if let Ok(Some(f)) = row.get::<_, Option<f64>>(idx) {
        return Some(f.to_string());
    }
    if let Ok(Some(b)) = row.get::<_, Option<bool>>(idx) {
        return Some(b.to_string());
    }
    None
}
