//! Comparison audit log.

use crate::error::{MetaResult, MetaResultExt};
use chrono::NaiveDateTime;
use duckdb::Connection;
use serde::Serialize;
use tsync_core::timestamp::format_ts;
use tsync_core::TimeWindow;

/// One destination value that disagrees with the canonical store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mismatch {
    pub table_name: String,
    pub column_name: String,
    pub timestamp: NaiveDateTime,
    pub canonical_value: Option<f64>,
    pub destination_value: Option<f64>,
    /// Absolute difference, when both sides carry a value
    pub difference: Option<f64>,
}

/// Append mismatches to the audit log.
pub fn record_mismatches(
    conn: &Connection,
    cursor_id: Option<i64>,
    mismatches: &[Mismatch],
) -> MetaResult<usize> {
    if mismatches.is_empty() {
        return Ok(0);
    }
    let mut stmt = conn
        .prepare(
            "INSERT INTO tsync.comparison_log
                 (cursor_id, table_name, column_name, ts, canonical_value, destination_value, difference)
             VALUES (?, ?, ?, CAST(? AS TIMESTAMP), ?, ?, ?)",
        )
        .write_context("prepare comparison_log insert")?;
    for m in mismatches {
        stmt.execute(duckdb::params![
            cursor_id,
            m.table_name,
            m.column_name,
            format_ts(m.timestamp),
            m.canonical_value,
            m.destination_value,
            m.difference,
        ])
        .write_context("insert comparison_log")?;
    }
    Ok(mismatches.len())
}

/// Number of logged mismatches, optionally restricted to a window.
pub fn mismatch_count(conn: &Connection, window: Option<&TimeWindow>) -> MetaResult<i64> {
    match window {
        Some(w) => conn.query_row(
            "SELECT COUNT(*) FROM tsync.comparison_log
             WHERE ts >= CAST(? AS TIMESTAMP) AND ts < CAST(? AS TIMESTAMP)",
            duckdb::params![format_ts(w.start()), format_ts(w.end_exclusive())],
            |row| row.get(0),
        ),
        None => conn.query_row("SELECT COUNT(*) FROM tsync.comparison_log", [], |row| {
            row.get(0)
        }),
    }
    .query_context("count comparison_log")
}
