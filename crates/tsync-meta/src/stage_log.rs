//! Append-only stage log.
//!
//! One row per stage attempt. A row is written when the stage starts and
//! updated exactly once when it finishes.

use crate::error::{MetaError, MetaResult, MetaResultExt};
use crate::row_helpers::{parse_stored_ts, ts_text};
use chrono::NaiveDateTime;
use duckdb::Connection;
use serde::Serialize;
use tsync_core::timestamp::format_ts;
use tsync_core::{CoreError, CursorMode, Stage, TimeWindow};

/// A stage log row as read back for inspection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageLogEntry {
    pub log_id: i64,
    pub cursor_id: Option<i64>,
    pub mode: CursorMode,
    pub stage: Stage,
    pub window_start: NaiveDateTime,
    pub window_end: NaiveDateTime,
    pub started_at: NaiveDateTime,
    pub finished_at: Option<NaiveDateTime>,
    /// `None` while the stage is still running (or the process died)
    pub success: Option<bool>,
    pub row_count: Option<i64>,
    pub message: Option<String>,
    pub elapsed_ms: Option<i64>,
}

/// Record the start of a stage attempt and return its log id.
pub fn begin_stage(
    conn: &Connection,
    cursor_id: Option<i64>,
    mode: CursorMode,
    stage: Stage,
    window: &TimeWindow,
) -> MetaResult<i64> {
    conn.query_row(
        "INSERT INTO tsync.stage_logs (cursor_id, mode, stage, window_start, window_end)
         VALUES (?, ?, ?, CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP))
         RETURNING log_id",
        duckdb::params![
            cursor_id,
            mode.as_str(),
            stage.as_str(),
            format_ts(window.start()),
            format_ts(window.end())
        ],
        |row| row.get(0),
    )
    .write_context("insert stage_logs")
}

/// Record the outcome of a stage attempt.
pub fn finish_stage(
    conn: &Connection,
    log_id: i64,
    success: bool,
    row_count: i64,
    message: &str,
) -> MetaResult<()> {
    let updated = conn
        .execute(
            "UPDATE tsync.stage_logs
             SET finished_at = now(), success = ?, row_count = ?, message = ?
             WHERE log_id = ? AND finished_at IS NULL",
            duckdb::params![success, row_count, message, log_id],
        )
        .write_context("update stage_logs")?;
    if updated == 0 {
        log::warn!("Stage log {log_id} was already finished; outcome not recorded");
    }
    Ok(())
}

/// Most recent stage log rows first.
pub fn recent_stage_logs(conn: &Connection, limit: usize) -> MetaResult<Vec<StageLogEntry>> {
    let sql = format!(
        "SELECT log_id, cursor_id, mode, stage, {}, {}, {}, {}, success, row_count, message,
                date_diff('millisecond', started_at, finished_at)
         FROM tsync.stage_logs
         ORDER BY log_id DESC
         LIMIT ?",
        ts_text("window_start"),
        ts_text("window_end"),
        ts_text("started_at"),
        ts_text("finished_at"),
    );
    let mut stmt = conn.prepare(&sql).query_context("prepare stage_logs")?;
    let rows = stmt
        .query_map(duckdb::params![limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, Option<i64>>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, Option<String>>(7)?,
                row.get::<_, Option<bool>>(8)?,
                row.get::<_, Option<i64>>(9)?,
                row.get::<_, Option<String>>(10)?,
                row.get::<_, Option<i64>>(11)?,
            ))
        })
        .query_context("query stage_logs")?
        .collect::<Result<Vec<_>, _>>()
        .query_context("read stage_logs row")?;

    rows.into_iter()
        .map(
            |(
                log_id,
                cursor_id,
                mode,
                stage,
                window_start,
                window_end,
                started_at,
                finished_at,
                success,
                row_count,
                message,
                elapsed_ms,
            )| {
                Ok(StageLogEntry {
                    log_id,
                    cursor_id,
                    mode: mode.parse().map_err(MetaError::InvalidData)?,
                    stage: stage
                        .parse()
                        .map_err(|e: CoreError| MetaError::InvalidData(e.to_string()))?,
                    window_start: parse_stored_ts(&window_start)?,
                    window_end: parse_stored_ts(&window_end)?,
                    started_at: parse_stored_ts(&started_at)?,
                    finished_at: finished_at.as_deref().map(parse_stored_ts).transpose()?,
                    success,
                    row_count,
                    message,
                    elapsed_ms,
                })
            },
        )
        .collect()
}

#[cfg(test)]
#[path = "stage_log_test.rs"]
mod tests;
