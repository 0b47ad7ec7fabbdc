//! Persisted progress cursors and the re-entrancy lock.
//!
//! `in_progress` is set by a single conditional `UPDATE`, so two callers can
//! never both observe the flag as clear. Whoever takes the lock must call
//! [`release_cursor`] on every exit path.

use crate::error::{MetaError, MetaResult, MetaResultExt};
use crate::row_helpers::{parse_stored_date, parse_stored_ts, ts_text};
use duckdb::Connection;
use tsync_core::timestamp::format_ts;
use tsync_core::{BatchCursorState, CoreError, ProgressCursor, Stage, TimeWindow};

fn cursor_select() -> String {
    format!(
        "SELECT cursor_id, mode, {}, {}, stage, strftime(day, '%Y-%m-%d'), in_progress, completed, exported_rows, {}
         FROM tsync.progress_cursors",
        ts_text("window_start"),
        ts_text("window_end"),
        ts_text("updated_at")
    )
}

type CursorRow = (
    i64,
    String,
    String,
    String,
    Option<String>,
    String,
    bool,
    bool,
    i64,
    String,
);

fn collect_cursors(
    conn: &Connection,
    sql: &str,
    params: &[&dyn duckdb::ToSql],
) -> MetaResult<Vec<ProgressCursor>> {
    let mut stmt = conn.prepare(sql).query_context("prepare cursor query")?;
    let rows: Vec<CursorRow> = stmt
        .query_map(params, |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
                row.get(7)?,
                row.get(8)?,
                row.get(9)?,
            ))
        })
        .query_context("query progress_cursors")?
        .collect::<Result<Vec<_>, _>>()
        .query_context("read progress_cursors row")?;

    rows.into_iter().map(cursor_from_row).collect()
}

fn cursor_from_row(row: CursorRow) -> MetaResult<ProgressCursor> {
    let (cursor_id, mode, start, end, stage, day, in_progress, completed, exported_rows, updated) =
        row;
    let stage = stage
        .map(|s| s.parse::<Stage>())
        .transpose()
        .map_err(|e: CoreError| MetaError::InvalidData(e.to_string()))?;
    Ok(ProgressCursor {
        cursor_id,
        mode: mode.parse().map_err(MetaError::InvalidData)?,
        window_start: parse_stored_ts(&start)?,
        window_end: parse_stored_ts(&end)?,
        stage,
        day: parse_stored_date(&day)?,
        in_progress,
        completed,
        exported_rows,
        updated_at: parse_stored_ts(&updated)?,
    })
}

/// Fetch one cursor by id.
pub fn get_cursor(conn: &Connection, cursor_id: i64) -> MetaResult<Option<ProgressCursor>> {
    let sql = format!("{} WHERE cursor_id = ?", cursor_select());
    Ok(collect_cursors(conn, &sql, &[&cursor_id])?.into_iter().next())
}

/// The non-completed batch cursor, if any.
pub fn open_batch_cursor(conn: &Connection) -> MetaResult<Option<ProgressCursor>> {
    let sql = format!(
        "{} WHERE mode = 'batch' AND NOT completed ORDER BY cursor_id LIMIT 1",
        cursor_select()
    );
    Ok(collect_cursors(conn, &sql, &[])?.into_iter().next())
}

/// Most recent cursors first.
pub fn list_cursors(conn: &Connection, limit: usize) -> MetaResult<Vec<ProgressCursor>> {
    let sql = format!("{} ORDER BY cursor_id DESC LIMIT ?", cursor_select());
    collect_cursors(conn, &sql, &[&(limit as i64)])
}

/// Persist a fresh batch sweep. Fails while another batch cursor is open.
pub fn create_batch_cursor(conn: &Connection, state: &BatchCursorState) -> MetaResult<i64> {
    if let Some(open) = open_batch_cursor(conn)? {
        return Err(MetaError::CursorOpen {
            cursor_id: open.cursor_id,
        });
    }
    let first = TimeWindow::day(state.start_date);
    let last = TimeWindow::day(state.end_date);
    let cursor_id: i64 = conn
        .query_row(
            "INSERT INTO tsync.progress_cursors (mode, window_start, window_end, stage, day, completed)
             VALUES ('batch', CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP), ?, CAST(? AS DATE), ?)
             RETURNING cursor_id",
            duckdb::params![
                format_ts(first.start()),
                format_ts(last.end()),
                state.stage.as_str(),
                state.day.to_string(),
                state.completed,
            ],
            |row| row.get(0),
        )
        .write_context("insert batch cursor")?;
    log::debug!(
        "Created batch cursor {cursor_id} for {} .. {}",
        state.start_date,
        state.end_date
    );
    Ok(cursor_id)
}

/// Outcome of trying to lock the open batch cursor
#[derive(Debug, Clone, PartialEq)]
pub enum LockOutcome {
    /// `in_progress` is now set and owned by the caller
    Acquired(ProgressCursor),
    /// No non-completed batch cursor exists
    NoCursor,
    /// Another run holds the cursor
    Busy { cursor_id: i64 },
}

/// Atomically test-and-set `in_progress` on the open batch cursor.
pub fn lock_batch_cursor(conn: &Connection) -> MetaResult<LockOutcome> {
    let locked = conn
        .execute(
            "UPDATE tsync.progress_cursors SET in_progress = true, updated_at = now()
             WHERE NOT in_progress
               AND cursor_id = (SELECT MIN(cursor_id) FROM tsync.progress_cursors
                                WHERE mode = 'batch' AND NOT completed)",
            [],
        )
        .write_context("lock batch cursor")?;

    match open_batch_cursor(conn)? {
        None => Ok(LockOutcome::NoCursor),
        Some(cursor) if locked == 1 => Ok(LockOutcome::Acquired(cursor)),
        Some(cursor) => Ok(LockOutcome::Busy {
            cursor_id: cursor.cursor_id,
        }),
    }
}

/// Persist the batch position after a successful step.
pub fn save_batch_progress(
    conn: &Connection,
    cursor_id: i64,
    state: &BatchCursorState,
    exported_rows: i64,
) -> MetaResult<()> {
    conn.execute(
        "UPDATE tsync.progress_cursors
         SET stage = ?, day = CAST(? AS DATE), completed = ?,
             exported_rows = exported_rows + ?, updated_at = now()
         WHERE cursor_id = ?",
        duckdb::params![
            state.stage.as_str(),
            state.day.to_string(),
            state.completed,
            exported_rows,
            cursor_id
        ],
    )
    .write_context("update batch progress")?;
    Ok(())
}

/// Clear `in_progress`. Safe to call on an already released cursor.
pub fn release_cursor(conn: &Connection, cursor_id: i64) -> MetaResult<()> {
    conn.execute(
        "UPDATE tsync.progress_cursors SET in_progress = false, updated_at = now() WHERE cursor_id = ?",
        duckdb::params![cursor_id],
    )
    .write_context("release cursor")?;
    Ok(())
}

/// Create a per-invocation incremental cursor, already marked in progress.
pub fn begin_incremental_cursor(conn: &Connection, window: &TimeWindow) -> MetaResult<i64> {
    conn.query_row(
        "INSERT INTO tsync.progress_cursors (mode, window_start, window_end, day, in_progress)
         VALUES ('incremental', CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP), CAST(? AS DATE), true)
         RETURNING cursor_id",
        duckdb::params![
            format_ts(window.start()),
            format_ts(window.end()),
            window.start().date().to_string()
        ],
        |row| row.get(0),
    )
    .write_context("insert incremental cursor")
}

/// Mark an incremental cursor completed with its exported row count.
pub fn complete_incremental_cursor(
    conn: &Connection,
    cursor_id: i64,
    exported_rows: i64,
) -> MetaResult<()> {
    conn.execute(
        "UPDATE tsync.progress_cursors
         SET completed = true, in_progress = false, exported_rows = ?, updated_at = now()
         WHERE cursor_id = ? AND mode = 'incremental' AND NOT completed",
        duckdb::params![exported_rows, cursor_id],
    )
    .write_context("complete incremental cursor")?;
    Ok(())
}

#[cfg(test)]
#[path = "progress_test.rs"]
mod tests;
