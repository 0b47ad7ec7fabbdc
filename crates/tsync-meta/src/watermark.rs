//! Incremental watermark parameter.
//!
//! The watermark is the trailing edge of time already reconciled by the
//! incremental pipeline. It only moves forward through [`advance_watermark`],
//! which refuses to move it if another writer got there first.

use crate::error::{MetaError, MetaResult, MetaResultExt};
use crate::row_helpers::parse_stored_ts;
use chrono::NaiveDateTime;
use duckdb::Connection;
use tsync_core::timestamp::{format_ts, truncate_to_minute};

/// Parameter row holding the watermark.
pub const WATERMARK_PARAMETER: &str = "incremental_watermark";

/// Current watermark, or `None` before [`init_watermark`] has been called.
pub fn read_watermark(conn: &Connection) -> MetaResult<Option<NaiveDateTime>> {
    match conn.query_row(
        "SELECT value FROM tsync.parameters WHERE name = ?",
        duckdb::params![WATERMARK_PARAMETER],
        |row| row.get::<_, String>(0),
    ) {
        Ok(value) => Ok(Some(parse_stored_ts(&value)?)),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(MetaError::QueryError(format!("read watermark: {e}"))),
    }
}

/// Set the watermark unconditionally (truncated to the minute).
pub fn init_watermark(conn: &Connection, at: NaiveDateTime) -> MetaResult<()> {
    let value = format_ts(truncate_to_minute(at));
    conn.execute(
        "INSERT INTO tsync.parameters (name, value) VALUES (?, ?)
         ON CONFLICT (name) DO UPDATE SET value = excluded.value, updated_at = now()",
        duckdb::params![WATERMARK_PARAMETER, value],
    )
    .write_context("init watermark")?;
    log::info!("Watermark set to {value}");
    Ok(())
}

/// Move the watermark from `expected` to `next`.
///
/// Fails with [`MetaError::WatermarkConflict`] when the stored value is no
/// longer `expected`.
pub fn advance_watermark(
    conn: &Connection,
    expected: NaiveDateTime,
    next: NaiveDateTime,
) -> MetaResult<()> {
    let updated = conn
        .execute(
            "UPDATE tsync.parameters SET value = ?, updated_at = now() WHERE name = ? AND value = ?",
            duckdb::params![format_ts(next), WATERMARK_PARAMETER, format_ts(expected)],
        )
        .write_context("advance watermark")?;
    if updated == 1 {
        return Ok(());
    }
    let found = read_watermark(conn)?
        .map(format_ts)
        .unwrap_or_else(|| "<unset>".to_string());
    Err(MetaError::WatermarkConflict {
        expected: format_ts(expected),
        found,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CanonicalDb;
    use tsync_core::timestamp::parse_ts;

    #[test]
    fn unset_watermark_reads_none() {
        let db = CanonicalDb::open_memory().unwrap();
        assert_eq!(read_watermark(db.conn()).unwrap(), None);
    }

    #[test]
    fn init_truncates_and_overwrites() {
        let db = CanonicalDb::open_memory().unwrap();
        init_watermark(db.conn(), parse_ts("2025-06-01 12:00:42").unwrap()).unwrap();
        assert_eq!(
            read_watermark(db.conn()).unwrap(),
            Some(parse_ts("2025-06-01 12:00").unwrap())
        );
        init_watermark(db.conn(), parse_ts("2025-06-02 08:00").unwrap()).unwrap();
        assert_eq!(
            read_watermark(db.conn()).unwrap(),
            Some(parse_ts("2025-06-02 08:00").unwrap())
        );
    }

    #[test]
    fn advance_is_compare_and_set() {
        let db = CanonicalDb::open_memory().unwrap();
        let t0 = parse_ts("2025-06-01 12:00").unwrap();
        let t1 = parse_ts("2025-06-01 12:15").unwrap();
        init_watermark(db.conn(), t0).unwrap();

        advance_watermark(db.conn(), t0, t1).unwrap();
        assert_eq!(read_watermark(db.conn()).unwrap(), Some(t1));

        // A second advance from the stale value must not move it again.
        let err = advance_watermark(db.conn(), t0, t1).unwrap_err();
        assert!(matches!(err, MetaError::WatermarkConflict { .. }), "{err}");
        assert_eq!(read_watermark(db.conn()).unwrap(), Some(t1));
    }
}
