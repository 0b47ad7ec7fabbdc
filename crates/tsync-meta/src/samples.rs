//! Canonical per-minute samples.

use crate::error::{MetaError, MetaResult, MetaResultExt};
use crate::row_helpers::{parse_stored_ts, ts_text};
use chrono::NaiveDateTime;
use duckdb::types::Value;
use duckdb::{params_from_iter, Connection};
use serde::Serialize;
use std::collections::HashSet;
use tsync_core::timestamp::format_ts;
use tsync_core::{Provenance, Sample, TimeWindow};

/// Rows per multi-row `INSERT` statement.
const INSERT_CHUNK: usize = 500;

/// Bulk insert `samples` with multi-row `INSERT` statements.
///
/// Callers wrap this in [`crate::CanonicalDb::transaction`] so that a batch
/// lands in full or not at all.
pub fn insert_samples(conn: &Connection, samples: &[Sample]) -> MetaResult<usize> {
    for chunk in samples.chunks(INSERT_CHUNK) {
        let placeholders =
            vec!["(?, ?, ?, CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP), ?, ?)"; chunk.len()]
                .join(", ");
        let sql = format!(
            "INSERT INTO tsync.samples (tag_id, column_name, value, ts, ts_utc, node_id, provenance) VALUES {placeholders}"
        );
        let mut params: Vec<Value> = Vec::with_capacity(chunk.len() * 7);
        for s in chunk {
            params.push(Value::Text(s.tag_id.clone()));
            params.push(Value::Text(s.column_name.clone()));
            params.push(Value::Double(s.value));
            params.push(Value::Text(format_ts(s.timestamp)));
            params.push(Value::Text(format_ts(s.timestamp_utc)));
            params.push(Value::BigInt(s.node_id));
            params.push(Value::Text(s.provenance.as_str().to_string()));
        }
        conn.execute(&sql, params_from_iter(params))
            .write_context("insert samples")?;
    }
    Ok(samples.len())
}

fn sample_select() -> String {
    format!(
        "SELECT tag_id, column_name, value, {}, {}, node_id, provenance FROM tsync.samples",
        ts_text("ts"),
        ts_text("ts_utc")
    )
}

fn window_params(window: &TimeWindow) -> [String; 2] {
    [format_ts(window.start()), format_ts(window.end_exclusive())]
}

fn collect_samples(conn: &Connection, sql: &str, params: Vec<String>) -> MetaResult<Vec<Sample>> {
    let mut stmt = conn.prepare(sql).query_context("prepare samples query")?;
    let rows = stmt
        .query_map(params_from_iter(params), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, String>(6)?,
            ))
        })
        .query_context("query samples")?
        .collect::<Result<Vec<_>, _>>()
        .query_context("read samples row")?;

    rows.into_iter()
        .map(
            |(tag_id, column_name, value, ts, ts_utc, node_id, provenance)| {
                Ok(Sample {
                    tag_id,
                    column_name,
                    value,
                    timestamp: parse_stored_ts(&ts)?,
                    timestamp_utc: parse_stored_ts(&ts_utc)?,
                    node_id,
                    provenance: provenance
                        .parse::<Provenance>()
                        .map_err(MetaError::InvalidData)?,
                })
            },
        )
        .collect()
}

/// Every sample whose minute falls in `window`, ordered by tag then time.
pub fn samples_in_window(conn: &Connection, window: &TimeWindow) -> MetaResult<Vec<Sample>> {
    let sql = format!(
        "{} WHERE ts >= CAST(? AS TIMESTAMP) AND ts < CAST(? AS TIMESTAMP) ORDER BY tag_id, ts",
        sample_select()
    );
    collect_samples(conn, &sql, window_params(window).to_vec())
}

/// Samples of one tag in `window`, ordered by time.
pub fn samples_for_tag(
    conn: &Connection,
    tag_id: &str,
    window: &TimeWindow,
) -> MetaResult<Vec<Sample>> {
    let sql = format!(
        "{} WHERE tag_id = ? AND ts >= CAST(? AS TIMESTAMP) AND ts < CAST(? AS TIMESTAMP) ORDER BY ts",
        sample_select()
    );
    let [start, end] = window_params(window);
    collect_samples(conn, &sql, vec![tag_id.to_string(), start, end])
}

/// Distinct tags with at least one sample in `window`.
pub fn tags_in_window(conn: &Connection, window: &TimeWindow) -> MetaResult<Vec<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT DISTINCT tag_id FROM tsync.samples
             WHERE ts >= CAST(? AS TIMESTAMP) AND ts < CAST(? AS TIMESTAMP)
             ORDER BY tag_id",
        )
        .query_context("prepare tags_in_window")?;
    let tags = stmt
        .query_map(params_from_iter(window_params(window)), |row| row.get(0))
        .query_context("query tags_in_window")?
        .collect::<Result<Vec<String>, _>>()
        .query_context("read tags_in_window row")?;
    Ok(tags)
}

/// `(tag, minute)` pairs in `window` that already hold an extracted sample.
pub fn extracted_minutes(
    conn: &Connection,
    window: &TimeWindow,
) -> MetaResult<HashSet<(String, NaiveDateTime)>> {
    let sql = format!(
        "SELECT DISTINCT tag_id, {} FROM tsync.samples
         WHERE provenance = 'extracted' AND ts >= CAST(? AS TIMESTAMP) AND ts < CAST(? AS TIMESTAMP)",
        ts_text("ts")
    );
    let mut stmt = conn.prepare(&sql).query_context("prepare extracted_minutes")?;
    let rows = stmt
        .query_map(params_from_iter(window_params(window)), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .query_context("query extracted_minutes")?
        .collect::<Result<Vec<_>, _>>()
        .query_context("read extracted_minutes row")?;

    rows.into_iter()
        .map(|(tag, ts)| Ok((tag, parse_stored_ts(&ts)?)))
        .collect()
}

/// Delete the interpolations that new extracted samples at `keys`
/// invalidate, limited to `window`.
///
/// For each `(tag, minute)` that is every interpolated sample of the tag
/// strictly between the nearest extracted samples before and after the
/// minute, the minute itself included. Without an extracted neighbor on a
/// side the range stops at the minute.
pub fn delete_bridged_interpolations(
    conn: &Connection,
    keys: &[(String, NaiveDateTime)],
    window: &TimeWindow,
) -> MetaResult<usize> {
    if keys.is_empty() {
        return Ok(0);
    }
    let mut stmt = conn
        .prepare(
            "DELETE FROM tsync.samples
             WHERE provenance = 'interpolated' AND tag_id = ?
               AND ts >= CAST(? AS TIMESTAMP) AND ts < CAST(? AS TIMESTAMP)
               AND ts > COALESCE(
                   (SELECT MAX(ts) FROM tsync.samples
                    WHERE provenance = 'extracted' AND tag_id = ? AND ts < CAST(? AS TIMESTAMP)),
                   CAST(? AS TIMESTAMP) - INTERVAL 1 MINUTE)
               AND ts < COALESCE(
                   (SELECT MIN(ts) FROM tsync.samples
                    WHERE provenance = 'extracted' AND tag_id = ? AND ts > CAST(? AS TIMESTAMP)),
                   CAST(? AS TIMESTAMP) + INTERVAL 1 MINUTE)",
        )
        .write_context("prepare delete_bridged_interpolations")?;
    let [start, end] = window_params(window);
    let mut deleted = 0;
    for (tag, ts) in keys {
        let minute = format_ts(*ts);
        deleted += stmt
            .execute(duckdb::params![
                tag, start, end, tag, minute, minute, tag, minute, minute
            ])
            .write_context("delete bridged interpolations")?;
    }
    Ok(deleted)
}

/// Delete every interpolated sample of a boolean-kind tag.
pub fn purge_boolean_interpolations(conn: &Connection) -> MetaResult<usize> {
    conn.execute(
        "DELETE FROM tsync.samples
         WHERE provenance = 'interpolated'
           AND tag_id IN (SELECT source_id FROM tsync.tags WHERE kind = 'boolean')",
        [],
    )
    .write_context("purge boolean interpolations")
}

/// Stored sample totals by provenance.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SampleCounts {
    pub extracted: i64,
    pub interpolated: i64,
}

pub fn sample_counts(conn: &Connection) -> MetaResult<SampleCounts> {
    conn.query_row(
        "SELECT
             COUNT(*) FILTER (WHERE provenance = 'extracted'),
             COUNT(*) FILTER (WHERE provenance = 'interpolated')
         FROM tsync.samples",
        [],
        |row| {
            Ok(SampleCounts {
                extracted: row.get(0)?,
                interpolated: row.get(1)?,
            })
        },
    )
    .query_context("count samples")
}

#[cfg(test)]
#[path = "samples_test.rs"]
mod tests;
