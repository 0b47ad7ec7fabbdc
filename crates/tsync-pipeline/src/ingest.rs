//! One-shot CSV ingestion straight into the destination wide tables
//!
//! Rows of `(tag, value, timestamp)` are mapped through the registry and
//! written with the same update-or-insert contract as the exporter. The
//! canonical samples are not touched.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use tsync_core::sample::parse_value;
use tsync_core::timestamp::{parse_ts, truncate_to_minute};
use tsync_core::RegisteredTag;
use tsync_meta::{csv, registry};

use crate::context::PipelineContext;
use crate::error::{PipelineError, PipelineResult};
use crate::export::{export_group, group_layout, TableExport, WideRows};

const TAG_HEADERS: &[&str] = &["tag", "tag_id", "id"];
const VALUE_HEADERS: &[&str] = &["value"];
const TIMESTAMP_HEADERS: &[&str] = &["timestamp", "time", "date"];

/// Counts for one ingested file
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub rows_read: usize,
    pub skipped_unregistered: usize,
    pub skipped_bad_value: usize,
    pub skipped_bad_timestamp: usize,
    /// Later rows for a (tag, minute) already seen in the file
    pub skipped_duplicate: usize,
    pub tables: Vec<TableExport>,
}

impl IngestReport {
    pub fn rows_written(&self) -> usize {
        self.tables.iter().map(TableExport::written).sum()
    }

    pub fn rows_failed(&self) -> usize {
        self.tables.iter().map(|t| t.failed).sum()
    }
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "read {} rows, wrote {} destination rows ({} failed); skipped {} unregistered, {} bad value, {} bad timestamp, {} duplicate",
            self.rows_read,
            self.rows_written(),
            self.rows_failed(),
            self.skipped_unregistered,
            self.skipped_bad_value,
            self.skipped_bad_timestamp,
            self.skipped_duplicate
        )
    }
}

/// Load `path` and upsert its values into the destination.
pub async fn ingest_csv(ctx: &PipelineContext<'_>, path: &Path) -> PipelineResult<IngestReport> {
    let conn = ctx.canonical.conn();
    let sheet = csv::read_csv_file(conn, path)?;
    if sheet.rows.is_empty() {
        return Err(PipelineError::InvalidInput(format!(
            "{} contains no data rows",
            path.display()
        )));
    }
    let tag_col = sheet.require_column(TAG_HEADERS)?;
    let value_col = sheet.require_column(VALUE_HEADERS)?;
    let ts_col = sheet.require_column(TIMESTAMP_HEADERS)?;

    let tags = registry::active_tags(conn)?;
    let by_id: HashMap<&str, &RegisteredTag> =
        tags.iter().map(|t| (t.source_id.as_str(), t)).collect();

    let mut report = IngestReport {
        rows_read: sheet.rows.len(),
        ..Default::default()
    };
    let mut by_group: HashMap<i64, WideRows> = HashMap::new();

    for row in 0..sheet.rows.len() {
        let Some(tag) = sheet.cell(row, tag_col).and_then(|id| by_id.get(id)) else {
            report.skipped_unregistered += 1;
            continue;
        };
        let Some(value) = sheet.cell(row, value_col).and_then(parse_value) else {
            report.skipped_bad_value += 1;
            continue;
        };
        let Some(ts) = sheet.cell(row, ts_col).and_then(|raw| parse_ts(raw).ok()) else {
            report.skipped_bad_timestamp += 1;
            continue;
        };
        let cells = by_group
            .entry(tag.group_id)
            .or_default()
            .entry(truncate_to_minute(ts))
            .or_default();
        if cells.contains_key(&tag.column_name) {
            report.skipped_duplicate += 1;
            continue;
        }
        cells.insert(tag.column_name.clone(), value);
    }

    for group in registry::active_groups(conn)? {
        let Some(rows) = by_group.get(&group.group_id) else {
            continue;
        };
        let (table, tags) = group_layout(ctx, &group)?;
        let columns: Vec<String> = tags.into_iter().map(|(_, column)| column).collect();
        let result = export_group(ctx.destination, &table, &columns, rows)
            .await
            .map_err(PipelineError::Destination)?;
        report.tables.push(result);
    }

    log::info!("Ingested {}: {report}", path.display());
    Ok(report)
}

#[cfg(test)]
#[path = "ingest_test.rs"]
mod tests;
