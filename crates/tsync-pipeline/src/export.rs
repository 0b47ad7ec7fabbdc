//! Exporter: canonical samples -> destination wide tables
//!
//! One wide table per active group, one row per minute, one column per
//! eligible tag. Each row is an update-or-insert decided per timestamp, so
//! exporting the same window twice converges on the same rows.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::NaiveDateTime;
use tsync_core::naming::wide_table_name;
use tsync_core::{Group, Provenance, Sample, TimeWindow};
use tsync_db::{ColumnValue, DbResult, WideTableStore};
use tsync_meta::{registry, samples};

use crate::context::PipelineContext;
use crate::error::{PipelineError, PipelineResult};

/// Values of one minute, keyed by destination column
pub type WideValues = BTreeMap<String, f64>;

/// Per-minute rows of one table
pub type WideRows = BTreeMap<NaiveDateTime, WideValues>;

/// What happened to one destination row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    Inserted,
    Updated,
    Failed,
}

/// Write counts for one destination table
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TableExport {
    pub table: String,
    pub created: bool,
    pub inserted: usize,
    pub updated: usize,
    pub failed: usize,
}

impl TableExport {
    fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            ..Default::default()
        }
    }

    fn record(&mut self, outcome: RowOutcome) {
        match outcome {
            RowOutcome::Inserted => self.inserted += 1,
            RowOutcome::Updated => self.updated += 1,
            RowOutcome::Failed => self.failed += 1,
        }
    }

    pub fn written(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Per-table results of one export
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub tables: Vec<TableExport>,
}

impl ExportReport {
    pub fn rows_written(&self) -> usize {
        self.tables.iter().map(TableExport::written).sum()
    }

    pub fn rows_failed(&self) -> usize {
        self.tables.iter().map(|t| t.failed).sum()
    }

    pub fn table(&self, name: &str) -> Option<&TableExport> {
        self.tables.iter().find(|t| t.table == name)
    }
}

impl fmt::Display for ExportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rows written to {} tables, {} failed",
            self.rows_written(),
            self.tables.len(),
            self.rows_failed()
        )
    }
}

/// Pivot samples into per-minute rows using the current column mapping.
///
/// Samples of tags missing from `columns` are ignored. Within a minute the
/// first extracted value of a tag wins over anything else.
pub fn pivot(samples: &[Sample], columns: &HashMap<&str, &str>) -> WideRows {
    let mut rows = WideRows::new();
    let mut extracted: HashMap<(NaiveDateTime, &str), bool> = HashMap::new();
    for sample in samples {
        let Some(column) = columns.get(sample.tag_id.as_str()) else {
            continue;
        };
        let key = (sample.timestamp, *column);
        if extracted.get(&key) == Some(&true) {
            continue;
        }
        extracted.insert(key, sample.provenance == Provenance::Extracted);
        rows.entry(sample.timestamp)
            .or_default()
            .insert(column.to_string(), sample.value);
    }
    rows
}

/// Update the row at `ts` if it exists, otherwise insert it.
pub async fn upsert_row(
    store: &dyn WideTableStore,
    table: &str,
    ts: NaiveDateTime,
    cells: &[ColumnValue],
) -> DbResult<RowOutcome> {
    if store.row_exists(table, ts).await? {
        store.update_columns(table, ts, cells).await?;
        Ok(RowOutcome::Updated)
    } else {
        store.insert_row(table, ts, cells).await?;
        Ok(RowOutcome::Inserted)
    }
}

/// Upsert every row of `rows` into `table`.
///
/// A failing row is logged and counted; only a connectivity failure stops
/// the table and is returned.
pub async fn upsert_rows(
    store: &dyn WideTableStore,
    table: &str,
    columns: &[String],
    rows: &WideRows,
) -> DbResult<TableExport> {
    let mut result = TableExport::new(table);
    for (ts, values) in rows {
        let cells: Vec<ColumnValue> = columns
            .iter()
            .map(|c| ColumnValue::new(c.as_str(), values.get(c).copied()))
            .collect();
        match upsert_row(store, table, *ts, &cells).await {
            Ok(outcome) => result.record(outcome),
            Err(e) if e.is_connectivity() => return Err(e),
            Err(e) => {
                log::warn!("Failed to write {table} row at {ts}: {e}");
                result.record(RowOutcome::Failed);
            }
        }
    }
    Ok(result)
}

/// Create the group's table if needed and upsert `rows` into it.
///
/// A table that cannot be created counts all its rows as failed.
pub(crate) async fn export_group(
    store: &dyn WideTableStore,
    table: &str,
    columns: &[String],
    rows: &WideRows,
) -> DbResult<TableExport> {
    let created = match store.create_table_if_missing(table, columns).await {
        Ok(created) => created,
        Err(e) if e.is_connectivity() => return Err(e),
        Err(e) => {
            log::warn!("Skipping {table}: cannot create table: {e}");
            let mut failed = TableExport::new(table);
            failed.failed = rows.len();
            return Ok(failed);
        }
    };
    let mut result = upsert_rows(store, table, columns, rows).await?;
    result.created = created;
    Ok(result)
}

/// Destination table and ordered columns of an active group.
pub(crate) fn group_layout(
    ctx: &PipelineContext<'_>,
    group: &Group,
) -> PipelineResult<(String, Vec<(String, String)>)> {
    let tags = registry::tags_for_group(ctx.canonical.conn(), group.group_id)?;
    let table = wide_table_name(&ctx.config.destination.table_prefix, &group.label);
    let columns = tags
        .into_iter()
        .map(|t| (t.source_id, t.column_name))
        .collect();
    Ok((table, columns))
}

/// Create the wide table of every active group that has tags.
///
/// Returns each table name with whether it was newly created.
pub async fn create_destination_tables(
    ctx: &PipelineContext<'_>,
) -> PipelineResult<Vec<(String, bool)>> {
    let mut tables = Vec::new();
    for group in registry::active_groups(ctx.canonical.conn())? {
        let (table, tags) = group_layout(ctx, &group)?;
        if tags.is_empty() {
            log::debug!("Group '{}' has no active tags; no table", group.label);
            continue;
        }
        let columns: Vec<String> = tags.into_iter().map(|(_, column)| column).collect();
        let created = ctx
            .destination
            .create_table_if_missing(&table, &columns)
            .await
            .map_err(PipelineError::Destination)?;
        if created {
            log::info!("Created {table} with {} columns", columns.len());
        }
        tables.push((table, created));
    }
    Ok(tables)
}

/// Export every sample in `window` to the destination.
pub async fn export(ctx: &PipelineContext<'_>, window: &TimeWindow) -> PipelineResult<ExportReport> {
    let conn = ctx.canonical.conn();
    let window_samples = samples::samples_in_window(conn, window)?;
    let mut report = ExportReport::default();

    for group in registry::active_groups(conn)? {
        let (table, tags) = group_layout(ctx, &group)?;
        if tags.is_empty() {
            continue;
        }
        let mapping: HashMap<&str, &str> = tags
            .iter()
            .map(|(id, column)| (id.as_str(), column.as_str()))
            .collect();
        let rows = pivot(&window_samples, &mapping);
        if rows.is_empty() {
            log::debug!("No samples for {table} in {window}");
            continue;
        }
        let columns: Vec<String> = tags.into_iter().map(|(_, column)| column).collect();
        let result = export_group(ctx.destination, &table, &columns, &rows)
            .await
            .map_err(PipelineError::Destination)?;
        log::debug!(
            "{table}: {} inserted, {} updated, {} failed",
            result.inserted,
            result.updated,
            result.failed
        );
        report.tables.push(result);
    }

    let failed = report.rows_failed();
    if failed > 0 && ctx.config.export.fail_on_row_errors {
        return Err(PipelineError::RowFailures {
            failed,
            attempted: failed + report.rows_written(),
        });
    }
    log::info!("Export {window}: {report}");
    Ok(report)
}

#[cfg(test)]
#[path = "export_test.rs"]
mod tests;
