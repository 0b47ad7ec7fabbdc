//! Comparator: audit destination rows against the canonical store
//!
//! Observe-only. Every (table, column, minute) in the window is checked and
//! each disagreement is logged and appended to the comparison log; nothing
//! is ever repaired.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use chrono::NaiveDateTime;
use tsync_core::TimeWindow;
use tsync_db::WideRow;
use tsync_meta::{audit, registry, samples, Mismatch};

use crate::context::PipelineContext;
use crate::error::{PipelineError, PipelineResult};
use crate::export::{group_layout, pivot, WideRows};

/// Equal when both sides are unset, or both set and within `tolerance`.
pub fn values_match(canonical: Option<f64>, destination: Option<f64>, tolerance: f64) -> bool {
    match (canonical, destination) {
        (None, None) => true,
        (Some(a), Some(b)) => (a - b).abs() <= tolerance,
        _ => false,
    }
}

/// Checked cells and mismatches for one table
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TableComparison {
    pub table: String,
    pub cells: usize,
    pub mismatches: usize,
}

/// Outcome of one comparator pass
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ComparisonReport {
    pub tables: Vec<TableComparison>,
    pub mismatches: Vec<Mismatch>,
}

impl ComparisonReport {
    pub fn cells(&self) -> usize {
        self.tables.iter().map(|t| t.cells).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty()
    }
}

impl fmt::Display for ComparisonReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cells in {} tables, {} mismatches",
            self.cells(),
            self.tables.len(),
            self.mismatches.len()
        )
    }
}

/// Compare expected rows against what the destination returned.
///
/// Minutes present on either side are checked for every column.
pub fn diff_rows(
    table: &str,
    columns: &[String],
    expected: &WideRows,
    actual: &[WideRow],
    tolerance: f64,
) -> (usize, Vec<Mismatch>) {
    let actual: HashMap<NaiveDateTime, &WideRow> =
        actual.iter().map(|row| (row.timestamp, row)).collect();
    let minutes: BTreeSet<NaiveDateTime> = expected
        .keys()
        .copied()
        .chain(actual.keys().copied())
        .collect();

    let mut cells = 0;
    let mut mismatches = Vec::new();
    for ts in minutes {
        for column in columns {
            cells += 1;
            let canonical = expected.get(&ts).and_then(|row| row.get(column)).copied();
            let destination = actual.get(&ts).and_then(|row| row.get(column));
            if values_match(canonical, destination, tolerance) {
                continue;
            }
            mismatches.push(Mismatch {
                table_name: table.to_string(),
                column_name: column.clone(),
                timestamp: ts,
                canonical_value: canonical,
                destination_value: destination,
                difference: canonical.zip(destination).map(|(a, b)| (a - b).abs()),
            });
        }
    }
    (cells, mismatches)
}

/// Audit `window` without tying the results to a cursor.
pub async fn compare(ctx: &PipelineContext<'_>, window: &TimeWindow) -> PipelineResult<ComparisonReport> {
    compare_for_cursor(ctx, window, None).await
}

/// Audit `window`, recording mismatches against `cursor_id`.
pub async fn compare_for_cursor(
    ctx: &PipelineContext<'_>,
    window: &TimeWindow,
    cursor_id: Option<i64>,
) -> PipelineResult<ComparisonReport> {
    let conn = ctx.canonical.conn();
    let tolerance = ctx.config.compare.tolerance;
    let window_samples = samples::samples_in_window(conn, window)?;
    let mut report = ComparisonReport::default();

    for group in registry::active_groups(conn)? {
        let (table, tags) = group_layout(ctx, &group)?;
        if tags.is_empty() {
            continue;
        }
        let mapping: HashMap<&str, &str> = tags
            .iter()
            .map(|(id, column)| (id.as_str(), column.as_str()))
            .collect();
        let expected = pivot(&window_samples, &mapping);
        let columns: Vec<String> = tags.iter().map(|(_, column)| column.clone()).collect();

        let exists = ctx
            .destination
            .relation_exists(&table)
            .await
            .map_err(PipelineError::Destination)?;
        let actual = if exists {
            ctx.destination
                .read_rows(&table, &columns, window)
                .await
                .map_err(PipelineError::Destination)?
        } else {
            Vec::new()
        };

        let (cells, mismatches) = diff_rows(&table, &columns, &expected, &actual, tolerance);
        for m in &mismatches {
            log::warn!(
                "Mismatch in {}.{} at {}: canonical {:?}, destination {:?}",
                m.table_name,
                m.column_name,
                m.timestamp,
                m.canonical_value,
                m.destination_value
            );
        }
        report.tables.push(TableComparison {
            table,
            cells,
            mismatches: mismatches.len(),
        });
        report.mismatches.extend(mismatches);
    }

    ctx.canonical
        .transaction(|conn| audit::record_mismatches(conn, cursor_id, &report.mismatches))?;
    log::info!("Compare {window}: {report}");
    Ok(report)
}

#[cfg(test)]
#[path = "compare_test.rs"]
mod tests;
