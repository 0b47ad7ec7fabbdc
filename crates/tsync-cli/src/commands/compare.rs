//! Compare command implementation

use anyhow::{Context, Result};
use serde::Serialize;
use tsync_core::TimeWindow;
use tsync_meta::Mismatch;
use tsync_pipeline::compare;

use crate::cli::{CompareArgs, GlobalArgs, OutputFormat};
use crate::commands::common::{print_json, reading, ExitCode};
use crate::context::RuntimeContext;

#[derive(Serialize)]
struct CompareOutput<'a> {
    window: TimeWindow,
    cells: usize,
    tables: Vec<TableOutput<'a>>,
    mismatches: &'a [Mismatch],
}

#[derive(Serialize)]
struct TableOutput<'a> {
    table: &'a str,
    cells: usize,
    mismatches: usize,
}

/// Execute the compare command. Exits 1 when any cell disagrees.
pub async fn execute(args: &CompareArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let stores = ctx.open_destination_stores()?;
    let window = TimeWindow::new(args.from, args.to)?;

    let report = compare(&ctx.pipeline(&stores), &window)
        .await
        .context("Comparison failed")?;

    match args.output {
        OutputFormat::Json => print_json(&CompareOutput {
            window,
            cells: report.cells(),
            tables: report
                .tables
                .iter()
                .map(|t| TableOutput {
                    table: &t.table,
                    cells: t.cells,
                    mismatches: t.mismatches,
                })
                .collect(),
            mismatches: &report.mismatches,
        })?,
        OutputFormat::Text => {
            for table in &report.tables {
                println!(
                    "  {} {}: {} cells, {} mismatches",
                    if table.mismatches == 0 { "✓" } else { "✗" },
                    table.table,
                    table.cells,
                    table.mismatches
                );
            }
            for m in &report.mismatches {
                println!(
                    "    {} {} {}: canonical {} vs destination {}",
                    m.table_name,
                    m.column_name,
                    m.timestamp,
                    reading(m.canonical_value),
                    reading(m.destination_value)
                );
            }
            println!();
            println!("Compared {window}: {report}");
        }
    }

    if !report.is_clean() {
        return Err(ExitCode(1).into());
    }
    Ok(())
}
