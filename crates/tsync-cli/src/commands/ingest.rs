//! Ingest command implementation

use anyhow::{Context, Result};
use std::path::Path;
use tsync_pipeline::ingest_csv;

use crate::cli::{GlobalArgs, IngestArgs};
use crate::commands::common::ExitCode;
use crate::context::RuntimeContext;

/// Execute the ingest command. Exits 1 when any row failed to write.
pub async fn execute(args: &IngestArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let stores = ctx.open_destination_stores()?;

    let report = ingest_csv(&ctx.pipeline(&stores), Path::new(&args.file))
        .await
        .with_context(|| format!("Failed to ingest {}", args.file))?;

    for table in &report.tables {
        println!(
            "  {} {}: {} inserted, {} updated, {} failed",
            if table.failed == 0 { "✓" } else { "✗" },
            table.table,
            table.inserted,
            table.updated,
            table.failed
        );
    }
    println!();
    println!("{report}");

    if report.rows_failed() > 0 {
        return Err(ExitCode(1).into());
    }
    Ok(())
}
