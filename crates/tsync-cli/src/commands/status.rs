//! Status command implementation

use anyhow::Result;
use chrono::NaiveDateTime;
use serde::Serialize;
use tsync_core::ProgressCursor;
use tsync_meta::samples::{sample_counts, SampleCounts};
use tsync_meta::{audit, progress, stage_log, watermark, StageLogEntry};

use crate::cli::{GlobalArgs, OutputFormat, StatusArgs};
use crate::commands::common::{or_dash, print_json};
use crate::context::RuntimeContext;

#[derive(Serialize)]
struct StatusReport {
    name: String,
    watermark: Option<NaiveDateTime>,
    samples: SampleCounts,
    mismatches: i64,
    cursors: Vec<ProgressCursor>,
    stage_logs: Vec<StageLogOutput>,
}

#[derive(Serialize)]
struct StageLogOutput {
    #[serde(flatten)]
    entry: StageLogEntry,
    elapsed_secs: Option<f64>,
}

/// Execute the status command
pub fn execute(args: &StatusArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let conn = ctx.canonical.conn();

    let report = StatusReport {
        name: ctx.config.name.clone(),
        watermark: watermark::read_watermark(conn)?,
        samples: sample_counts(conn)?,
        mismatches: audit::mismatch_count(conn, None)?,
        cursors: progress::list_cursors(conn, args.limit)?,
        stage_logs: stage_log::recent_stage_logs(conn, args.limit)?
            .into_iter()
            .map(|entry| StageLogOutput {
                elapsed_secs: entry.elapsed_ms.map(|ms| ms as f64 / 1000.0),
                entry,
            })
            .collect(),
    };

    match args.output {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Text => {
            print_text(&report);
            Ok(())
        }
    }
}

fn print_text(report: &StatusReport) {
    println!("{}", report.name);
    println!("  watermark:    {}", or_dash(report.watermark));
    println!(
        "  samples:      {} extracted, {} interpolated",
        report.samples.extracted, report.samples.interpolated
    );
    println!("  mismatches:   {}", report.mismatches);

    println!();
    if report.cursors.is_empty() {
        println!("No cursors.");
    } else {
        println!("Cursors:");
        for c in &report.cursors {
            let state = if c.completed {
                "completed"
            } else if c.in_progress {
                "in progress"
            } else {
                "open"
            };
            println!(
                "  #{:<5} {:<11} {} .. {}  {:<8} {}  {:<11} {} rows",
                c.cursor_id,
                c.mode.as_str(),
                c.window_start,
                c.window_end,
                c.stage.map_or("-", |s| s.as_str()),
                c.day,
                state,
                c.exported_rows
            );
        }
    }

    println!();
    if report.stage_logs.is_empty() {
        println!("No stage logs.");
        return;
    }
    println!("Stage logs:");
    for log in &report.stage_logs {
        let e = &log.entry;
        let outcome = match e.success {
            Some(true) => "✓",
            Some(false) => "✗",
            None => "…",
        };
        println!(
            "  {outcome} {:<11} {:<8} {}  {:>6} rows  {:>7}s  {}",
            e.mode.as_str(),
            e.stage.as_str(),
            e.window_start,
            or_dash(e.row_count),
            log.elapsed_secs
                .map_or_else(|| "-".to_string(), |s| format!("{s:.1}")),
            e.message.as_deref().unwrap_or_default()
        );
    }
}
