//! Batch command implementation

use anyhow::{Context, Result};
use tsync_meta::progress;
use tsync_pipeline::{open_batch, Orchestrator, StepOutcome};

use crate::cli::{BatchArgs, BatchCommand, BatchStartArgs, GlobalArgs};
use crate::commands::common::ExitCode;
use crate::context::RuntimeContext;

/// Execute the batch command
pub async fn execute(args: &BatchArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    match &args.command {
        BatchCommand::Start(start_args) => start(&ctx, start_args),
        BatchCommand::Step => step(&ctx).await,
        BatchCommand::Run => run(&ctx).await,
        BatchCommand::Unlock => unlock(&ctx),
    }
}

fn start(ctx: &RuntimeContext, args: &BatchStartArgs) -> Result<()> {
    let cursor_id = open_batch(&ctx.canonical, args.from, args.to)
        .context("Failed to start batch sweep")?;
    println!(
        "Batch cursor {cursor_id} opened for {} .. {}",
        args.from, args.to
    );
    Ok(())
}

async fn step(ctx: &RuntimeContext) -> Result<()> {
    let stores = ctx.open_stores()?;
    let orchestrator = Orchestrator::new(ctx.pipeline(&stores));

    match orchestrator.step_batch().await.context("Batch step failed")? {
        StepOutcome::NoCursor => println!("No open batch cursor."),
        StepOutcome::Busy { cursor_id } => {
            println!("Batch cursor {cursor_id} is in progress elsewhere.");
            return Err(ExitCode(2).into());
        }
        StepOutcome::Advanced {
            cursor_id,
            stage,
            day,
            rows,
            transition,
        } => {
            println!("Cursor {cursor_id}: {stage} {day} ({rows} rows) -> {transition:?}");
        }
    }
    Ok(())
}

async fn run(ctx: &RuntimeContext) -> Result<()> {
    let stores = ctx.open_stores()?;
    let orchestrator = Orchestrator::new(ctx.pipeline(&stores));

    let summary = orchestrator.run_batch().await.context("Batch run failed")?;
    match summary.cursor_id {
        None => println!("No open batch cursor."),
        Some(cursor_id) if summary.busy && summary.steps == 0 => {
            println!("Batch cursor {cursor_id} is in progress elsewhere.");
            return Err(ExitCode(2).into());
        }
        Some(cursor_id) => println!(
            "Batch cursor {cursor_id}: {} steps, {} rows exported{}",
            summary.steps,
            summary.rows_exported,
            if summary.completed { ", completed" } else { "" }
        ),
    }
    Ok(())
}

/// Clear the in-progress flag of the open batch cursor after a killed run.
fn unlock(ctx: &RuntimeContext) -> Result<()> {
    let conn = ctx.canonical.conn();
    let Some(cursor) = progress::open_batch_cursor(conn)? else {
        println!("No open batch cursor.");
        return Ok(());
    };
    if !cursor.in_progress {
        println!("Batch cursor {} is not locked.", cursor.cursor_id);
        return Ok(());
    }
    progress::release_cursor(conn, cursor.cursor_id)?;
    log::warn!(
        "Released batch cursor {} at {} {}",
        cursor.cursor_id,
        cursor.stage.map_or("-", |s| s.as_str()),
        cursor.day
    );
    println!("Batch cursor {} unlocked.", cursor.cursor_id);
    Ok(())
}
