//! Cron command implementation: watermark-driven incremental runs

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use std::time::Duration;
use tsync_meta::watermark;
use tsync_pipeline::{IncrementalOutcome, Orchestrator};

use crate::cli::{CronArgs, CronCommand, GlobalArgs};
use crate::context::{RuntimeContext, Stores};

/// Execute the cron command
pub async fn execute(args: &CronArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    match &args.command {
        CronCommand::Init(init_args) => {
            let at = init_args.at.unwrap_or_else(|| ctx.now());
            watermark::init_watermark(ctx.canonical.conn(), at)
                .context("Failed to set watermark")?;
            println!("Watermark set to {}", tsync_core::timestamp::truncate_to_minute(at));
            Ok(())
        }
        CronCommand::Run(run_args) => {
            let stores = ctx.open_stores()?;
            let now = run_args.now.unwrap_or_else(|| ctx.now());
            let outcome = run_once(&ctx, &stores, now).await?;
            println!("{}", describe(&outcome));
            Ok(())
        }
        CronCommand::Watch(watch_args) => watch(&ctx, watch_args.every).await,
    }
}

async fn run_once(
    ctx: &RuntimeContext,
    stores: &Stores,
    now: NaiveDateTime,
) -> Result<IncrementalOutcome> {
    let orchestrator = Orchestrator::new(ctx.pipeline(stores));
    orchestrator
        .run_incremental(now)
        .await
        .context("Incremental run failed")
}

/// Attempt a run every `every` seconds until Ctrl-C. A failed run is
/// logged and retried on the next tick with the watermark unchanged.
async fn watch(ctx: &RuntimeContext, every: u64) -> Result<()> {
    let stores = ctx.open_stores()?;
    let mut ticker = tokio::time::interval(Duration::from_secs(every));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    log::info!("Watching every {every}s; press Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match run_once(ctx, &stores, ctx.now()).await {
                    Ok(outcome) => log::info!("{}", describe(&outcome)),
                    Err(e) => log::error!("{e:#}"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted; stopping");
                break;
            }
        }
    }
    Ok(())
}

fn describe(outcome: &IncrementalOutcome) -> String {
    match outcome {
        IncrementalOutcome::NotInitialized => {
            "Watermark is not set; run `tsync cron init` first.".to_string()
        }
        IncrementalOutcome::NotDue { watermark, due_at } => {
            format!("Watermark {watermark} not due until {due_at}.")
        }
        IncrementalOutcome::Completed {
            cursor_id,
            window,
            exported_rows,
            next_watermark,
        } => format!(
            "Cursor {cursor_id}: {window} reconciled, {exported_rows} rows exported, watermark now {next_watermark}."
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsync_core::timestamp::parse_ts;

    #[test]
    fn describes_not_due() {
        let outcome = IncrementalOutcome::NotDue {
            watermark: parse_ts("2025-06-01 00:15").unwrap(),
            due_at: parse_ts("2025-06-01 00:30").unwrap(),
        };
        assert_eq!(
            describe(&outcome),
            "Watermark 2025-06-01 00:15:00 not due until 2025-06-01 00:30:00."
        );
    }
}
