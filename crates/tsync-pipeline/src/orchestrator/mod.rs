//! Orchestrator: sequences import -> complete -> export
//!
//! Two entry points share one stage runner. The batch sweep walks a
//! persisted day cursor one stage-day per step; the incremental run
//! reconciles a short window around the watermark. Every stage attempt gets
//! a stage log row, and a cursor taken by a run is always released, whatever
//! the outcome.

mod batch;
mod incremental;

pub use batch::{open_batch, BatchSummary, StepOutcome};
pub use incremental::IncrementalOutcome;

use tsync_core::{CursorMode, Stage, TimeWindow};
use tsync_meta::{progress, stage_log, CanonicalDb};

use crate::compare::compare_for_cursor;
use crate::context::PipelineContext;
use crate::error::PipelineResult;
use crate::export::export;
use crate::extract::extract;
use crate::interpolate::{interpolate, InterpolationPolicy};

/// Drives the pipeline stages against persisted progress
#[derive(Debug, Clone, Copy)]
pub struct Orchestrator<'a> {
    ctx: PipelineContext<'a>,
}

/// A finished stage: rows it affected and its summary line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRun {
    pub stage: Stage,
    pub rows: i64,
    pub message: String,
}

/// Clears the cursor's `in_progress` flag when dropped.
struct CursorLease<'a> {
    canonical: &'a CanonicalDb,
    cursor_id: i64,
}

impl<'a> CursorLease<'a> {
    fn new(canonical: &'a CanonicalDb, cursor_id: i64) -> Self {
        Self {
            canonical,
            cursor_id,
        }
    }
}

impl Drop for CursorLease<'_> {
    fn drop(&mut self) {
        if let Err(e) = progress::release_cursor(self.canonical.conn(), self.cursor_id) {
            log::error!("Failed to release cursor {}: {e}", self.cursor_id);
        }
    }
}

impl<'a> Orchestrator<'a> {
    pub fn new(ctx: PipelineContext<'a>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &PipelineContext<'a> {
        &self.ctx
    }

    fn policy(&self, mode: CursorMode) -> InterpolationPolicy {
        match mode {
            CursorMode::Batch => InterpolationPolicy::batch(&self.ctx.config.batch),
            CursorMode::Incremental => InterpolationPolicy::incremental(&self.ctx.config.incremental),
        }
    }

    async fn execute(
        &self,
        cursor_id: Option<i64>,
        mode: CursorMode,
        stage: Stage,
        window: &TimeWindow,
    ) -> PipelineResult<(usize, String)> {
        let ctx = &self.ctx;
        Ok(match stage {
            Stage::Import => {
                let report = extract(ctx, window).await?;
                (report.inserted, report.to_string())
            }
            Stage::Complete => {
                let report = interpolate(ctx, window, &self.policy(mode))?;
                (report.filled, report.to_string())
            }
            Stage::Export => {
                let report = export(ctx, window).await?;
                (report.rows_written(), report.to_string())
            }
            Stage::Compare => {
                let report = compare_for_cursor(ctx, window, cursor_id).await?;
                (report.mismatches.len(), report.to_string())
            }
        })
    }

    /// Run one stage over `window`, bracketed by a stage log row.
    pub async fn run_stage(
        &self,
        cursor_id: Option<i64>,
        mode: CursorMode,
        stage: Stage,
        window: &TimeWindow,
    ) -> PipelineResult<StageRun> {
        let conn = self.ctx.canonical.conn();
        let log_id = stage_log::begin_stage(conn, cursor_id, mode, stage, window)?;
        log::debug!("{mode} {stage} {window} started (log {log_id})");

        match self.execute(cursor_id, mode, stage, window).await {
            Ok((rows, message)) => {
                let rows = rows as i64;
                stage_log::finish_stage(conn, log_id, true, rows, &message)?;
                Ok(StageRun {
                    stage,
                    rows,
                    message,
                })
            }
            Err(e) => {
                log::error!("{mode} {stage} {window} failed: {e}");
                if let Err(log_err) = stage_log::finish_stage(conn, log_id, false, 0, &e.to_string()) {
                    log::error!("Failed to record stage failure: {log_err}");
                }
                Err(e)
            }
        }
    }

    /// Run the comparator if enabled. Its failures are logged, never raised.
    async fn audit(&self, cursor_id: Option<i64>, mode: CursorMode, window: &TimeWindow) {
        if !self.ctx.config.compare.enabled {
            return;
        }
        if let Err(e) = self.run_stage(cursor_id, mode, Stage::Compare, window).await {
            log::warn!("Comparison of {window} skipped: {e}");
        }
    }
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;
