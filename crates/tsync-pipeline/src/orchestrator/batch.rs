//! Multi-day batch sweep

use chrono::NaiveDate;
use tsync_core::{BatchCursorState, CursorMode, Stage, Transition};
use tsync_meta::{progress, CanonicalDb, LockOutcome};

use super::{CursorLease, Orchestrator};
use crate::error::{PipelineError, PipelineResult};

/// Result of a single batch step
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// No batch sweep is open
    NoCursor,
    /// Another run holds the cursor; nothing was done
    Busy { cursor_id: i64 },
    /// One stage-day ran and the cursor moved on
    Advanced {
        cursor_id: i64,
        stage: Stage,
        day: NaiveDate,
        rows: i64,
        transition: Transition,
    },
}

/// Totals of a [`Orchestrator::run_batch`] call
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub cursor_id: Option<i64>,
    pub steps: usize,
    pub rows_exported: i64,
    pub completed: bool,
    /// Stopped because another run held the cursor
    pub busy: bool,
}

/// Open a sweep over `from..=to`. Fails while another sweep is open.
///
/// Only touches the canonical store, so it can run without either external
/// store being reachable.
pub fn open_batch(canonical: &CanonicalDb, from: NaiveDate, to: NaiveDate) -> PipelineResult<i64> {
    let state = BatchCursorState::new(from, to)?;
    let cursor_id = progress::create_batch_cursor(canonical.conn(), &state)?;
    log::info!(
        "Batch cursor {cursor_id} opened for {from} .. {to} ({} steps)",
        state.remaining_steps()
    );
    Ok(cursor_id)
}

impl Orchestrator<'_> {
    /// See [`open_batch`].
    pub fn start_batch(&self, from: NaiveDate, to: NaiveDate) -> PipelineResult<i64> {
        open_batch(self.ctx.canonical, from, to)
    }

    /// Lock the open cursor, run its current stage for its current day, and
    /// persist the next position.
    ///
    /// A failed stage leaves the position unchanged; the cursor is released
    /// either way.
    pub async fn step_batch(&self) -> PipelineResult<StepOutcome> {
        let conn = self.ctx.canonical.conn();
        let cursor = match progress::lock_batch_cursor(conn)? {
            LockOutcome::Acquired(cursor) => cursor,
            LockOutcome::NoCursor => {
                log::info!("No open batch cursor");
                return Ok(StepOutcome::NoCursor);
            }
            LockOutcome::Busy { cursor_id } => {
                log::info!("Batch cursor {cursor_id} is in progress elsewhere; skipping");
                return Ok(StepOutcome::Busy { cursor_id });
            }
        };
        let cursor_id = cursor.cursor_id;
        let _lease = CursorLease::new(self.ctx.canonical, cursor_id);

        let mut state = cursor.batch_state().ok_or_else(|| {
            PipelineError::InvalidInput(format!("cursor {cursor_id} is not a batch cursor"))
        })?;
        let (stage, day) = (state.stage, state.day);
        let window = state.window();

        let run = self
            .run_stage(Some(cursor_id), CursorMode::Batch, stage, &window)
            .await?;
        let exported = if stage == Stage::Export {
            self.audit(Some(cursor_id), CursorMode::Batch, &window).await;
            run.rows
        } else {
            0
        };

        let transition = state.advance();
        progress::save_batch_progress(conn, cursor_id, &state, exported)?;
        log::info!("Batch {stage} {day}: {} -> {transition:?}", run.message);

        Ok(StepOutcome::Advanced {
            cursor_id,
            stage,
            day,
            rows: run.rows,
            transition,
        })
    }

    /// Step until the sweep completes, no cursor is open, or the cursor is
    /// busy. A failing step aborts the loop with its error.
    pub async fn run_batch(&self) -> PipelineResult<BatchSummary> {
        let mut summary = BatchSummary::default();
        loop {
            match self.step_batch().await? {
                StepOutcome::NoCursor => break,
                StepOutcome::Busy { cursor_id } => {
                    summary.cursor_id = Some(cursor_id);
                    summary.busy = true;
                    break;
                }
                StepOutcome::Advanced {
                    cursor_id,
                    stage,
                    rows,
                    transition,
                    ..
                } => {
                    summary.cursor_id = Some(cursor_id);
                    summary.steps += 1;
                    if stage == Stage::Export {
                        summary.rows_exported += rows;
                    }
                    if transition == Transition::Completed {
                        summary.completed = true;
                        break;
                    }
                }
            }
        }
        Ok(summary)
    }
}
