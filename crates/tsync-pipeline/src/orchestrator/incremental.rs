//! Recurring bounded-window run driven by the watermark

use chrono::NaiveDateTime;
use tsync_core::{CursorMode, Stage, TimeWindow};
use tsync_meta::{progress, watermark};

use super::{CursorLease, Orchestrator};
use crate::error::PipelineResult;

/// Result of one incremental invocation
#[derive(Debug, Clone, PartialEq)]
pub enum IncrementalOutcome {
    /// The watermark was never set
    NotInitialized,
    /// The window around the watermark has not settled yet
    NotDue {
        watermark: NaiveDateTime,
        due_at: NaiveDateTime,
    },
    /// All stages succeeded and the watermark moved
    Completed {
        cursor_id: i64,
        window: TimeWindow,
        exported_rows: i64,
        next_watermark: NaiveDateTime,
    },
}

impl Orchestrator<'_> {
    /// Reconcile the window around the watermark if it has settled by `now`.
    ///
    /// Each call that does work gets its own cursor. Any stage failure stops
    /// the run with the watermark unchanged and the cursor left incomplete.
    pub async fn run_incremental(&self, now: NaiveDateTime) -> PipelineResult<IncrementalOutcome> {
        let canonical = self.ctx.canonical;
        let settings = &self.ctx.config.incremental;

        let Some(mark) = watermark::read_watermark(canonical.conn())? else {
            log::warn!("Incremental watermark is not initialized; nothing to do");
            return Ok(IncrementalOutcome::NotInitialized);
        };
        let due_at = mark + settings.settle();
        if now < due_at {
            log::debug!("Watermark {mark} not due until {due_at}");
            return Ok(IncrementalOutcome::NotDue {
                watermark: mark,
                due_at,
            });
        }

        let window = TimeWindow::around(mark, settings.window_radius());
        let cursor_id = progress::begin_incremental_cursor(canonical.conn(), &window)?;
        let _lease = CursorLease::new(canonical, cursor_id);
        log::info!("Incremental cursor {cursor_id} started for {window}");

        let mut exported_rows = 0;
        for stage in Stage::BATCH_SEQUENCE {
            let run = self
                .run_stage(Some(cursor_id), CursorMode::Incremental, stage, &window)
                .await?;
            if stage == Stage::Export {
                exported_rows = run.rows;
            }
        }
        self.audit(Some(cursor_id), CursorMode::Incremental, &window)
            .await;

        let next_watermark = mark + settings.step();
        canonical.transaction(|conn| {
            watermark::advance_watermark(conn, mark, next_watermark)?;
            progress::complete_incremental_cursor(conn, cursor_id, exported_rows)
        })?;
        log::info!(
            "Incremental cursor {cursor_id} completed: {exported_rows} rows exported, watermark now {next_watermark}"
        );

        Ok(IncrementalOutcome::Completed {
            cursor_id,
            window,
            exported_rows,
            next_watermark,
        })
    }
}
