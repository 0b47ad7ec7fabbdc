//! Progress cursor state for resumable orchestration
//!
//! A batch cursor sweeps a date range once per stage: every day is imported,
//! then every day is completed (gap-filled), then every day is exported. The
//! transition rule lives here as a pure function so it can be tested without
//! a store; persistence and locking live in `tsync-meta`.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::window::TimeWindow;

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Extract from the source historian
    Import,
    /// Fill missing minutes by interpolation
    Complete,
    /// Upsert into destination wide tables
    Export,
    /// Optional audit of the destination against the canonical store
    Compare,
}

impl Stage {
    /// Stages a batch cursor moves through, in order.
    pub const BATCH_SEQUENCE: [Stage; 3] = [Stage::Import, Stage::Complete, Stage::Export];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Import => "import",
            Stage::Complete => "complete",
            Stage::Export => "export",
            Stage::Compare => "compare",
        }
    }

    /// Following stage in the batch sequence, or `None` after the last one.
    pub fn next_batch_stage(&self) -> Option<Stage> {
        let pos = Self::BATCH_SEQUENCE.iter().position(|s| s == self)?;
        Self::BATCH_SEQUENCE.get(pos + 1).copied()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "import" => Ok(Stage::Import),
            "complete" => Ok(Stage::Complete),
            "export" => Ok(Stage::Export),
            "compare" => Ok(Stage::Compare),
            other => Err(CoreError::UnknownStage {
                stage: other.to_string(),
            }),
        }
    }
}

/// Orchestration mode a cursor belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CursorMode {
    /// Multi-day sweep over a fixed date range
    Batch,
    /// One bounded window around the watermark
    Incremental,
}

impl CursorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CursorMode::Batch => "batch",
            CursorMode::Incremental => "incremental",
        }
    }
}

impl fmt::Display for CursorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CursorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "batch" => Ok(CursorMode::Batch),
            "incremental" => Ok(CursorMode::Incremental),
            other => Err(format!("unknown cursor mode '{other}'")),
        }
    }
}

/// Result of applying the batch transition rule after a successful step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Same stage, next day
    NextDay(NaiveDate),
    /// First day again, next stage
    NextStage(Stage),
    /// Last day of the last stage succeeded
    Completed,
}

/// Mutable position of a batch sweep
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCursorState {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub stage: Stage,
    pub day: NaiveDate,
    pub completed: bool,
}

impl BatchCursorState {
    /// A fresh sweep positioned at the first day of the import stage.
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Result<Self, CoreError> {
        if end_date < start_date {
            return Err(CoreError::InvalidWindow {
                start: start_date.to_string(),
                end: end_date.to_string(),
            });
        }
        Ok(Self {
            start_date,
            end_date,
            stage: Stage::Import,
            day: start_date,
            completed: false,
        })
    }

    /// Window the current step operates on.
    pub fn window(&self) -> TimeWindow {
        TimeWindow::day(self.day)
    }

    /// Apply the transition rule after the current step succeeded.
    ///
    /// Has no effect on a completed cursor.
    pub fn advance(&mut self) -> Transition {
        if self.completed {
            return Transition::Completed;
        }
        if self.day < self.end_date {
            self.day += Duration::days(1);
            return Transition::NextDay(self.day);
        }
        match self.stage.next_batch_stage() {
            Some(next) => {
                self.stage = next;
                self.day = self.start_date;
                Transition::NextStage(next)
            }
            None => {
                self.completed = true;
                Transition::Completed
            }
        }
    }

    /// Steps remaining including the current one.
    pub fn remaining_steps(&self) -> i64 {
        if self.completed {
            return 0;
        }
        let days = (self.end_date - self.start_date).num_days() + 1;
        let stages_after = Stage::BATCH_SEQUENCE
            .iter()
            .position(|s| *s == self.stage)
            .map(|pos| (Stage::BATCH_SEQUENCE.len() - pos - 1) as i64)
            .unwrap_or(0);
        (self.end_date - self.day).num_days() + 1 + stages_after * days
    }
}

/// A persisted progress cursor as read back from the canonical store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressCursor {
    pub cursor_id: i64,
    pub mode: CursorMode,
    pub window_start: NaiveDateTime,
    pub window_end: NaiveDateTime,
    /// Current stage (batch mode only)
    pub stage: Option<Stage>,
    pub day: NaiveDate,
    pub in_progress: bool,
    pub completed: bool,
    pub exported_rows: i64,
    pub updated_at: NaiveDateTime,
}

impl ProgressCursor {
    /// Batch position, when this is a batch cursor.
    pub fn batch_state(&self) -> Option<BatchCursorState> {
        if self.mode != CursorMode::Batch {
            return None;
        }
        Some(BatchCursorState {
            start_date: self.window_start.date(),
            end_date: self.window_end.date(),
            stage: self.stage.unwrap_or(Stage::Import),
            day: self.day,
            completed: self.completed,
        })
    }
}

#[cfg(test)]
#[path = "cursor_test.rs"]
mod tests;
