//! tsync-pipeline - Reconciliation pipeline for tsync
//!
//! Stages move per-minute samples from the source historian into the
//! canonical store (extract), fill gaps (interpolate), publish them to the
//! destination wide tables (export), and audit the result (compare). The
//! orchestrator sequences them as a resumable batch sweep or as a recurring
//! incremental run.

pub mod compare;
pub mod context;
pub mod error;
pub mod export;
pub mod extract;
pub mod ingest;
pub mod interpolate;
pub mod orchestrator;

#[cfg(test)]
pub(crate) mod testing;

pub use compare::{compare, ComparisonReport};
pub use context::PipelineContext;
pub use error::{PipelineError, PipelineResult};
pub use export::{create_destination_tables, export, ExportReport};
pub use extract::{extract, ExtractReport};
pub use ingest::{ingest_csv, IngestReport};
pub use interpolate::{interpolate, InterpolationPolicy, InterpolationReport};
pub use orchestrator::{open_batch, BatchSummary, IncrementalOutcome, Orchestrator, StageRun, StepOutcome};
