//! Error types for the reconciliation pipeline

use thiserror::Error;
use tsync_core::CoreError;
use tsync_db::DbError;
use tsync_meta::MetaError;

/// Pipeline stage errors
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Source historian query failed (P001)
    #[error("[P001] Source historian query failed: {0}")]
    Source(#[source] DbError),

    /// Destination store unreachable or failed outright (P002)
    #[error("[P002] Destination store failed: {0}")]
    Destination(#[source] DbError),

    /// Canonical store failure (P003)
    #[error("[P003] {0}")]
    Canonical(#[from] MetaError),

    /// Export finished with per-row failures (P004)
    #[error("[P004] Export failed for {failed} of {attempted} rows")]
    RowFailures { failed: usize, attempted: usize },

    /// Ingestion input could not be used (P005)
    #[error("[P005] Invalid input: {0}")]
    InvalidInput(String),

    /// Core validation failure (P006)
    #[error("[P006] {0}")]
    Core(#[from] CoreError),
}

/// Result type alias for PipelineError
pub type PipelineResult<T> = Result<T, PipelineError>;
