//! Error types for the canonical store.

use thiserror::Error;

/// Canonical store errors.
#[derive(Error, Debug)]
pub enum MetaError {
    /// Failed to open or create the canonical store (M001).
    #[error("[M001] Canonical store connection failed: {0}")]
    ConnectionError(String),

    /// Schema migration failed (M002).
    #[error("[M002] Canonical store migration failed: {0}")]
    MigrationError(String),

    /// SQL execution error inside the canonical store (M003).
    #[error("[M003] Canonical store query failed: {0}")]
    QueryError(String),

    /// Transaction management error (M004).
    #[error("[M004] Canonical store transaction failed: {0}")]
    TransactionError(String),

    /// Data could not be written (M005).
    #[error("[M005] Canonical store write failed: {0}")]
    WriteError(String),

    /// Registry import would break a uniqueness rule (M006).
    #[error("[M006] Registry conflict: {0}")]
    RegistryConflict(String),

    /// Registry entry lookup failed (M007).
    #[error("[M007] {kind} '{key}' not found in registry")]
    NotFound { kind: &'static str, key: String },

    /// A non-completed batch cursor already exists (M008).
    #[error("[M008] Batch cursor {cursor_id} is still open; finish it before starting another")]
    CursorOpen { cursor_id: i64 },

    /// The watermark moved between read and advance (M009).
    #[error("[M009] Watermark changed concurrently: expected {expected}, found {found}")]
    WatermarkConflict { expected: String, found: String },

    /// A stored value could not be decoded (M010).
    #[error("[M010] Invalid stored value: {0}")]
    InvalidData(String),

    /// DuckDB driver error with preserved source chain (M011).
    #[error("[M011] DuckDB error")]
    DuckDb(#[source] duckdb::Error),
}

/// Result type alias for [`MetaError`].
pub type MetaResult<T> = Result<T, MetaError>;

impl From<duckdb::Error> for MetaError {
    fn from(err: duckdb::Error) -> Self {
        MetaError::DuckDb(err)
    }
}

/// Attach a short operation label to a raw DuckDB error.
pub(crate) trait MetaResultExt<T> {
    fn query_context(self, what: &str) -> MetaResult<T>;
    fn write_context(self, what: &str) -> MetaResult<T>;
}

impl<T> MetaResultExt<T> for Result<T, duckdb::Error> {
    fn query_context(self, what: &str) -> MetaResult<T> {
        self.map_err(|e| MetaError::QueryError(format!("{what}: {e}")))
    }

    fn write_context(self, what: &str) -> MetaResult<T> {
        self.map_err(|e| MetaError::WriteError(format!("{what}: {e}")))
    }
}
