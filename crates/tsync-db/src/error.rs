//! Error types for tsync-db

use thiserror::Error;

/// Store operation errors
#[derive(Error, Debug)]
pub enum DbError {
    /// Connection error (D001)
    #[error("[D001] Store connection failed: {0}")]
    ConnectionError(String),

    /// Query execution error (D002)
    #[error("[D002] SQL execution failed: {0}")]
    ExecutionError(String),

    /// Table not found (D003)
    #[error("[D003] Table or view not found: {0}")]
    TableNotFound(String),

    /// Mutex poisoned (D004)
    #[error("[D004] Store mutex poisoned: {0}")]
    MutexPoisoned(String),

    /// A returned value could not be decoded (D005)
    #[error("[D005] Invalid value from store: {0}")]
    InvalidValue(String),
}

/// Result type alias for DbError
pub type DbResult<T> = Result<T, DbError>;

impl DbError {
    /// Whether the store itself is unreachable, as opposed to a single
    /// statement failing.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, DbError::ConnectionError(_) | DbError::MutexPoisoned(_))
    }
}

impl From<duckdb::Error> for DbError {
    fn from(err: duckdb::Error) -> Self {
        // duckdb::Error does not expose structured variants, so the
        // catalog message is the only way to recognise a missing relation.
        let msg = err.to_string();
        if msg.contains("Table with name")
            || msg.contains("View with name")
            || msg.contains("Table or view with name")
            || (msg.contains("Catalog Error") && msg.contains("Table") && msg.contains("not found"))
        {
            DbError::TableNotFound(msg)
        } else {
            DbError::ExecutionError(msg)
        }
    }
}
