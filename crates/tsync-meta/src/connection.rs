//! Canonical store connection

use crate::error::{MetaError, MetaResult};
use crate::migration;
use duckdb::Connection;
use std::path::Path;

/// The canonical store: one DuckDB connection with the schema brought up to
/// date on open. Stages run one after another, so no pooling.
pub struct CanonicalDb {
    conn: Connection,
}

impl CanonicalDb {
    /// Open the store file at `path`, creating it and its directory if
    /// needed.
    pub fn open(path: &Path) -> MetaResult<Self> {
        let connect_err = |e: &dyn std::fmt::Display| {
            MetaError::ConnectionError(format!("{e}: {}", path.display()))
        };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| connect_err(&e))?;
        }
        let conn = Connection::open(path).map_err(|e| connect_err(&e))?;
        Self::with_schema(conn, &path.display().to_string())
    }

    /// A throwaway store that lives as long as the value.
    pub fn open_memory() -> MetaResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| MetaError::ConnectionError(e.to_string()))?;
        Self::with_schema(conn, ":memory:")
    }

    /// `:memory:` or a file path, as written in configuration.
    pub fn open_str(path: &str) -> MetaResult<Self> {
        match path {
            ":memory:" => Self::open_memory(),
            file => Self::open(Path::new(file)),
        }
    }

    fn with_schema(conn: Connection, label: &str) -> MetaResult<Self> {
        let applied = migration::migrate(&conn)?;
        if applied > 0 {
            log::debug!("Applied {applied} schema migration(s) to {label}");
        }
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Latest schema version recorded in the store.
    pub fn schema_version(&self) -> MetaResult<i32> {
        migration::recorded_version(&self.conn)
    }

    /// Run `body` atomically. Its error is returned after rolling back.
    pub fn transaction<F, T>(&self, body: F) -> MetaResult<T>
    where
        F: FnOnce(&Connection) -> MetaResult<T>,
    {
        atomically(&self.conn, body)
    }
}

/// `BEGIN`, run `body`, then `COMMIT` or `ROLLBACK`.
pub(crate) fn atomically<F, T>(conn: &Connection, body: F) -> MetaResult<T>
where
    F: FnOnce(&Connection) -> MetaResult<T>,
{
    conn.execute_batch("BEGIN TRANSACTION")
        .map_err(|e| MetaError::TransactionError(format!("BEGIN failed: {e}")))?;
    let value = match body(conn) {
        Ok(value) => value,
        Err(e) => {
            roll_back(conn);
            return Err(e);
        }
    };
    if let Err(e) = conn.execute_batch("COMMIT") {
        roll_back(conn);
        return Err(MetaError::TransactionError(format!("COMMIT failed: {e}")));
    }
    Ok(value)
}

fn roll_back(conn: &Connection) {
    if let Err(e) = conn.execute_batch("ROLLBACK") {
        log::warn!("ROLLBACK failed: {e}");
    }
}

#[cfg(test)]
#[path = "connection_test.rs"]
mod tests;
