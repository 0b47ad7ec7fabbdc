//! Schema versioning for the canonical store
//!
//! Each entry of [`MIGRATIONS`] runs in its own transaction together with
//! the row that records its version, so a store never claims a version
//! whose DDL did not land.

use crate::connection::atomically;
use crate::ddl::{Migration, MIGRATIONS};
use crate::error::{MetaError, MetaResult};
use duckdb::Connection;

const VERSION_TABLE: &str = "CREATE SCHEMA IF NOT EXISTS tsync;
CREATE TABLE IF NOT EXISTS tsync.schema_version (
    version    INTEGER NOT NULL,
    applied_at TIMESTAMP NOT NULL DEFAULT now()
);";

/// Highest version recorded, 0 for a fresh store.
pub fn recorded_version(conn: &Connection) -> MetaResult<i32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM tsync.schema_version",
        [],
        |row| row.get(0),
    )
    .map_err(|e| MetaError::MigrationError(format!("cannot read schema version: {e}")))
}

/// Bring `conn` up to the newest known version. Returns how many
/// migrations ran.
pub fn migrate(conn: &Connection) -> MetaResult<usize> {
    conn.execute_batch(VERSION_TABLE)
        .map_err(|e| MetaError::MigrationError(format!("cannot create schema_version: {e}")))?;
    let from = recorded_version(conn)?;
    let mut applied = 0;
    for migration in MIGRATIONS.iter().filter(|m| m.version > from) {
        apply(conn, migration)?;
        applied += 1;
    }
    Ok(applied)
}

/// Run one migration and record its version, or neither.
pub(crate) fn apply(conn: &Connection, migration: &Migration) -> MetaResult<()> {
    let version = migration.version;
    log::debug!("Applying canonical store migration v{version:03}");
    atomically(conn, |conn| {
        conn.execute_batch(migration.sql)
            .map_err(|e| MetaError::MigrationError(format!("v{version:03} failed: {e}")))?;
        conn.execute(
            "INSERT INTO tsync.schema_version (version) VALUES (?)",
            duckdb::params![version],
        )
        .map_err(|e| MetaError::MigrationError(format!("cannot record v{version:03}: {e}")))?;
        Ok(())
    })
}
