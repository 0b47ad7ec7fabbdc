//! CSV reading through DuckDB's `read_csv`.
//!
//! Every cell is read as text; callers parse what they need.

use crate::error::{MetaError, MetaResult};
use crate::row_helpers::get_column_as_string;
use duckdb::Connection;
use std::path::Path;
use tsync_core::naming::escape_sql_string;

/// A CSV file loaded as text cells
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvTable {
    pub headers: Vec<String>,
    /// Trimmed cells; empty cells are `None`
    pub rows: Vec<Vec<Option<String>>>,
}

impl CsvTable {
    /// Index of the first header matching any of `names`, ignoring case and
    /// surrounding whitespace.
    pub fn column_index(&self, names: &[&str]) -> Option<usize> {
        names.iter().find_map(|name| {
            self.headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        })
    }

    /// Like [`CsvTable::column_index`] but fails when no header matches.
    pub fn require_column(&self, names: &[&str]) -> MetaResult<usize> {
        self.column_index(names).ok_or_else(|| {
            MetaError::InvalidData(format!(
                "CSV is missing a '{}' column (found: {})",
                names.first().copied().unwrap_or_default(),
                self.headers.join(", ")
            ))
        })
    }

    /// Cell at `row`/`col`, if present and non-empty.
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row)?.get(col)?.as_deref()
    }
}

/// Load a headered CSV file.
pub fn read_csv_file(conn: &Connection, path: &Path) -> MetaResult<CsvTable> {
    if !path.is_file() {
        return Err(MetaError::InvalidData(format!(
            "CSV file not found: {}",
            path.display()
        )));
    }
    let sql = format!(
        "SELECT * FROM read_csv('{}', header = true, all_varchar = true)",
        escape_sql_string(&path.display().to_string())
    );
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| MetaError::QueryError(format!("read {}: {e}", path.display())))?;

    // Column metadata is only available after execution.
    let rows: Vec<Vec<Option<String>>> = stmt
        .query_map([], |row| {
            let col_count = row.as_ref().column_count();
            Ok((0..col_count)
                .map(|i| {
                    get_column_as_string(row, i)
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                })
                .collect())
        })
        .map_err(|e| MetaError::QueryError(format!("read {}: {e}", path.display())))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| MetaError::QueryError(format!("row error in {}: {e}", path.display())))?;

    let headers: Vec<String> = (0..stmt.column_count())
        .map(|i| stmt.column_name(i).map_or("?".to_string(), |v| v.to_string()))
        .collect();

    log::debug!("Read {} rows from {}", rows.len(), path.display());
    Ok(CsvTable { headers, rows })
}
