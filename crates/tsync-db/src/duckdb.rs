//! DuckDB store backend implementation

use crate::error::{DbError, DbResult};
use crate::traits::{ColumnValue, HistorianSource, StoreCore, WideRow, WideTableStore};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use duckdb::types::Value;
use duckdb::{params_from_iter, Connection};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tsync_core::naming::{quote_ident, quote_qualified};
use tsync_core::timestamp::{format_ts, parse_ts, TIMESTAMP_FORMAT};
use tsync_core::{RawSample, TimeWindow};

/// Name of the key column of every wide table
pub const TIMESTAMP_COLUMN: &str = "timestamp";

/// DuckDB store backend
///
/// Serves as either the source historian or the destination store,
/// depending on which file it is opened against.
pub struct DuckDbBackend {
    conn: Mutex<Connection>,
}

impl DuckDbBackend {
    /// Create a new in-memory DuckDB connection
    pub fn in_memory() -> DbResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create a new DuckDB connection from a file path
    pub fn from_path(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| DbError::ConnectionError(format!("{e}: {}", path.display())))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create from path string (handles :memory: special case)
    pub fn new(path: &str) -> DbResult<Self> {
        if path == ":memory:" {
            Self::in_memory()
        } else {
            Self::from_path(Path::new(path))
        }
    }

    fn lock(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| DbError::MutexPoisoned(e.to_string()))
    }

    /// Run one or more `;`-separated statements, as used to lay out
    /// fixture tables.
    pub fn execute_batch(&self, sql: &str) -> DbResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(sql).map_err(DbError::from)
    }

    /// Execute a parameterised statement synchronously
    fn execute_params_sync(&self, sql: &str, params: Vec<Value>) -> DbResult<usize> {
        let conn = self.lock()?;
        conn.execute(sql, params_from_iter(params))
            .map_err(|e| DbError::from(e).with_sql(sql))
    }

    /// Check if relation exists synchronously
    fn relation_exists_sync(&self, name: &str) -> DbResult<bool> {
        let conn = self.lock()?;

        let (schema, table) = match name.rfind('.') {
            Some(pos) => (&name[..pos], &name[pos + 1..]),
            None => ("main", name),
        };

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = ? AND table_name = ?",
                duckdb::params![schema, table],
                |row| row.get(0),
            )
            .map_err(DbError::from)?;

        Ok(count > 0)
    }

    fn fetch_samples_sync(
        &self,
        table: &str,
        tag_ids: &[String],
        good_quality: i64,
        window: &TimeWindow,
    ) -> DbResult<Vec<RawSample>> {
        let placeholders = vec!["?"; tag_ids.len()].join(", ");
        let sql = format!(
            "SELECT CAST(\"ID\" AS VARCHAR), CAST(\"Value\" AS VARCHAR), strftime(CAST(\"TimeStamp\" AS TIMESTAMP), '{fmt}')
             FROM {table}
             WHERE CAST(\"ID\" AS VARCHAR) IN ({placeholders})
               AND \"Quality\" = ?
               AND \"TimeStamp\" >= CAST(? AS TIMESTAMP)
               AND \"TimeStamp\" < CAST(? AS TIMESTAMP)
             ORDER BY CAST(\"ID\" AS VARCHAR), \"TimeStamp\"",
            fmt = TIMESTAMP_FORMAT,
            table = quote_qualified(table),
        );

        let mut params: Vec<Value> = tag_ids.iter().map(|id| Value::Text(id.clone())).collect();
        params.push(Value::BigInt(good_quality));
        params.push(Value::Text(format_ts(window.start())));
        params.push(Value::Text(format_ts(window.end_exclusive())));

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql).map_err(DbError::from)?;
        let rows: Vec<(Option<String>, Option<String>, Option<String>)> = stmt
            .query_map(params_from_iter(params), |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })
            .map_err(DbError::from)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(DbError::from)?;

        let mut samples = Vec::with_capacity(rows.len());
        for (tag_id, raw_value, ts) in rows {
            let (Some(tag_id), Some(ts)) = (tag_id, ts) else {
                continue;
            };
            let timestamp = parse_ts(&ts).map_err(|e| DbError::InvalidValue(e.to_string()))?;
            samples.push(RawSample {
                tag_id,
                raw_value: raw_value.unwrap_or_default(),
                timestamp,
            });
        }
        Ok(samples)
    }

    fn read_rows_sync(
        &self,
        table: &str,
        columns: &[String],
        window: &TimeWindow,
    ) -> DbResult<Vec<WideRow>> {
        let mut select = vec![format!(
            "strftime({}, '{}')",
            quote_ident(TIMESTAMP_COLUMN),
            TIMESTAMP_FORMAT
        )];
        select.extend(
            columns
                .iter()
                .map(|c| format!("TRY_CAST({} AS DOUBLE)", quote_ident(c))),
        );
        let sql = format!(
            "SELECT {} FROM {} WHERE {ts} >= CAST(? AS TIMESTAMP) AND {ts} < CAST(? AS TIMESTAMP) ORDER BY {ts}",
            select.join(", "),
            quote_ident(table),
            ts = quote_ident(TIMESTAMP_COLUMN),
        );

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql).map_err(DbError::from)?;
        let raw: Vec<(String, Vec<Option<f64>>)> = stmt
            .query_map(
                duckdb::params![format_ts(window.start()), format_ts(window.end_exclusive())],
                |row| {
                    let ts: String = row.get(0)?;
                    let mut values = Vec::with_capacity(columns.len());
                    for i in 0..columns.len() {
                        values.push(row.get::<_, Option<f64>>(i + 1)?);
                    }
                    Ok((ts, values))
                },
            )
            .map_err(DbError::from)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(DbError::from)?;

        raw.into_iter()
            .map(|(ts, values)| {
                let timestamp =
                    parse_ts(&ts).map_err(|e| DbError::InvalidValue(e.to_string()))?;
                Ok(WideRow {
                    timestamp,
                    values: columns.iter().cloned().zip(values).collect::<BTreeMap<_, _>>(),
                })
            })
            .collect()
    }
}

impl DbError {
    fn with_sql(self, sql: &str) -> Self {
        match self {
            DbError::ExecutionError(msg) => DbError::ExecutionError(format!("{msg}: {sql}")),
            other => other,
        }
    }
}

fn to_value(value: Option<f64>) -> Value {
    value.map_or(Value::Null, Value::Double)
}

#[async_trait]
impl StoreCore for DuckDbBackend {
    async fn relation_exists(&self, name: &str) -> DbResult<bool> {
        self.relation_exists_sync(name)
    }

    fn db_type(&self) -> &'static str {
        "duckdb"
    }
}

#[async_trait]
impl HistorianSource for DuckDbBackend {
    async fn fetch_samples(
        &self,
        table: &str,
        tag_ids: &[String],
        good_quality: i64,
        window: &TimeWindow,
    ) -> DbResult<Vec<RawSample>> {
        if tag_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.fetch_samples_sync(table, tag_ids, good_quality, window)
    }
}

#[async_trait]
impl WideTableStore for DuckDbBackend {
    async fn create_table_if_missing(&self, table: &str, columns: &[String]) -> DbResult<bool> {
        if self.relation_exists_sync(table)? {
            return Ok(false);
        }
        let mut defs = vec![format!(
            "{} TIMESTAMP PRIMARY KEY",
            quote_ident(TIMESTAMP_COLUMN)
        )];
        defs.extend(columns.iter().map(|c| format!("{} DOUBLE", quote_ident(c))));
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_ident(table),
            defs.join(", ")
        );
        self.execute_batch(&sql)?;
        log::info!("Created destination table {table} with {} columns", columns.len());
        Ok(true)
    }

    async fn row_exists(&self, table: &str, ts: NaiveDateTime) -> DbResult<bool> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} = CAST(? AS TIMESTAMP)",
            quote_ident(table),
            quote_ident(TIMESTAMP_COLUMN)
        );
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(&sql, duckdb::params![format_ts(ts)], |row| row.get(0))
            .map_err(DbError::from)?;
        Ok(count > 0)
    }

    async fn update_columns(
        &self,
        table: &str,
        ts: NaiveDateTime,
        values: &[ColumnValue],
    ) -> DbResult<usize> {
        let present: Vec<&ColumnValue> = values.iter().filter(|v| v.value.is_some()).collect();
        if present.is_empty() {
            return Ok(0);
        }
        let assignments: Vec<String> = present
            .iter()
            .map(|v| format!("{} = ?", quote_ident(&v.column)))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = CAST(? AS TIMESTAMP)",
            quote_ident(table),
            assignments.join(", "),
            quote_ident(TIMESTAMP_COLUMN)
        );
        let mut params: Vec<Value> = present.iter().map(|v| to_value(v.value)).collect();
        params.push(Value::Text(format_ts(ts)));
        self.execute_params_sync(&sql, params)
    }

    async fn insert_row(
        &self,
        table: &str,
        ts: NaiveDateTime,
        values: &[ColumnValue],
    ) -> DbResult<()> {
        let mut columns = vec![quote_ident(TIMESTAMP_COLUMN)];
        columns.extend(values.iter().map(|v| quote_ident(&v.column)));
        let mut placeholders = vec!["CAST(? AS TIMESTAMP)".to_string()];
        placeholders.extend(values.iter().map(|_| "?".to_string()));
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(table),
            columns.join(", "),
            placeholders.join(", ")
        );
        let mut params = vec![Value::Text(format_ts(ts))];
        params.extend(values.iter().map(|v| to_value(v.value)));
        self.execute_params_sync(&sql, params)?;
        Ok(())
    }

    async fn read_rows(
        &self,
        table: &str,
        columns: &[String],
        window: &TimeWindow,
    ) -> DbResult<Vec<WideRow>> {
        self.read_rows_sync(table, columns, window)
    }
}

#[cfg(test)]
#[path = "duckdb_test.rs"]
mod tests;
