//! Store trait definitions
//!
//! The pipeline talks to two external stores: a source historian it reads
//! raw samples from, and a destination store holding one wide table per
//! group. Both are network services in production, so every call is async.

use crate::error::DbResult;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use tsync_core::{RawSample, TimeWindow};

/// One destination column assignment
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnValue {
    pub column: String,
    /// `None` leaves the column unset
    pub value: Option<f64>,
}

impl ColumnValue {
    pub fn new(column: impl Into<String>, value: Option<f64>) -> Self {
        Self {
            column: column.into(),
            value,
        }
    }
}

/// A wide-table row read back from the destination
#[derive(Debug, Clone, PartialEq)]
pub struct WideRow {
    pub timestamp: NaiveDateTime,
    pub values: BTreeMap<String, Option<f64>>,
}

impl WideRow {
    /// Value of `column`, treating a missing column as unset.
    pub fn get(&self, column: &str) -> Option<f64> {
        self.values.get(column).copied().flatten()
    }
}

/// Operations every store backend supports
///
/// Implementations must be Send + Sync for async operation.
#[async_trait]
pub trait StoreCore: Send + Sync {
    /// Check if a table or view exists
    async fn relation_exists(&self, name: &str) -> DbResult<bool>;

    /// Store type identifier for logging
    fn db_type(&self) -> &'static str;
}

/// Read access to the source historian
#[async_trait]
pub trait HistorianSource: StoreCore {
    /// Fetch raw samples for `tag_ids` with the given quality marker whose
    /// minute falls inside `window`, ordered by tag then time.
    async fn fetch_samples(
        &self,
        table: &str,
        tag_ids: &[String],
        good_quality: i64,
        window: &TimeWindow,
    ) -> DbResult<Vec<RawSample>>;
}

/// Read/write access to the destination wide tables
#[async_trait]
pub trait WideTableStore: StoreCore {
    /// Create `table` with a `timestamp` key and one column per entry in
    /// `columns` unless it already exists. Returns `true` if created.
    async fn create_table_if_missing(&self, table: &str, columns: &[String]) -> DbResult<bool>;

    /// Whether a row keyed by `ts` exists
    async fn row_exists(&self, table: &str, ts: NaiveDateTime) -> DbResult<bool>;

    /// Update the columns that carry a value on the row keyed by `ts`,
    /// leaving every other column untouched. Returns affected rows.
    async fn update_columns(
        &self,
        table: &str,
        ts: NaiveDateTime,
        values: &[ColumnValue],
    ) -> DbResult<usize>;

    /// Insert a full row keyed by `ts`; unset columns are stored as NULL
    async fn insert_row(&self, table: &str, ts: NaiveDateTime, values: &[ColumnValue])
        -> DbResult<()>;

    /// Read `columns` for every row whose timestamp falls in `window`
    async fn read_rows(
        &self,
        table: &str,
        columns: &[String],
        window: &TimeWindow,
    ) -> DbResult<Vec<WideRow>>;
}
