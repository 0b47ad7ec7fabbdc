//! tsync-db - Store abstraction layer for tsync
//!
//! This crate provides the traits the pipeline uses to talk to the two
//! external stores (the source historian and the destination wide-table
//! store) and a DuckDB implementation of both.

pub mod duckdb;
pub mod error;
pub mod traits;

pub use self::duckdb::DuckDbBackend;
pub use error::{DbError, DbResult};
pub use traits::{ColumnValue, HistorianSource, StoreCore, WideRow, WideTableStore};
