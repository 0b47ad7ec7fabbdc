//! Shared fixtures for pipeline tests

use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::collections::HashMap;
use tsync_core::config::{
    BatchConfig, CanonicalConfig, CompareConfig, DestinationConfig, ExportConfig,
    IncrementalConfig, SourceConfig, TimezoneConfig,
};
use tsync_core::timestamp::{local_to_utc, parse_ts};
use tsync_core::{Config, Provenance, RawSample, Sample, TimeWindow, ValueKind};
use tsync_db::{
    ColumnValue, DbError, DbResult, DuckDbBackend, HistorianSource, StoreCore, WideRow,
    WideTableStore,
};
use tsync_meta::registry::{active_tags, import_registry_rows};
use tsync_meta::{samples, CanonicalDb, RegistryRow};

use crate::context::PipelineContext;

pub(crate) fn ts(s: &str) -> NaiveDateTime {
    parse_ts(s).unwrap()
}

pub(crate) fn window(start: &str, end: &str) -> TimeWindow {
    TimeWindow::new(ts(start), ts(end)).unwrap()
}

/// Defaults everywhere, with an empty table prefix so group `G1` exports to
/// a table named `G1`.
pub(crate) fn test_config() -> Config {
    Config {
        name: "test".to_string(),
        canonical: CanonicalConfig::default(),
        source: SourceConfig::default(),
        destination: DestinationConfig {
            path: None,
            table_prefix: String::new(),
        },
        timezone: TimezoneConfig::default(),
        batch: BatchConfig::default(),
        incremental: IncrementalConfig::default(),
        export: ExportConfig::default(),
        compare: CompareConfig::default(),
    }
}

pub(crate) fn registry_row(source_id: &str, column: &str, group: &str, kind: ValueKind) -> RegistryRow {
    RegistryRow {
        source_id: source_id.to_string(),
        column_name: column.to_string(),
        group_label: group.to_string(),
        node_label: "Level 1".to_string(),
        kind,
        active: true,
    }
}

/// Canonical store, historian, and destination, all in memory.
///
/// The registry holds tag `101` (numeric, column `A`) and tag `102`
/// (boolean, column `B`) under group `G1`.
pub(crate) struct Fixture {
    pub config: Config,
    pub canonical: CanonicalDb,
    pub source: DuckDbBackend,
    pub destination: DuckDbBackend,
}

impl Fixture {
    pub async fn new() -> Self {
        let canonical = CanonicalDb::open_memory().unwrap();
        canonical
            .transaction(|conn| {
                import_registry_rows(
                    conn,
                    &[
                        registry_row("101", "A", "G1", ValueKind::Numeric),
                        registry_row("102", "B", "G1", ValueKind::Boolean),
                    ],
                )
            })
            .unwrap();

        let source = DuckDbBackend::in_memory().unwrap();
        source
            .execute_batch(
                r#"CREATE TABLE "HistoricalData" ("ID" VARCHAR, "Value" VARCHAR, "TimeStamp" TIMESTAMP, "Quality" INTEGER)"#,
            )
            .unwrap();

        Self {
            config: test_config(),
            canonical,
            source,
            destination: DuckDbBackend::in_memory().unwrap(),
        }
    }

    pub fn ctx(&self) -> PipelineContext<'_> {
        PipelineContext {
            config: &self.config,
            canonical: &self.canonical,
            source: &self.source,
            destination: &self.destination,
        }
    }

    /// Context whose destination is `destination` instead of the fixture's.
    pub fn ctx_with_destination<'a>(&'a self, destination: &'a dyn WideTableStore) -> PipelineContext<'a> {
        PipelineContext {
            destination,
            ..self.ctx()
        }
    }

    /// Good-quality historian rows of `(id, value, timestamp)`.
    pub async fn historian(&self, rows: &[(&str, &str, &str)]) {
        let values: Vec<String> = rows
            .iter()
            .map(|(id, value, at)| format!("('{id}', '{value}', TIMESTAMP '{at}', 192)"))
            .collect();
        self.source
            .execute_batch(&format!(
                r#"INSERT INTO "HistoricalData" VALUES {}"#,
                values.join(", ")
            ))
            .unwrap();
    }

    /// Insert canonical samples of `(tag, value, minute, provenance)`.
    pub fn seed(&self, rows: &[(&str, f64, &str, Provenance)]) {
        let tags: HashMap<String, _> = active_tags(self.canonical.conn())
            .unwrap()
            .into_iter()
            .map(|t| (t.source_id.clone(), t))
            .collect();
        let batch: Vec<Sample> = rows
            .iter()
            .map(|(tag, value, at, provenance)| {
                let registered = &tags[*tag];
                Sample {
                    tag_id: tag.to_string(),
                    column_name: registered.column_name.clone(),
                    value: *value,
                    timestamp: ts(at),
                    timestamp_utc: local_to_utc(ts(at), 0),
                    node_id: registered.node_id,
                    provenance: *provenance,
                }
            })
            .collect();
        self.canonical
            .transaction(|conn| samples::insert_samples(conn, &batch))
            .unwrap();
    }

    /// Stored `(tag, minute, value, provenance)` tuples in `window`.
    pub fn stored(&self, window: &TimeWindow) -> Vec<(String, NaiveDateTime, f64, Provenance)> {
        samples::samples_in_window(self.canonical.conn(), window)
            .unwrap()
            .into_iter()
            .map(|s| (s.tag_id, s.timestamp, s.value, s.provenance))
            .collect()
    }

    /// Destination rows of table `G1`, columns `A` and `B`.
    pub async fn destination_rows(&self, window: &TimeWindow) -> Vec<WideRow> {
        self.destination
            .read_rows("G1", &["A".to_string(), "B".to_string()], window)
            .await
            .unwrap()
    }
}

/// How a [`FlakyStore`] misbehaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fault {
    /// Every row insert fails as a statement error
    RejectInserts,
    /// Every call fails as a connectivity error
    Unreachable,
}

/// A DuckDB store that injects failures.
pub(crate) struct FlakyStore {
    pub inner: DuckDbBackend,
    pub fault: Fault,
}

impl FlakyStore {
    pub fn new(fault: Fault) -> Self {
        Self {
            inner: DuckDbBackend::in_memory().unwrap(),
            fault,
        }
    }

    fn check(&self) -> DbResult<()> {
        match self.fault {
            Fault::Unreachable => Err(DbError::ConnectionError("store is offline".to_string())),
            Fault::RejectInserts => Ok(()),
        }
    }
}

#[async_trait]
impl StoreCore for FlakyStore {
    async fn relation_exists(&self, name: &str) -> DbResult<bool> {
        self.check()?;
        self.inner.relation_exists(name).await
    }

    fn db_type(&self) -> &'static str {
        "flaky"
    }
}

#[async_trait]
impl HistorianSource for FlakyStore {
    async fn fetch_samples(
        &self,
        table: &str,
        tag_ids: &[String],
        good_quality: i64,
        window: &TimeWindow,
    ) -> DbResult<Vec<RawSample>> {
        self.check()?;
        self.inner
            .fetch_samples(table, tag_ids, good_quality, window)
            .await
    }
}

#[async_trait]
impl WideTableStore for FlakyStore {
    async fn create_table_if_missing(&self, table: &str, columns: &[String]) -> DbResult<bool> {
        self.check()?;
        self.inner.create_table_if_missing(table, columns).await
    }

    async fn row_exists(&self, table: &str, ts: NaiveDateTime) -> DbResult<bool> {
        self.check()?;
        self.inner.row_exists(table, ts).await
    }

    async fn update_columns(
        &self,
        table: &str,
        ts: NaiveDateTime,
        values: &[ColumnValue],
    ) -> DbResult<usize> {
        self.check()?;
        self.inner.update_columns(table, ts, values).await
    }

    async fn insert_row(&self, table: &str, ts: NaiveDateTime, values: &[ColumnValue]) -> DbResult<()> {
        self.check()?;
        if self.fault == Fault::RejectInserts {
            return Err(DbError::ExecutionError(format!("insert into {table} rejected")));
        }
        self.inner.insert_row(table, ts, values).await
    }

    async fn read_rows(
        &self,
        table: &str,
        columns: &[String],
        window: &TimeWindow,
    ) -> DbResult<Vec<WideRow>> {
        self.check()?;
        self.inner.read_rows(table, columns, window).await
    }
}
