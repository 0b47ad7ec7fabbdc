//! Canonical store for tsync.
//!
//! Provides a DuckDB-backed store for the tag registry, per-minute samples,
//! progress cursors, stage logs, the incremental watermark, and the
//! comparison audit log. Schema migrations are applied on open.

pub mod audit;
pub mod connection;
pub mod csv;
pub mod ddl;
pub mod error;
pub mod migration;
pub mod progress;
pub mod registry;
pub(crate) mod row_helpers;
pub mod samples;
pub mod stage_log;
pub mod watermark;

pub use audit::Mismatch;
pub use connection::CanonicalDb;
pub use error::{MetaError, MetaResult};
pub use progress::LockOutcome;
pub use registry::{RegistryImportSummary, RegistryLevel, RegistryRow};
pub use stage_log::StageLogEntry;
