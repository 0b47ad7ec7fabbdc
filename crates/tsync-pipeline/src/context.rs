//! Handles shared by every pipeline stage

use tsync_core::Config;
use tsync_db::{HistorianSource, WideTableStore};
use tsync_meta::CanonicalDb;

/// The configuration and the three stores a stage works against
#[derive(Clone, Copy)]
pub struct PipelineContext<'a> {
    pub config: &'a Config,
    pub canonical: &'a CanonicalDb,
    pub source: &'a dyn HistorianSource,
    pub destination: &'a dyn WideTableStore,
}

impl std::fmt::Debug for PipelineContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineContext")
            .field("name", &self.config.name)
            .field("source", &self.source.db_type())
            .field("destination", &self.destination.db_type())
            .finish_non_exhaustive()
    }
}
