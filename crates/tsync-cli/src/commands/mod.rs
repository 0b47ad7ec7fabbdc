//! CLI command implementations

pub(crate) mod batch;
pub(crate) mod common;
pub(crate) mod compare;
pub(crate) mod cron;
pub(crate) mod ingest;
pub(crate) mod registry;
pub(crate) mod status;
pub(crate) mod tables;
