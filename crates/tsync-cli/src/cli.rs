//! CLI argument definitions using clap derive API

use chrono::{NaiveDate, NaiveDateTime};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tsync_core::timestamp::parse_ts;
use tsync_meta::RegistryLevel;

/// tsync - reconcile historian tags into per-minute wide tables
#[derive(Parser, Debug)]
#[command(name = "tsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory holding tsync.yml
    #[arg(short = 'p', long, global = true, default_value = ".")]
    pub project_dir: String,

    /// Override config file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Canonical store path
    #[arg(long, global = true, env = "TSYNC_CANONICAL")]
    pub canonical: Option<String>,

    /// Source historian store path
    #[arg(long, global = true, env = "TSYNC_SOURCE")]
    pub source: Option<String>,

    /// Destination wide-table store path
    #[arg(long, global = true, env = "TSYNC_DESTINATION")]
    pub destination: Option<String>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Multi-day batch sweep
    Batch(BatchArgs),

    /// Recurring incremental runs driven by the watermark
    Cron(CronArgs),

    /// Audit destination tables against the canonical store
    Compare(CompareArgs),

    /// Upsert a CSV of (tag, value, timestamp) rows into the destination
    Ingest(IngestArgs),

    /// Manage the tag registry
    Registry(RegistryArgs),

    /// Manage destination wide tables
    Tables(TablesArgs),

    /// Show cursors, stage logs, and the watermark
    Status(StatusArgs),
}

/// Arguments for the batch command
#[derive(Args, Debug)]
pub struct BatchArgs {
    #[command(subcommand)]
    pub command: BatchCommand,
}

#[derive(Subcommand, Debug)]
pub enum BatchCommand {
    /// Open a sweep over an inclusive date range
    Start(BatchStartArgs),

    /// Run the current stage for the current day, then advance
    Step,

    /// Step until the sweep completes
    Run,

    /// Clear a stale in-progress flag left by a killed run
    Unlock,
}

#[derive(Args, Debug)]
pub struct BatchStartArgs {
    /// First day (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub from: NaiveDate,

    /// Last day, inclusive (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub to: NaiveDate,
}

/// Arguments for the cron command
#[derive(Args, Debug)]
pub struct CronArgs {
    #[command(subcommand)]
    pub command: CronCommand,
}

#[derive(Subcommand, Debug)]
pub enum CronCommand {
    /// Set the watermark
    Init(CronInitArgs),

    /// Run once if the watermark has settled
    Run(CronRunArgs),

    /// Run periodically until interrupted
    Watch(CronWatchArgs),
}

#[derive(Args, Debug)]
pub struct CronInitArgs {
    /// Watermark instant in local time (default: now)
    #[arg(long, value_parser = parse_timestamp)]
    pub at: Option<NaiveDateTime>,
}

#[derive(Args, Debug)]
pub struct CronRunArgs {
    /// Evaluate as if the local time were this instant
    #[arg(long, value_parser = parse_timestamp)]
    pub now: Option<NaiveDateTime>,
}

#[derive(Args, Debug)]
pub struct CronWatchArgs {
    /// Seconds between attempts
    #[arg(long, default_value = "60", value_parser = clap::value_parser!(u64).range(1..))]
    pub every: u64,
}

/// Arguments for the compare command
#[derive(Args, Debug)]
pub struct CompareArgs {
    /// First minute of the window (local time)
    #[arg(long, value_parser = parse_timestamp)]
    pub from: NaiveDateTime,

    /// Last minute of the window, inclusive (local time)
    #[arg(long, value_parser = parse_timestamp)]
    pub to: NaiveDateTime,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Arguments for the ingest command
#[derive(Args, Debug)]
pub struct IngestArgs {
    /// CSV file with tag, value, and timestamp columns
    pub file: String,
}

/// Arguments for the registry command
#[derive(Args, Debug)]
pub struct RegistryArgs {
    #[command(subcommand)]
    pub command: RegistryCommand,
}

#[derive(Subcommand, Debug)]
pub enum RegistryCommand {
    /// Load tags from a CSV, creating groups and nodes as needed
    Import(RegistryImportArgs),

    /// Mark a group, node, or tag active
    Activate(RegistryToggleArgs),

    /// Mark a group, node, or tag inactive
    Deactivate(RegistryToggleArgs),
}

#[derive(Args, Debug)]
pub struct RegistryImportArgs {
    /// CSV with source_id, column_name, group, node, kind, and optional active columns
    pub file: String,
}

#[derive(Args, Debug)]
pub struct RegistryToggleArgs {
    /// Registry level
    #[arg(value_enum)]
    pub level: LevelArg,

    /// Group label, node label (or group/node), or tag source id
    pub key: String,
}

/// Registry levels accepted on the command line
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelArg {
    Group,
    Node,
    Tag,
}

impl From<LevelArg> for RegistryLevel {
    fn from(level: LevelArg) -> Self {
        match level {
            LevelArg::Group => RegistryLevel::Group,
            LevelArg::Node => RegistryLevel::Node,
            LevelArg::Tag => RegistryLevel::Tag,
        }
    }
}

/// Arguments for the tables command
#[derive(Args, Debug)]
pub struct TablesArgs {
    #[command(subcommand)]
    pub command: TablesCommand,
}

#[derive(Subcommand, Debug)]
pub enum TablesCommand {
    /// Create missing wide tables for every active group
    Create,
}

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Number of cursors and stage logs to show
    #[arg(short = 'n', long, default_value = "10")]
    pub limit: usize,
}

/// Output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON output
    Json,
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

fn parse_timestamp(value: &str) -> Result<NaiveDateTime, String> {
    parse_ts(value).map_err(|e| e.to_string())
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
