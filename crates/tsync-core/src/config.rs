//! Configuration types and parsing for tsync.yml

use crate::error::{CoreError, CoreResult};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration from tsync.yml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Deployment name, used in logs
    pub name: String,

    /// Canonical store holding registry, samples, cursors, and logs
    #[serde(default)]
    pub canonical: CanonicalConfig,

    /// Source historian
    #[serde(default)]
    pub source: SourceConfig,

    /// Destination wide-table store
    #[serde(default)]
    pub destination: DestinationConfig,

    /// Local time zone of the naive timestamps
    #[serde(default)]
    pub timezone: TimezoneConfig,

    /// Multi-day batch sweep settings
    #[serde(default)]
    pub batch: BatchConfig,

    /// Recurring bounded-window settings
    #[serde(default)]
    pub incremental: IncrementalConfig,

    /// Export behaviour
    #[serde(default)]
    pub export: ExportConfig,

    /// Destination audit settings
    #[serde(default)]
    pub compare: CompareConfig,
}

/// Canonical store location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CanonicalConfig {
    /// DuckDB file path (or `:memory:`)
    #[serde(default = "default_canonical_path")]
    pub path: String,
}

impl Default for CanonicalConfig {
    fn default() -> Self {
        Self {
            path: default_canonical_path(),
        }
    }
}

/// Source historian connection and query settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    /// Store location. Usually supplied through `--source` / `TSYNC_SOURCE`.
    #[serde(default)]
    pub path: Option<String>,

    /// Historian table holding `(ID, Value, TimeStamp, Quality)` rows
    #[serde(default = "default_source_table")]
    pub table: String,

    /// Quality marker of a good sample
    #[serde(default = "default_good_quality")]
    pub good_quality: i64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: None,
            table: default_source_table(),
            good_quality: default_good_quality(),
        }
    }
}

/// Destination store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DestinationConfig {
    /// Store location. Usually supplied through `--destination` / `TSYNC_DESTINATION`.
    #[serde(default)]
    pub path: Option<String>,

    /// Prefix prepended to each group's wide table name
    #[serde(default = "default_table_prefix")]
    pub table_prefix: String,
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            path: None,
            table_prefix: default_table_prefix(),
        }
    }
}

/// Offset of the naive local timestamps from UTC
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TimezoneConfig {
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

/// Batch sweep settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchConfig {
    /// How far beyond the day window to look for interpolation neighbors
    #[serde(default = "default_neighbor_margin_hours")]
    pub neighbor_margin_hours: i64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            neighbor_margin_hours: default_neighbor_margin_hours(),
        }
    }
}

impl BatchConfig {
    pub fn neighbor_margin(&self) -> Duration {
        Duration::hours(self.neighbor_margin_hours)
    }
}

/// Incremental ("cron") settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IncrementalConfig {
    /// Radius of the window around the watermark
    #[serde(default = "default_quarter_hour")]
    pub window_minutes: i64,

    /// Minimum age of the watermark before a run is attempted
    #[serde(default = "default_quarter_hour")]
    pub settle_minutes: i64,

    /// Largest neighbor gap the interpolator will bridge
    #[serde(default = "default_quarter_hour")]
    pub max_gap_minutes: i64,

    /// Watermark advance after a successful run
    #[serde(default = "default_quarter_hour")]
    pub step_minutes: i64,
}

impl Default for IncrementalConfig {
    fn default() -> Self {
        Self {
            window_minutes: default_quarter_hour(),
            settle_minutes: default_quarter_hour(),
            max_gap_minutes: default_quarter_hour(),
            step_minutes: default_quarter_hour(),
        }
    }
}

impl IncrementalConfig {
    pub fn window_radius(&self) -> Duration {
        Duration::minutes(self.window_minutes)
    }

    pub fn settle(&self) -> Duration {
        Duration::minutes(self.settle_minutes)
    }

    pub fn max_gap(&self) -> Duration {
        Duration::minutes(self.max_gap_minutes)
    }

    pub fn step(&self) -> Duration {
        Duration::minutes(self.step_minutes)
    }
}

/// Export settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportConfig {
    /// Treat any per-row write failure as a stage failure
    #[serde(default = "default_true")]
    pub fail_on_row_errors: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            fail_on_row_errors: true,
        }
    }
}

/// Comparator settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompareConfig {
    /// Run the comparator after every export
    #[serde(default)]
    pub enabled: bool,

    /// Largest absolute difference still considered equal
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            tolerance: default_tolerance(),
        }
    }
}

fn default_canonical_path() -> String {
    "target/canonical.duckdb".to_string()
}

fn default_source_table() -> String {
    "HistoricalData".to_string()
}

fn default_good_quality() -> i64 {
    192
}

fn default_table_prefix() -> String {
    "CMD".to_string()
}

fn default_neighbor_margin_hours() -> i64 {
    48
}

fn default_quarter_hour() -> i64 {
    15
}

fn default_tolerance() -> f64 {
    0.005
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Config = serde_yaml::from_str(&content)?;
        config.validate()?;
        log::debug!("Loaded config '{}' from {}", config.name, path.display());
        Ok(config)
    }

    /// Load configuration from a directory
    /// Looks for tsync.yml or tsync.yaml
    pub fn load_from_dir(dir: &Path) -> CoreResult<Self> {
        let yml_path = dir.join("tsync.yml");
        let yaml_path = dir.join("tsync.yaml");

        if yml_path.exists() {
            Self::load(&yml_path)
        } else if yaml_path.exists() {
            Self::load(&yaml_path)
        } else {
            Err(CoreError::ConfigNotFound {
                path: yml_path.display().to_string(),
            })
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> CoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(invalid("name cannot be empty"));
        }
        if !(self.compare.tolerance.is_finite() && self.compare.tolerance > 0.0) {
            return Err(invalid(format!(
                "compare.tolerance must be a positive number, got {}",
                self.compare.tolerance
            )));
        }
        let offset = self.timezone.utc_offset_minutes;
        if offset.unsigned_abs() >= 1440 {
            return Err(invalid(format!(
                "timezone.utc_offset_minutes must be within one day, got {offset}"
            )));
        }
        if self.batch.neighbor_margin_hours < 0 {
            return Err(invalid("batch.neighbor_margin_hours cannot be negative"));
        }

        let inc = &self.incremental;
        for (field, value) in [
            ("window_minutes", inc.window_minutes),
            ("max_gap_minutes", inc.max_gap_minutes),
            ("step_minutes", inc.step_minutes),
        ] {
            if value <= 0 {
                return Err(invalid(format!(
                    "incremental.{field} must be positive, got {value}"
                )));
            }
        }
        // The whole window must lie in the past once the watermark has settled.
        if inc.settle_minutes < inc.window_minutes {
            return Err(invalid(format!(
                "incremental.settle_minutes ({}) must be at least window_minutes ({})",
                inc.settle_minutes, inc.window_minutes
            )));
        }
        if self.source.table.trim().is_empty() {
            return Err(invalid("source.table cannot be empty"));
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> CoreError {
    CoreError::ConfigInvalid {
        message: message.into(),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
