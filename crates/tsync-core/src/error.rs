//! Error types for tsync-core

use thiserror::Error;

/// Core error type for tsync
#[derive(Error, Debug)]
pub enum CoreError {
    /// E001: Configuration file not found
    #[error("[E001] Config file not found: {path}")]
    ConfigNotFound { path: String },

    /// E002: Invalid configuration value
    #[error("[E002] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// E003: Timestamp text could not be parsed
    #[error("[E003] Invalid timestamp '{value}': expected YYYY-MM-DD HH:MM[:SS]")]
    InvalidTimestamp { value: String },

    /// E004: Window end precedes its start
    #[error("[E004] Invalid time window: start {start} is after end {end}")]
    InvalidWindow { start: String, end: String },

    /// E005: Unknown tag value kind
    #[error("[E005] Unknown value kind '{kind}': expected 'numeric' or 'boolean'")]
    UnknownValueKind { kind: String },

    /// E006: Unknown pipeline stage name
    #[error("[E006] Unknown stage '{stage}': expected import, complete, export, or compare")]
    UnknownStage { stage: String },

    /// E007: IO error
    #[error("[E007] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// E008: IO error with file path context
    #[error("[E008] Failed to read '{path}': {source}")]
    IoWithPath {
        path: String,
        source: std::io::Error,
    },

    /// E009: YAML parse error
    #[error("[E009] Config parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;
