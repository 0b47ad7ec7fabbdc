//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;

/// Error type representing a non-zero process exit code.
///
/// Use `return Err(ExitCode(N).into())` instead of `std::process::exit(N)`
/// so that destructors run; an open cursor lease must be released.
#[derive(Debug)]
pub(crate) struct ExitCode(pub(crate) i32);

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Empty: main.rs turns this into a status code, never a message.
        write!(f, "")
    }
}

impl std::error::Error for ExitCode {}

/// Pretty-print `value` as JSON on stdout.
pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}

/// Render an optional value, with `-` for `None`.
pub(crate) fn or_dash<T: fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

/// Render an optional reading with four decimals.
pub(crate) fn reading(value: Option<f64>) -> String {
    value.map_or_else(|| "NULL".to_string(), |v| format!("{v:.4}"))
}
