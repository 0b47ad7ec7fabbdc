//! Per-minute sample types

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where a sample came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Observed in the source historian
    Extracted,
    /// Synthesized by the interpolator
    Interpolated,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Extracted => "extracted",
            Provenance::Interpolated => "interpolated",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provenance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "extracted" => Ok(Provenance::Extracted),
            "interpolated" => Ok(Provenance::Interpolated),
            other => Err(format!("unknown provenance '{other}'")),
        }
    }
}

/// A canonical sample: one value for one tag at one minute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub tag_id: String,
    pub column_name: String,
    pub value: f64,
    /// Naive local time, truncated to the minute
    pub timestamp: NaiveDateTime,
    pub timestamp_utc: NaiveDateTime,
    pub node_id: i64,
    pub provenance: Provenance,
}

/// A row as returned by the source historian, before deduplication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSample {
    pub tag_id: String,
    /// Value as stored by the historian; may use a comma decimal separator
    pub raw_value: String,
    pub timestamp: NaiveDateTime,
}

/// Parse a historian value, accepting `,` as the decimal separator.
///
/// Returns `None` for text that is not a finite number.
pub fn parse_value(raw: &str) -> Option<f64> {
    let normalized = raw.trim().replace(',', ".");
    match normalized.to_ascii_lowercase().as_str() {
        "true" => return Some(1.0),
        "false" => return Some(0.0),
        _ => {}
    }
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value_comma_decimal() {
        assert_eq!(parse_value("12,5"), Some(12.5));
        assert_eq!(parse_value(" 3.25 "), Some(3.25));
        assert_eq!(parse_value("-7"), Some(-7.0));
    }

    #[test]
    fn test_parse_value_booleans() {
        assert_eq!(parse_value("True"), Some(1.0));
        assert_eq!(parse_value("false"), Some(0.0));
    }

    #[test]
    fn test_parse_value_rejects_garbage() {
        assert_eq!(parse_value(""), None);
        assert_eq!(parse_value("n/a"), None);
        assert_eq!(parse_value("NaN"), None);
        assert_eq!(parse_value("inf"), None);
    }

    #[test]
    fn test_provenance_roundtrip() {
        for p in [Provenance::Extracted, Provenance::Interpolated] {
            assert_eq!(p.as_str().parse::<Provenance>().unwrap(), p);
        }
    }
}
