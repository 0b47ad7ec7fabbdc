//! Tag registry types
//!
//! The registry maps historian tag identifiers onto destination wide-table
//! columns and places each tag under a node ("level") that belongs to a
//! group ("plant"). The pipeline only ever reads it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Kind of value a tag carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// Continuous measurement; eligible for interpolation
    #[default]
    Numeric,
    /// On/off state; interpolated values are purged
    Boolean,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Numeric => "numeric",
            ValueKind::Boolean => "boolean",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueKind {
    type Err = CoreError;

    /// Accepts the names as well as the legacy numeric codes `1` and `2`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "numeric" | "1" => Ok(ValueKind::Numeric),
            "boolean" | "bool" | "2" => Ok(ValueKind::Boolean),
            other => Err(CoreError::UnknownValueKind {
                kind: other.to_string(),
            }),
        }
    }
}

/// Top-level grouping ("plant"); owns one destination wide table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub group_id: i64,
    pub label: String,
    pub code: String,
    pub active: bool,
}

/// Hierarchical node ("level") under a group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub node_id: i64,
    pub group_id: i64,
    pub label: String,
    pub code: String,
    pub active: bool,
}

/// A tag that is eligible for processing: the tag, its node, and the node's
/// group are all active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredTag {
    pub source_id: String,
    pub column_name: String,
    pub node_id: i64,
    pub group_id: i64,
    pub kind: ValueKind,
}

/// Inactivity at any level suppresses the tag.
pub fn is_eligible(tag_active: bool, node_active: bool, group_active: bool) -> bool {
    tag_active && node_active && group_active
}
