//! tsync-core - Core library for tsync
//!
//! This crate provides the shared types used across all tsync components:
//! registry entries, per-minute samples, time windows, the batch cursor
//! state machine, destination naming, and configuration parsing.

pub mod config;
pub mod cursor;
pub mod error;
pub mod naming;
pub mod registry;
pub mod sample;
pub mod timestamp;
pub mod window;

pub use config::Config;
pub use cursor::{BatchCursorState, CursorMode, ProgressCursor, Stage, Transition};
pub use error::{CoreError, CoreResult};
pub use registry::{Group, Node, RegisteredTag, ValueKind};
pub use sample::{Provenance, RawSample, Sample};
pub use window::TimeWindow;
