//! Interpolator: fill missing minutes between known samples
//!
//! For each minute of the window without a sample, the nearest sample
//! strictly before and strictly after are located by binary search over the
//! tag's sorted timeline and joined linearly. Boolean tags are interpolated
//! like any other and purged afterwards.

use std::collections::HashSet;
use std::fmt;

use chrono::{Duration, NaiveDateTime};
use tsync_core::config::{BatchConfig, IncrementalConfig};
use tsync_core::timestamp::local_to_utc;
use tsync_core::{Provenance, Sample, TimeWindow};
use tsync_meta::{registry, samples};

use crate::context::PipelineContext;
use crate::error::PipelineResult;

/// How far to look for neighbors and how wide a gap may be bridged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterpolationPolicy {
    /// Neighbor search extends this far beyond the window on each side
    pub search_margin: Duration,
    /// Largest distance between the two neighbors; `None` is unbounded
    pub max_gap: Option<Duration>,
}

impl InterpolationPolicy {
    /// Day sweeps: wide neighbor search, no gap bound.
    pub fn batch(config: &BatchConfig) -> Self {
        Self {
            search_margin: config.neighbor_margin(),
            max_gap: None,
        }
    }

    /// Bounded windows: neighbors must be at most `max_gap` apart.
    pub fn incremental(config: &IncrementalConfig) -> Self {
        Self {
            search_margin: config.max_gap(),
            max_gap: Some(config.max_gap()),
        }
    }
}

/// What the interpolator decided for one minute
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MinuteOutcome {
    /// A value was synthesized; `predecessor` indexes the earlier neighbor
    Filled { value: f64, predecessor: usize },
    /// The minute already holds a sample
    Present,
    /// No sample on one side within the search margin
    NoNeighbor,
    /// Both neighbors exist but are further apart than the policy allows
    GapTooWide,
}

/// Counts for one interpolation pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InterpolationReport {
    pub tags: usize,
    pub filled: usize,
    pub no_neighbor: usize,
    pub gap_too_wide: usize,
    /// Boolean interpolations deleted by the post-pass
    pub purged: usize,
}

impl fmt::Display for InterpolationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} tags, filled {} minutes ({} without neighbors, {} across wide gaps), purged {} boolean",
            self.tags, self.filled, self.no_neighbor, self.gap_too_wide, self.purged
        )
    }
}

/// Linear interpolation between `(t1, v1)` and `(t2, v2)` at `t`.
///
/// A zero-length interval yields `v1`.
pub fn interpolate_value(t1: NaiveDateTime, v1: f64, t2: NaiveDateTime, v2: f64, t: NaiveDateTime) -> f64 {
    let total = (t2 - t1).num_seconds();
    if total == 0 {
        return v1;
    }
    let elapsed = (t - t1).num_seconds();
    v1 + (v2 - v1) * elapsed as f64 / total as f64
}

/// Decide a single minute against `known`, which must be sorted by time.
pub fn fill_minute(known: &[Sample], minute: NaiveDateTime, policy: &InterpolationPolicy) -> MinuteOutcome {
    let idx = known.partition_point(|s| s.timestamp < minute);
    if known.get(idx).is_some_and(|s| s.timestamp == minute) {
        return MinuteOutcome::Present;
    }
    let (Some(before), Some(after)) = (idx.checked_sub(1), known.get(idx)) else {
        return MinuteOutcome::NoNeighbor;
    };
    let prev = &known[before];
    if policy
        .max_gap
        .is_some_and(|gap| after.timestamp - prev.timestamp > gap)
    {
        return MinuteOutcome::GapTooWide;
    }
    MinuteOutcome::Filled {
        value: interpolate_value(prev.timestamp, prev.value, after.timestamp, after.value, minute),
        predecessor: before,
    }
}

/// Synthesized samples for every fillable minute of `window`.
pub fn fill_tag(
    known: &[Sample],
    window: &TimeWindow,
    policy: &InterpolationPolicy,
    utc_offset_minutes: i32,
    report: &mut InterpolationReport,
) -> Vec<Sample> {
    let mut fills = Vec::new();
    for minute in window.minutes() {
        match fill_minute(known, minute, policy) {
            MinuteOutcome::Filled { value, predecessor } => {
                let prev = &known[predecessor];
                fills.push(Sample {
                    tag_id: prev.tag_id.clone(),
                    column_name: prev.column_name.clone(),
                    value,
                    timestamp: minute,
                    timestamp_utc: local_to_utc(minute, utc_offset_minutes),
                    node_id: prev.node_id,
                    provenance: Provenance::Interpolated,
                });
                report.filled += 1;
            }
            MinuteOutcome::Present => {}
            MinuteOutcome::NoNeighbor => report.no_neighbor += 1,
            MinuteOutcome::GapTooWide => report.gap_too_wide += 1,
        }
    }
    fills
}

/// Fill every eligible tag that has at least one sample in `window`, then
/// purge interpolated booleans.
///
/// Each tag's fills are written in their own transaction.
pub fn interpolate(
    ctx: &PipelineContext<'_>,
    window: &TimeWindow,
    policy: &InterpolationPolicy,
) -> PipelineResult<InterpolationReport> {
    let conn = ctx.canonical.conn();
    let eligible: HashSet<String> = registry::active_tags(conn)?
        .into_iter()
        .map(|t| t.source_id)
        .collect();
    let search = window.widen(policy.search_margin);
    let offset = ctx.config.timezone.utc_offset_minutes;
    let mut report = InterpolationReport::default();

    for tag in samples::tags_in_window(conn, window)? {
        if !eligible.contains(&tag) {
            continue;
        }
        report.tags += 1;
        let known = samples::samples_for_tag(conn, &tag, &search)?;
        let fills = fill_tag(&known, window, policy, offset, &mut report);
        if fills.is_empty() {
            continue;
        }
        log::debug!("Tag {tag}: {} minutes interpolated", fills.len());
        ctx.canonical
            .transaction(|conn| samples::insert_samples(conn, &fills))?;
    }

    report.purged = ctx
        .canonical
        .transaction(samples::purge_boolean_interpolations)?;
    log::info!("Complete {window}: {report}");
    Ok(report)
}

#[cfg(test)]
#[path = "interpolate_test.rs"]
mod tests;
