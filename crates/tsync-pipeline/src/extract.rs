//! Extractor: source historian -> canonical samples
//!
//! Raw rows are reduced to at most one sample per (tag, minute). The first
//! row of a minute in source order wins; later rows in the same minute are
//! dropped. Minutes that already hold an extracted sample from an earlier run
//! are left alone, so re-extracting a window is idempotent.

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::NaiveDateTime;
use tsync_core::sample::parse_value;
use tsync_core::timestamp::{local_to_utc, truncate_to_minute};
use tsync_core::{Provenance, RawSample, RegisteredTag, Sample, TimeWindow};
use tsync_meta::{registry, samples};

use crate::context::PipelineContext;
use crate::error::{PipelineError, PipelineResult};

/// What happened to one raw source row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Became a canonical sample
    Inserted,
    /// Another row already claimed the same (tag, minute) in this batch
    SkippedDuplicate,
    /// The canonical store already holds an extracted sample for the minute
    SkippedExisting,
    /// Tag is unknown or no longer eligible
    SkippedUnregistered,
    /// Value is not a finite number
    SkippedBadValue,
}

/// Per-outcome counts for one extraction
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtractReport {
    pub fetched: usize,
    pub inserted: usize,
    pub skipped_duplicate: usize,
    pub skipped_existing: usize,
    pub skipped_unregistered: usize,
    pub skipped_bad_value: usize,
    /// Interpolated samples replaced by a newly extracted one
    pub superseded: usize,
}

impl ExtractReport {
    fn record(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Inserted => self.inserted += 1,
            ItemOutcome::SkippedDuplicate => self.skipped_duplicate += 1,
            ItemOutcome::SkippedExisting => self.skipped_existing += 1,
            ItemOutcome::SkippedUnregistered => self.skipped_unregistered += 1,
            ItemOutcome::SkippedBadValue => self.skipped_bad_value += 1,
        }
    }
}

impl fmt::Display for ExtractReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fetched {}, inserted {} ({} duplicate, {} existing, {} unregistered, {} bad value)",
            self.fetched,
            self.inserted,
            self.skipped_duplicate,
            self.skipped_existing,
            self.skipped_unregistered,
            self.skipped_bad_value
        )
    }
}

/// Reduce raw rows to canonical samples.
///
/// `raw` must be in source order. A row with an unparseable value does not
/// claim its minute, so a later valid row in the same minute is kept.
pub fn dedupe_samples(
    raw: &[RawSample],
    tags: &HashMap<&str, &RegisteredTag>,
    existing: &HashSet<(String, NaiveDateTime)>,
    utc_offset_minutes: i32,
) -> (Vec<Sample>, ExtractReport) {
    let mut report = ExtractReport {
        fetched: raw.len(),
        ..Default::default()
    };
    let mut seen: HashSet<(&str, NaiveDateTime)> = HashSet::new();
    let mut batch = Vec::new();

    for row in raw {
        let outcome = match tags.get(row.tag_id.as_str()) {
            None => ItemOutcome::SkippedUnregistered,
            Some(tag) => {
                let minute = truncate_to_minute(row.timestamp);
                match parse_value(&row.raw_value) {
                    None => ItemOutcome::SkippedBadValue,
                    Some(_) if !seen.insert((row.tag_id.as_str(), minute)) => {
                        ItemOutcome::SkippedDuplicate
                    }
                    Some(_) if existing.contains(&(row.tag_id.clone(), minute)) => {
                        ItemOutcome::SkippedExisting
                    }
                    Some(value) => {
                        batch.push(Sample {
                            tag_id: row.tag_id.clone(),
                            column_name: tag.column_name.clone(),
                            value,
                            timestamp: minute,
                            timestamp_utc: local_to_utc(minute, utc_offset_minutes),
                            node_id: tag.node_id,
                            provenance: Provenance::Extracted,
                        });
                        ItemOutcome::Inserted
                    }
                }
            }
        };
        report.record(outcome);
    }
    (batch, report)
}

/// Pull raw samples for every eligible tag in `window` and persist the
/// deduplicated batch in one transaction.
pub async fn extract(ctx: &PipelineContext<'_>, window: &TimeWindow) -> PipelineResult<ExtractReport> {
    let conn = ctx.canonical.conn();
    let tags = registry::active_tags(conn)?;
    if tags.is_empty() {
        log::info!("No active tags; nothing to extract for {window}");
        return Ok(ExtractReport::default());
    }
    let by_id: HashMap<&str, &RegisteredTag> =
        tags.iter().map(|t| (t.source_id.as_str(), t)).collect();
    let ids: Vec<String> = tags.iter().map(|t| t.source_id.clone()).collect();

    let source = &ctx.config.source;
    let raw = ctx
        .source
        .fetch_samples(&source.table, &ids, source.good_quality, window)
        .await
        .map_err(PipelineError::Source)?;
    log::debug!("Fetched {} raw samples for {} tags in {window}", raw.len(), ids.len());

    let existing = samples::extracted_minutes(conn, window)?;
    let (batch, mut report) = dedupe_samples(
        &raw,
        &by_id,
        &existing,
        ctx.config.timezone.utc_offset_minutes,
    );

    let keys: Vec<(String, NaiveDateTime)> = batch
        .iter()
        .map(|s| (s.tag_id.clone(), s.timestamp))
        .collect();
    report.superseded = ctx.canonical.transaction(|conn| {
        let superseded = samples::delete_bridged_interpolations(conn, &keys, window)?;
        samples::insert_samples(conn, &batch)?;
        Ok(superseded)
    })?;

    log::info!("Extract {window}: {report}");
    Ok(report)
}

#[cfg(test)]
#[path = "extract_test.rs"]
mod tests;
