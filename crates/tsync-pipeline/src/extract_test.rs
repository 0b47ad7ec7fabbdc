use super::*;
use crate::testing::{ts, window, Fault, Fixture, FlakyStore};
use tsync_core::ValueKind;

fn raw(tag: &str, value: &str, at: &str) -> RawSample {
    RawSample {
        tag_id: tag.to_string(),
        raw_value: value.to_string(),
        timestamp: ts(at),
    }
}

fn tag(source_id: &str, column: &str) -> RegisteredTag {
    RegisteredTag {
        source_id: source_id.to_string(),
        column_name: column.to_string(),
        node_id: 7,
        group_id: 1,
        kind: ValueKind::Numeric,
    }
}

#[test]
fn first_row_of_a_minute_wins() {
    let a = tag("101", "A");
    let tags = HashMap::from([("101", &a)]);
    let rows = vec![
        raw("101", "10", "2025-06-01 00:00:05"),
        raw("101", "11", "2025-06-01 00:00:40"),
        raw("101", "12", "2025-06-01 00:01:00"),
    ];

    let (batch, report) = dedupe_samples(&rows, &tags, &HashSet::new(), 0);

    let got: Vec<(NaiveDateTime, f64)> = batch.iter().map(|s| (s.timestamp, s.value)).collect();
    assert_eq!(
        got,
        vec![(ts("2025-06-01 00:00:00"), 10.0), (ts("2025-06-01 00:01:00"), 12.0)]
    );
    assert_eq!(report.fetched, 3);
    assert_eq!(report.inserted, 2);
    assert_eq!(report.skipped_duplicate, 1);
    assert!(batch.iter().all(|s| s.column_name == "A" && s.node_id == 7));
    assert!(batch.iter().all(|s| s.provenance == Provenance::Extracted));
}

#[test]
fn bad_value_does_not_claim_its_minute() {
    let a = tag("101", "A");
    let tags = HashMap::from([("101", &a)]);
    let rows = vec![
        raw("101", "", "2025-06-01 00:00:05"),
        raw("101", "12,5", "2025-06-01 00:00:30"),
    ];

    let (batch, report) = dedupe_samples(&rows, &tags, &HashSet::new(), 0);

    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].value, 12.5);
    assert_eq!(report.skipped_bad_value, 1);
    assert_eq!(report.skipped_duplicate, 0);
}

#[test]
fn unregistered_and_existing_rows_are_skipped() {
    let a = tag("101", "A");
    let tags = HashMap::from([("101", &a)]);
    let existing = HashSet::from([("101".to_string(), ts("2025-06-01 00:00"))]);
    let rows = vec![
        raw("999", "1", "2025-06-01 00:00:00"),
        raw("101", "1", "2025-06-01 00:00:10"),
        raw("101", "2", "2025-06-01 00:01:10"),
    ];

    let (batch, report) = dedupe_samples(&rows, &tags, &existing, 0);

    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].timestamp, ts("2025-06-01 00:01"));
    assert_eq!(report.skipped_unregistered, 1);
    assert_eq!(report.skipped_existing, 1);
}

#[test]
fn utc_timestamp_applies_offset() {
    let a = tag("101", "A");
    let tags = HashMap::from([("101", &a)]);
    let rows = vec![raw("101", "1", "2025-06-01 02:00:00")];

    let (batch, _) = dedupe_samples(&rows, &tags, &HashSet::new(), 120);

    assert_eq!(batch[0].timestamp, ts("2025-06-01 02:00"));
    assert_eq!(batch[0].timestamp_utc, ts("2025-06-01 00:00"));
}

#[tokio::test]
async fn extract_persists_one_sample_per_minute() {
    let fx = Fixture::new().await;
    fx.historian(&[
        ("101", "10", "2025-06-01 00:00:05"),
        ("101", "99", "2025-06-01 00:00:50"),
        ("101", "20", "2025-06-01 00:02:00"),
        ("102", "1", "2025-06-01 00:00:00"),
        ("555", "3", "2025-06-01 00:01:00"),
    ])
    .await;
    let w = window("2025-06-01 00:00", "2025-06-01 00:02");

    let report = extract(&fx.ctx(), &w).await.unwrap();

    assert_eq!(report.inserted, 3);
    assert_eq!(report.skipped_duplicate, 1);
    // Tag 555 is not registered, so the source is never asked for it.
    assert_eq!(report.fetched, 4);
    assert_eq!(
        fx.stored(&w),
        vec![
            ("101".to_string(), ts("2025-06-01 00:00"), 10.0, Provenance::Extracted),
            ("101".to_string(), ts("2025-06-01 00:02"), 20.0, Provenance::Extracted),
            ("102".to_string(), ts("2025-06-01 00:00"), 1.0, Provenance::Extracted),
        ]
    );
}

#[tokio::test]
async fn extract_twice_is_idempotent() {
    let fx = Fixture::new().await;
    fx.historian(&[("101", "10", "2025-06-01 00:00:00")]).await;
    let w = window("2025-06-01 00:00", "2025-06-01 00:05");

    extract(&fx.ctx(), &w).await.unwrap();
    let second = extract(&fx.ctx(), &w).await.unwrap();

    assert_eq!(second.inserted, 0);
    assert_eq!(second.skipped_existing, 1);
    assert_eq!(fx.stored(&w).len(), 1);
}

#[tokio::test]
async fn late_sample_supersedes_interpolation() {
    let fx = Fixture::new().await;
    fx.seed(&[("101", 15.0, "2025-06-01 00:01", Provenance::Interpolated)]);
    fx.historian(&[("101", "16", "2025-06-01 00:01:30")]).await;
    let w = window("2025-06-01 00:00", "2025-06-01 00:02");

    let report = extract(&fx.ctx(), &w).await.unwrap();

    assert_eq!(report.superseded, 1);
    assert_eq!(
        fx.stored(&w),
        vec![("101".to_string(), ts("2025-06-01 00:01"), 16.0, Provenance::Extracted)]
    );
}

#[tokio::test]
async fn late_sample_clears_stale_interpolations_around_it() {
    let fx = Fixture::new().await;
    let mut seeded = vec![
        ("101", 0.0, "2025-06-01 00:00".to_string(), Provenance::Extracted),
        ("101", 10.0, "2025-06-01 00:10".to_string(), Provenance::Extracted),
    ];
    for m in 1..10_u32 {
        seeded.push(("101", f64::from(m), format!("2025-06-01 00:{m:02}"), Provenance::Interpolated));
    }
    let rows: Vec<(&str, f64, &str, Provenance)> = seeded
        .iter()
        .map(|(tag, value, at, provenance)| (*tag, *value, at.as_str(), *provenance))
        .collect();
    fx.seed(&rows);
    fx.historian(&[("101", "50", "2025-06-01 00:05:20")]).await;
    let w = window("2025-06-01 00:00", "2025-06-01 00:10");

    let report = extract(&fx.ctx(), &w).await.unwrap();

    assert_eq!(report.inserted, 1);
    assert_eq!(report.superseded, 9);
    assert_eq!(
        fx.stored(&w),
        vec![
            ("101".to_string(), ts("2025-06-01 00:00"), 0.0, Provenance::Extracted),
            ("101".to_string(), ts("2025-06-01 00:05"), 50.0, Provenance::Extracted),
            ("101".to_string(), ts("2025-06-01 00:10"), 10.0, Provenance::Extracted),
        ]
    );
}

#[tokio::test]
async fn deactivated_tag_is_not_extracted() {
    let fx = Fixture::new().await;
    tsync_meta::registry::set_active(
        fx.canonical.conn(),
        tsync_meta::RegistryLevel::Tag,
        "102",
        false,
    )
    .unwrap();
    fx.historian(&[
        ("101", "10", "2025-06-01 00:00:00"),
        ("102", "1", "2025-06-01 00:00:00"),
    ])
    .await;
    let w = window("2025-06-01 00:00", "2025-06-01 00:00");

    extract(&fx.ctx(), &w).await.unwrap();

    let tags: Vec<String> = fx.stored(&w).into_iter().map(|(tag, ..)| tag).collect();
    assert_eq!(tags, vec!["101".to_string()]);
}

#[tokio::test]
async fn unreachable_source_aborts_without_writing() {
    let fx = Fixture::new().await;
    let offline = FlakyStore::new(Fault::Unreachable);
    let ctx = PipelineContext {
        source: &offline,
        ..fx.ctx()
    };
    let w = window("2025-06-01 00:00", "2025-06-01 00:02");

    let err = extract(&ctx, &w).await.unwrap_err();

    assert!(matches!(err, PipelineError::Source(ref e) if e.is_connectivity()));
    assert!(fx.stored(&w).is_empty());
}
