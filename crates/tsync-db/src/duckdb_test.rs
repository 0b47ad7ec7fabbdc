use super::*;
use tsync_core::timestamp::parse_ts;

fn ts(s: &str) -> NaiveDateTime {
    parse_ts(s).unwrap()
}

fn window(start: &str, end: &str) -> TimeWindow {
    TimeWindow::new(ts(start), ts(end)).unwrap()
}

async fn historian() -> DuckDbBackend {
    let db = DuckDbBackend::in_memory().unwrap();
    db.execute_batch(
        r#"CREATE TABLE "HistoricalData" ("ID" INTEGER, "Value" VARCHAR, "TimeStamp" TIMESTAMP, "Quality" INTEGER);
        INSERT INTO "HistoricalData" VALUES
            (2, '1', '2025-06-01 00:00:10', 192),
            (1, '10,5', '2025-06-01 00:00:40', 192),
            (1, '11', '2025-06-01 00:00:05', 192),
            (1, '99', '2025-06-01 00:01:00', 0),
            (1, '12', '2025-06-01 00:03:00', 192),
            (3, '7', '2025-06-01 00:01:00', 192),
            (1, NULL, '2025-06-01 00:02:00', 192);"#,
    )
    .unwrap();
    db
}

#[tokio::test]
async fn test_in_memory() {
    let db = DuckDbBackend::in_memory().unwrap();
    assert_eq!(db.db_type(), "duckdb");
    let db = DuckDbBackend::new(":memory:").unwrap();
    assert!(!db.relation_exists("nonexistent").await.unwrap());
}

#[tokio::test]
async fn test_fetch_samples_orders_by_tag_then_time() {
    let db = historian().await;
    let ids = vec!["1".to_string(), "2".to_string()];
    let samples = db
        .fetch_samples(
            "HistoricalData",
            &ids,
            192,
            &window("2025-06-01 00:00", "2025-06-01 00:02"),
        )
        .await
        .unwrap();

    let got: Vec<(&str, &str)> = samples
        .iter()
        .map(|s| (s.tag_id.as_str(), s.raw_value.as_str()))
        .collect();
    // Tag 3 is not requested, the quality 0 row is dropped, the 00:03 row is
    // outside the window, and the NULL value surfaces as empty text.
    assert_eq!(got, vec![("1", "11"), ("1", "10,5"), ("1", ""), ("2", "1")]);
    assert_eq!(samples[0].timestamp, ts("2025-06-01 00:00:05"));
}

#[tokio::test]
async fn test_fetch_samples_includes_last_minute() {
    let db = historian().await;
    let ids = vec!["1".to_string()];
    let samples = db
        .fetch_samples(
            "HistoricalData",
            &ids,
            192,
            &window("2025-06-01 00:03", "2025-06-01 00:03"),
        )
        .await
        .unwrap();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].raw_value, "12");
}

#[tokio::test]
async fn test_fetch_samples_no_tags() {
    let db = DuckDbBackend::in_memory().unwrap();
    // Table does not even exist; no query is issued.
    let samples = db
        .fetch_samples("missing", &[], 192, &window("2025-06-01 00:00", "2025-06-01 00:10"))
        .await
        .unwrap();
    assert!(samples.is_empty());
}

#[tokio::test]
async fn test_fetch_samples_missing_table() {
    let db = DuckDbBackend::in_memory().unwrap();
    let err = db
        .fetch_samples(
            "missing",
            &["1".to_string()],
            192,
            &window("2025-06-01 00:00", "2025-06-01 00:10"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::TableNotFound(_)), "got {err}");
}

#[tokio::test]
async fn test_create_table_if_missing() {
    let db = DuckDbBackend::in_memory().unwrap();
    let cols = vec!["A".to_string(), "Unit_1".to_string()];
    assert!(db.create_table_if_missing("CMDG1", &cols).await.unwrap());
    assert!(!db.create_table_if_missing("CMDG1", &cols).await.unwrap());
    assert!(db.relation_exists("CMDG1").await.unwrap());
}

#[tokio::test]
async fn test_insert_then_update_leaves_other_columns() {
    let db = DuckDbBackend::in_memory().unwrap();
    let cols = vec!["A".to_string(), "B".to_string()];
    db.create_table_if_missing("CMDG1", &cols).await.unwrap();

    let t0 = ts("2025-06-01 00:00");
    assert!(!db.row_exists("CMDG1", t0).await.unwrap());
    db.insert_row(
        "CMDG1",
        t0,
        &[ColumnValue::new("A", Some(10.0)), ColumnValue::new("B", None)],
    )
    .await
    .unwrap();
    assert!(db.row_exists("CMDG1", t0).await.unwrap());

    let updated = db
        .update_columns(
            "CMDG1",
            t0,
            &[ColumnValue::new("A", None), ColumnValue::new("B", Some(1.0))],
        )
        .await
        .unwrap();
    assert_eq!(updated, 1);

    let rows = db
        .read_rows("CMDG1", &cols, &window("2025-06-01 00:00", "2025-06-01 00:00"))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("A"), Some(10.0));
    assert_eq!(rows[0].get("B"), Some(1.0));
}

#[tokio::test]
async fn test_update_with_no_values_is_noop() {
    let db = DuckDbBackend::in_memory().unwrap();
    db.create_table_if_missing("CMDG1", &["A".to_string()])
        .await
        .unwrap();
    let updated = db
        .update_columns("CMDG1", ts("2025-06-01 00:00"), &[ColumnValue::new("A", None)])
        .await
        .unwrap();
    assert_eq!(updated, 0);
}

#[tokio::test]
async fn test_insert_duplicate_key_fails() {
    let db = DuckDbBackend::in_memory().unwrap();
    db.create_table_if_missing("CMDG1", &["A".to_string()])
        .await
        .unwrap();
    let t0 = ts("2025-06-01 00:00");
    let values = [ColumnValue::new("A", Some(1.0))];
    db.insert_row("CMDG1", t0, &values).await.unwrap();
    assert!(db.insert_row("CMDG1", t0, &values).await.is_err());
}

#[tokio::test]
async fn test_read_rows_window_and_nulls() {
    let db = DuckDbBackend::in_memory().unwrap();
    let cols = vec!["A".to_string(), "B".to_string()];
    db.create_table_if_missing("CMDG1", &cols).await.unwrap();
    for (minute, a) in [("00:00", Some(1.0)), ("00:01", None), ("00:02", Some(3.0))] {
        db.insert_row(
            "CMDG1",
            ts(&format!("2025-06-01 {minute}")),
            &[ColumnValue::new("A", a), ColumnValue::new("B", None)],
        )
        .await
        .unwrap();
    }

    let rows = db
        .read_rows("CMDG1", &cols, &window("2025-06-01 00:01", "2025-06-01 00:02"))
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].timestamp, ts("2025-06-01 00:01"));
    assert_eq!(rows[0].get("A"), None);
    assert_eq!(rows[1].get("A"), Some(3.0));
    assert_eq!(rows[1].get("B"), None);
    assert_eq!(rows[1].get("not_a_column"), None);
}

#[tokio::test]
async fn test_from_path_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dest.duckdb");
    {
        let db = DuckDbBackend::from_path(&path).unwrap();
        db.create_table_if_missing("CMDG1", &["A".to_string()])
            .await
            .unwrap();
    }
    let db = DuckDbBackend::new(path.to_str().unwrap()).unwrap();
    assert!(db.relation_exists("CMDG1").await.unwrap());
}
