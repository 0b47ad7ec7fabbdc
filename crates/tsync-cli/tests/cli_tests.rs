//! End-to-end tests driving the tsync binary against temporary stores

use std::path::Path;
use std::process::Command;
use tsync_db::DuckDbBackend;

/// Path to the compiled tsync binary
fn tsync_bin() -> String {
    env!("CARGO_BIN_EXE_tsync").to_string()
}

/// Run `tsync` in `project` and return (stdout, stderr, success).
///
/// Store locations come from the environment the way a deployment would
/// supply them.
fn run_tsync(project: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(tsync_bin())
        .arg("--project-dir")
        .arg(project)
        .args(args)
        .env("TSYNC_SOURCE", "hist.duckdb")
        .env("TSYNC_DESTINATION", "wide.duckdb")
        .env_remove("TSYNC_CANONICAL")
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to execute tsync with args {args:?}: {e}"));
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

/// A project with a two-tag registry file and a populated historian.
fn project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("tsync.yml"),
        "name: plant\ncanonical:\n  path: state/canonical.duckdb\ncompare:\n  enabled: true\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("registry.csv"),
        "source_id,column_name,group,node,kind\n101,A,G1,Level 1,numeric\n102,B,G1,Level 1,boolean\n",
    )
    .unwrap();

    let historian = DuckDbBackend::from_path(&dir.path().join("hist.duckdb")).unwrap();
    historian
        .execute_batch(
            r#"CREATE TABLE "HistoricalData" ("ID" VARCHAR, "Value" VARCHAR, "TimeStamp" TIMESTAMP, "Quality" INTEGER);
               INSERT INTO "HistoricalData" VALUES
                 ('101', '10', '2025-06-01 00:00:00', 192),
                 ('101', '20', '2025-06-01 00:02:00', 192),
                 ('102', '1', '2025-06-01 00:00:00', 192);"#,
        )
        .unwrap();
    drop(historian);
    dir
}

#[test]
fn batch_sweep_end_to_end() {
    let dir = project();
    let root = dir.path();

    let (stdout, stderr, ok) = run_tsync(root, &["registry", "import", "registry.csv"]);
    assert!(ok, "registry import failed: {stderr}");
    assert!(stdout.contains("2 new"), "{stdout}");

    let (_, stderr, ok) = run_tsync(
        root,
        &["batch", "start", "--from", "2025-06-01", "--to", "2025-06-01"],
    );
    assert!(ok, "batch start failed: {stderr}");

    let (stdout, stderr, ok) = run_tsync(root, &["batch", "run"]);
    assert!(ok, "batch run failed: {stderr}");
    assert!(stdout.contains("3 rows exported, completed"), "{stdout}");

    let (stdout, stderr, ok) = run_tsync(
        root,
        &["compare", "--from", "2025-06-01 00:00", "--to", "2025-06-01 00:02"],
    );
    assert!(ok, "compare reported mismatches: {stdout}{stderr}");
    assert!(stdout.contains("0 mismatches"), "{stdout}");

    let (stdout, stderr, ok) = run_tsync(root, &["status", "--output", "json"]);
    assert!(ok, "status failed: {stderr}");
    let status: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(status["name"], "plant");
    assert_eq!(status["samples"]["extracted"], 3);
    assert_eq!(status["samples"]["interpolated"], 1);
    assert_eq!(status["cursors"][0]["completed"], true);
    assert_eq!(status["cursors"][0]["exported_rows"], 3);
    assert!(root.join("state/canonical.duckdb").exists());
}

#[test]
fn second_sweep_is_refused_while_first_is_open() {
    let dir = project();
    let root = dir.path();
    run_tsync(root, &["registry", "import", "registry.csv"]);
    let start = ["batch", "start", "--from", "2025-06-01", "--to", "2025-06-02"];

    let (_, _, ok) = run_tsync(root, &start);
    assert!(ok);
    let (_, stderr, ok) = run_tsync(root, &start);
    assert!(!ok);
    assert!(stderr.contains("M008"), "{stderr}");
}

#[test]
fn missing_destination_names_the_variable() {
    let dir = project();
    let output = Command::new(tsync_bin())
        .arg("--project-dir")
        .arg(dir.path())
        .args(["tables", "create"])
        .env_remove("TSYNC_DESTINATION")
        .env_remove("TSYNC_CANONICAL")
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("TSYNC_DESTINATION"), "{stderr}");
}

#[test]
fn cron_init_then_not_due() {
    let dir = project();
    let root = dir.path();
    run_tsync(root, &["registry", "import", "registry.csv"]);

    let (stdout, _, ok) = run_tsync(root, &["cron", "init", "--at", "2025-06-01 00:15:42"]);
    assert!(ok);
    assert!(stdout.contains("2025-06-01 00:15:00"), "{stdout}");

    let (stdout, stderr, ok) = run_tsync(root, &["cron", "run", "--now", "2025-06-01 00:20"]);
    assert!(ok, "{stderr}");
    assert!(stdout.contains("not due until 2025-06-01 00:30:00"), "{stdout}");
}
