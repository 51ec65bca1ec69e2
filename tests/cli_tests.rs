mod support;

use std::process::Command;

use sqlpolicy::output::record::DatasetRecord;
use support::fixture_dir;

fn spider_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("should create temp dir");
    for file in ["tables.json", "examples.json"] {
        std::fs::copy(fixture_dir("concert_singer").join(file), dir.path().join(file))
            .unwrap_or_else(|e| panic!("failed to copy fixture {file}: {e}"));
    }
    dir
}

#[test]
fn cli_writes_dataset_policies_and_report() {
    let spider = spider_dir();
    let output = tempfile::tempdir().expect("should create output dir");

    let status = Command::new(env!("CARGO_BIN_EXE_sqlpolicy"))
        .arg("--spider-dir")
        .arg(spider.path())
        .arg("--split")
        .arg("dev=examples.json")
        .arg("--output-dir")
        .arg(output.path())
        .status()
        .expect("should run sqlpolicy binary");

    // The fixture is deliberately skewed, so QA warnings set exit code 1.
    assert_eq!(
        status.code(),
        Some(1),
        "expected exit code 1 for QA warnings, got {status:?}"
    );

    let dataset = std::fs::read_to_string(output.path().join("dev.json"))
        .expect("dataset file should exist");
    let records: Vec<DatasetRecord> =
        serde_json::from_str(&dataset).expect("dataset should deserialize");
    assert_eq!(records.len(), 10);

    let policies = std::fs::read_to_string(output.path().join("policies/concert_singer.json"))
        .expect("policy file should exist");
    assert!(policies.contains("\"singer.Email\": \"Hidden\""), "{policies}");

    let report = std::fs::read_to_string(output.path().join("qa_report.md"))
        .expect("markdown report should exist");
    assert!(report.contains("## Split `dev`"), "{report}");
    assert!(output.path().join("qa_report.json").exists());
}

#[test]
fn cli_overrides_change_written_policies() {
    let spider = spider_dir();
    let output = tempfile::tempdir().expect("should create output dir");
    let overrides = spider.path().join("overrides.json");
    std::fs::write(
        &overrides,
        r#"[{"db_id": "concert_singer", "table": "singer", "column": "Email", "final_policy": "Public"}]"#,
    )
    .expect("should write overrides");

    Command::new(env!("CARGO_BIN_EXE_sqlpolicy"))
        .arg("--spider-dir")
        .arg(spider.path())
        .arg("--split")
        .arg("dev=examples.json")
        .arg("--overrides")
        .arg(&overrides)
        .arg("--output-dir")
        .arg(output.path())
        .status()
        .expect("should run sqlpolicy binary");

    let dataset = std::fs::read_to_string(output.path().join("dev.json"))
        .expect("dataset file should exist");
    let records: Vec<DatasetRecord> =
        serde_json::from_str(&dataset).expect("dataset should deserialize");
    assert!(records[1].violations_original.is_empty());
    assert_eq!(records[1].gold_label.sql(), Some("SELECT Email FROM singer"));
}

#[test]
fn cli_missing_schema_exits_with_code_2() {
    let output = tempfile::tempdir().expect("should create output dir");

    let result = Command::new(env!("CARGO_BIN_EXE_sqlpolicy"))
        .arg("--spider-dir")
        .arg(output.path().join("missing"))
        .arg("--output-dir")
        .arg(output.path())
        .output()
        .expect("should run sqlpolicy binary");

    assert_eq!(result.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("Error loading schemas"), "{stderr}");
}

#[test]
fn cli_rejects_malformed_split_arguments() {
    let result = Command::new(env!("CARGO_BIN_EXE_sqlpolicy"))
        .arg("--split")
        .arg("dev")
        .output()
        .expect("should run sqlpolicy binary");

    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("expected NAME=FILE"), "{stderr}");
}
