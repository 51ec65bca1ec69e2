use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use tracing::info;

use crate::error::{AuditError, Result};
use crate::model::policy::PolicyMap;
use crate::output::record::DatasetRecord;
use crate::output::report::QaReport;

/// Write the records of `split` to `<output_dir>/<split>.json`.
pub fn write_dataset(output_dir: &Path, split: &str, records: &[DatasetRecord]) -> Result<PathBuf> {
    validate_output_name(split)?;
    let path = output_dir.join(format!("{split}.json"));
    write_json(&path, records)?;
    info!(path = %path.display(), records = records.len(), "wrote dataset");
    Ok(path)
}

#[derive(Serialize)]
struct PolicyFile<'a> {
    db_id: &'a str,
    policies: &'a PolicyMap,
}

/// Write one `<output_dir>/policies/<db_id>.json` file per database.
///
/// Returns the number of files written.
pub fn write_policies<'a>(
    output_dir: &Path,
    databases: impl IntoIterator<Item = (&'a str, &'a PolicyMap)>,
) -> Result<usize> {
    let dir = output_dir.join("policies");
    let mut written = 0;
    for (db_id, policies) in databases {
        validate_output_name(db_id)?;
        write_json(
            &dir.join(format!("{db_id}.json")),
            &PolicyFile { db_id, policies },
        )?;
        written += 1;
    }
    info!(dir = %dir.display(), databases = written, "wrote policy files");
    Ok(written)
}

/// Write `qa_report.json` and the Markdown `qa_report.md`.
pub fn write_qa_reports(output_dir: &Path, reports: &[QaReport], markdown: &str) -> Result<()> {
    write_json(&output_dir.join("qa_report.json"), reports)?;
    let md_path = output_dir.join("qa_report.md");
    std::fs::write(&md_path, markdown).map_err(|e| AuditError::io(&md_path, e))?;
    info!(path = %md_path.display(), "wrote QA report");
    Ok(())
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| AuditError::io(parent, e))?;
    }
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    std::fs::write(path, json).map_err(|e| AuditError::io(path, e))
}

/// Reject names that would place a file outside the output directory.
fn validate_output_name(name: &str) -> Result<()> {
    let invalid = |reason| {
        Err(AuditError::InvalidOutputName {
            name: name.to_string(),
            reason,
        })
    };
    if name.trim().is_empty() {
        return invalid("must not be empty");
    }
    let candidate = Path::new(name);
    if candidate.is_absolute() {
        return invalid("absolute paths are not allowed");
    }
    if candidate.components().any(|component| {
        matches!(
            component,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    }) {
        return invalid("traversal segments are not allowed");
    }
    if name.contains('/') || name.contains('\\') {
        return invalid("path separators are not allowed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::label::GoldLabel;
    use crate::model::policy::Policy;

    fn record() -> DatasetRecord {
        DatasetRecord {
            id: DatasetRecord::make_id("dev", 0),
            db_id: "shop".to_string(),
            question: "Names?".to_string(),
            original_sql: "SELECT name FROM users".to_string(),
            column_policies: PolicyMap::new(),
            violations_original: Vec::new(),
            gold_label: GoldLabel::Sql("SELECT name FROM users".to_string()),
            negative_examples: Vec::new(),
        }
    }

    #[test]
    fn write_dataset_reports_directory_creation_errors() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let err = write_dataset(&blocker, "dev", &[record()])
            .expect_err("directory creation should fail");
        assert!(matches!(err, AuditError::Io { .. }));
    }

    #[test]
    fn unsafe_names_are_rejected() {
        let dir = tempfile::tempdir().unwrap();

        for name in ["nested/dev", "../escape", "", "/abs"] {
            let err = write_dataset(dir.path(), name, &[])
                .expect_err("unsafe output name should fail validation");
            assert!(err.to_string().contains("Invalid output name"), "{err}");
        }

        let policies = PolicyMap::new();
        let err = write_policies(dir.path(), [("../db", &policies)])
            .expect_err("database ids are validated too");
        assert!(matches!(err, AuditError::InvalidOutputName { .. }));
    }

    #[test]
    fn dataset_and_policies_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_dataset(dir.path(), "dev", &[record()]).unwrap();
        assert_eq!(path, dir.path().join("dev.json"));

        let text = std::fs::read_to_string(&path).unwrap();
        let back: Vec<DatasetRecord> = serde_json::from_str(&text).unwrap();
        assert_eq!(back, vec![record()]);

        let mut policies = PolicyMap::new();
        policies.insert("users", "email", Policy::Hidden);
        assert_eq!(write_policies(dir.path(), [("shop", &policies)]).unwrap(), 1);
        let text = std::fs::read_to_string(dir.path().join("policies/shop.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["db_id"], "shop");
        assert_eq!(value["policies"]["users.email"], "Hidden");
    }

    #[test]
    fn qa_reports_are_written_as_json_and_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let reports = vec![crate::output::report::run_qa_check(&[], "dev")];
        write_qa_reports(dir.path(), &reports, "# report\n").unwrap();

        let json = std::fs::read_to_string(dir.path().join("qa_report.json")).unwrap();
        let back: Vec<QaReport> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, reports);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("qa_report.md")).unwrap(),
            "# report\n"
        );
    }
}
