use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{AuditError, Result};
use crate::model::policy::{qualified_name, Policy, PolicyMap};

/// Manual replacement of one automatically assigned column policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyOverride {
    /// Database the override applies to.
    pub db_id: String,
    /// Table name, catalog spelling.
    pub table: String,
    /// Column name, catalog spelling.
    pub column: String,
    /// Policy that replaces the automatic one.
    pub final_policy: Policy,
}

/// Parse an override list.
pub fn overrides_from_json(json: &str) -> Result<Vec<PolicyOverride>> {
    Ok(serde_json::from_str(json)?)
}

/// Read an override file. A missing file yields no overrides.
pub fn load_overrides(path: &Path) -> Result<Vec<PolicyOverride>> {
    match std::fs::read_to_string(path) {
        Ok(json) => overrides_from_json(&json),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "override file not found; continuing without overrides");
            Ok(Vec::new())
        }
        Err(e) => Err(AuditError::io(path, e)),
    }
}

/// Apply the overrides for `db_id` to an automatically classified map.
///
/// Only columns already present in the map are replaced. Returns the number
/// of entries changed.
pub fn apply_overrides(
    policies: &mut PolicyMap,
    overrides: &[PolicyOverride],
    db_id: &str,
) -> usize {
    let mut applied = 0;
    for entry in overrides.iter().filter(|o| o.db_id == db_id) {
        let key = qualified_name(&entry.table, &entry.column);
        if policies.replace_existing(&key, entry.final_policy) {
            debug!(db_id, column = %key, policy = %entry.final_policy, "applied policy override");
            applied += 1;
        } else {
            warn!(db_id, column = %key, "override names a column that is not in the catalog");
        }
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overrides() -> Vec<PolicyOverride> {
        overrides_from_json(
            r#"[
                {"db_id": "concert_singer", "table": "singer", "column": "Name", "final_policy": "Hidden"},
                {"db_id": "concert_singer", "table": "singer", "column": "Nickname", "final_policy": "Hidden"},
                {"db_id": "other_db", "table": "singer", "column": "Age", "final_policy": "Public"}
            ]"#,
        )
        .expect("overrides should parse")
    }

    #[test]
    fn overrides_replace_only_existing_entries_of_matching_db() {
        let mut policies = PolicyMap::new();
        policies.insert("singer", "Name", Policy::Public);
        policies.insert("singer", "Age", Policy::Hidden);

        let applied = apply_overrides(&mut policies, &overrides(), "concert_singer");

        assert_eq!(applied, 1);
        assert_eq!(policies.get("singer.Name"), Some(Policy::Hidden));
        assert_eq!(policies.get("singer.Nickname"), None);
        assert_eq!(policies.get("singer.Age"), Some(Policy::Hidden));
    }

    #[test]
    fn missing_override_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_overrides(&dir.path().join("absent.json")).unwrap();
        assert!(loaded.is_empty());
    }
}
