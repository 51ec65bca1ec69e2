use serde::{Deserialize, Serialize};

use crate::model::label::{GoldLabel, NegativeExample};
use crate::model::policy::{PolicyMap, Violation};

/// One labeled query as written to `<split>.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRecord {
    /// `<split>_<index>` with a five-digit zero-padded index.
    pub id: String,
    /// Owning database.
    pub db_id: String,
    /// Natural-language question.
    pub question: String,
    /// Query text as given.
    pub original_sql: String,
    /// Policy map of the owning database.
    pub column_policies: PolicyMap,
    /// Violations of the original query.
    pub violations_original: Vec<Violation>,
    /// Compliant SQL or refusal.
    pub gold_label: GoldLabel,
    /// Zero or one known-violating variant.
    pub negative_examples: Vec<NegativeExample>,
}

impl DatasetRecord {
    /// Record id for the `index`-th example of `split`.
    pub fn make_id(split: &str, index: usize) -> String {
        format!("{split}_{index:05}")
    }

    /// True when the original query violates at least one policy.
    pub fn has_violations(&self) -> bool {
        !self.violations_original.is_empty()
    }
}
