use serde::{Deserialize, Serialize};

use crate::model::policy::Violation;

/// Target output for a query: compliant SQL text or a refusal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoldLabel {
    /// Compliant SQL (original or rewritten).
    Sql(String),
    /// The query cannot be answered under the policy.
    Refuse,
}

impl GoldLabel {
    /// `"SQL"` or `"REFUSE"`.
    pub fn kind(&self) -> &'static str {
        match self {
            GoldLabel::Sql(_) => "SQL",
            GoldLabel::Refuse => "REFUSE",
        }
    }

    /// SQL text when the label is not a refusal.
    pub fn sql(&self) -> Option<&str> {
        match self {
            GoldLabel::Sql(sql) => Some(sql),
            GoldLabel::Refuse => None,
        }
    }

    /// True for [`GoldLabel::Refuse`].
    pub fn is_refuse(&self) -> bool {
        matches!(self, GoldLabel::Refuse)
    }
}

#[derive(Serialize, Deserialize)]
struct GoldLabelRepr {
    #[serde(rename = "type")]
    kind: String,
    sql: Option<String>,
}

impl Serialize for GoldLabel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        GoldLabelRepr {
            kind: self.kind().to_string(),
            sql: self.sql().map(str::to_string),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for GoldLabel {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = GoldLabelRepr::deserialize(deserializer)?;
        match (repr.kind.as_str(), repr.sql) {
            ("SQL", Some(sql)) => Ok(GoldLabel::Sql(sql)),
            ("REFUSE", _) => Ok(GoldLabel::Refuse),
            (kind, _) => Err(serde::de::Error::custom(format!(
                "Invalid gold label type '{kind}' or missing sql"
            ))),
        }
    }
}

/// A deliberately violating variant of a compliant query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegativeExample {
    /// Mutated SQL text.
    pub sql: String,
    /// Violations the mutation introduces. Never empty.
    pub violations: Vec<Violation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gold_label_serializes_as_type_and_sql() {
        let sql = GoldLabel::Sql("SELECT name FROM singer".to_string());
        assert_eq!(
            serde_json::to_string(&sql).unwrap(),
            r#"{"type":"SQL","sql":"SELECT name FROM singer"}"#
        );
        assert_eq!(
            serde_json::to_string(&GoldLabel::Refuse).unwrap(),
            r#"{"type":"REFUSE","sql":null}"#
        );
    }

    #[test]
    fn gold_label_deserialization_rejects_sql_without_text() {
        let parsed: GoldLabel = serde_json::from_str(r#"{"type":"REFUSE","sql":null}"#).unwrap();
        assert!(parsed.is_refuse());
        assert!(serde_json::from_str::<GoldLabel>(r#"{"type":"SQL","sql":null}"#).is_err());
    }
}
