use crate::analyzer::extractor::has_wildcard_select;
use crate::generator::rewriter::{rewrite, RefusalReason, RewriteConfig, RewriteOutcome};
use crate::model::catalog::Catalog;
use crate::model::label::GoldLabel;
use crate::model::policy::{PolicyMap, Violation};
use crate::model::query::Query;

/// Terminal state of the accept/refuse decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The query cannot be answered under the policy.
    Refused(RefusalReason),
    /// No violations: the original text is the answer.
    Passthrough(String),
    /// Violations were repaired by the rewrite engine.
    Rewritten(String),
}

impl Decision {
    /// The gold label this decision produces.
    pub fn label(&self) -> GoldLabel {
        match self {
            Decision::Refused(_) => GoldLabel::Refuse,
            Decision::Passthrough(sql) | Decision::Rewritten(sql) => GoldLabel::Sql(sql.clone()),
        }
    }

    /// Refusal reason, when refused.
    pub fn refusal_reason(&self) -> Option<&RefusalReason> {
        match self {
            Decision::Refused(reason) => Some(reason),
            _ => None,
        }
    }
}

impl From<Decision> for GoldLabel {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Refused(_) => GoldLabel::Refuse,
            Decision::Passthrough(sql) | Decision::Rewritten(sql) => GoldLabel::Sql(sql),
        }
    }
}

/// Decide the gold label of a query.
///
/// A bare top-level `*` is refused before violations are consulted. Without
/// violations the original text passes through; otherwise the rewrite engine
/// decides.
pub fn decide(
    sql: &str,
    query: &Query,
    violations: &[Violation],
    catalog: &Catalog,
    policies: &PolicyMap,
    config: &RewriteConfig,
) -> Decision {
    if has_wildcard_select(query) {
        return Decision::Refused(RefusalReason::WildcardSelect);
    }
    if violations.is_empty() {
        return Decision::Passthrough(sql.to_string());
    }
    match rewrite(sql, violations, catalog, policies, config) {
        RewriteOutcome::Success(text) => Decision::Rewritten(text),
        RewriteOutcome::Failure(reason) => Decision::Refused(reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::catalog::{ColumnId, TableId};
    use crate::model::query::{SelectItem, SelectList, TableUnit};

    fn catalog() -> Catalog {
        Catalog::builder("db").table("users", &["name"]).build()
    }

    fn select(item: SelectItem) -> Query {
        Query::simple(
            SelectList {
                distinct: false,
                items: vec![item],
            },
            vec![TableUnit::Base(TableId(0))],
        )
    }

    #[test]
    fn wildcard_is_refused_even_without_violations() {
        let decision = decide(
            "SELECT * FROM users",
            &select(SelectItem::column(ColumnId::WILDCARD)),
            &[],
            &catalog(),
            &PolicyMap::new(),
            &RewriteConfig::default(),
        );
        assert_eq!(decision, Decision::Refused(RefusalReason::WildcardSelect));
        assert!(decision.label().is_refuse());
    }

    #[test]
    fn compliant_query_passes_through() {
        let decision = decide(
            "SELECT name FROM users",
            &select(SelectItem::column(ColumnId(1))),
            &[],
            &catalog(),
            &PolicyMap::new(),
            &RewriteConfig::default(),
        );
        assert_eq!(
            GoldLabel::from(decision),
            GoldLabel::Sql("SELECT name FROM users".to_string())
        );
    }
}
