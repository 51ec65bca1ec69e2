//! Per-database contexts and per-record processing.
//!
//! Each database's catalog and policy map are built once and shared read-only
//! across the records that reference it; records are processed independently.

use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::analyzer::extractor::extract_references;
use crate::analyzer::violations::detect_violations;
use crate::classifier::overrides::{apply_overrides, PolicyOverride};
use crate::classifier::policy_classifier::classify_catalog;
use crate::classifier::rules::RuleSet;
use crate::error::{AuditError, Result};
use crate::generator::gold::{decide, Decision};
use crate::generator::mutation::generate_negative;
use crate::generator::rewriter::RewriteConfig;
use crate::model::catalog::Catalog;
use crate::model::label::GoldLabel;
use crate::model::policy::PolicyMap;
use crate::output::record::DatasetRecord;
use crate::parser::spider::{decode_query, SpiderExample};

/// Read-only state shared by every query against one database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseContext {
    /// Database identifier.
    pub db_id: String,
    /// Table and column registry.
    pub catalog: Catalog,
    /// Classified and overridden column policies.
    pub policies: PolicyMap,
}

impl DatabaseContext {
    /// Classify `catalog` with `rules` and apply the overrides for its database.
    pub fn new(catalog: Catalog, rules: &RuleSet, overrides: &[PolicyOverride]) -> Self {
        let db_id = catalog.db_id().to_string();
        let mut policies = classify_catalog(&catalog, rules);
        let applied = apply_overrides(&mut policies, overrides, &db_id);
        debug!(db_id = %db_id, columns = policies.len(), overrides = applied, "classified database");
        Self {
            db_id,
            catalog,
            policies,
        }
    }
}

/// Shared contexts keyed by database id.
pub type Contexts = BTreeMap<String, Arc<DatabaseContext>>;

/// Build one context per catalog.
pub fn build_contexts(
    catalogs: BTreeMap<String, Catalog>,
    rules: &RuleSet,
    overrides: &[PolicyOverride],
) -> Contexts {
    catalogs
        .into_iter()
        .map(|(db_id, catalog)| {
            let context = DatabaseContext::new(catalog, rules, overrides);
            (db_id, Arc::new(context))
        })
        .collect()
}

/// Label a single example.
///
/// A query dict that cannot be decoded, or that names a column outside the
/// catalog, yields a `REFUSE` record with no violations and no negatives.
/// Negatives are generated only for queries that pass through unchanged.
pub fn process_example(
    id: String,
    example: &SpiderExample,
    context: &DatabaseContext,
    config: &RewriteConfig,
) -> DatasetRecord {
    let mut record = DatasetRecord {
        id,
        db_id: example.db_id.clone(),
        question: example.question.clone(),
        original_sql: example.query.clone(),
        column_policies: context.policies.clone(),
        violations_original: Vec::new(),
        gold_label: GoldLabel::Refuse,
        negative_examples: Vec::new(),
    };

    let decoded = decode_query(&example.sql).and_then(|query| {
        let references = extract_references(&query, &context.catalog)?;
        Ok((query, references))
    });
    let (query, references) = match decoded {
        Ok(decoded) => decoded,
        Err(err) => {
            warn!(id = %record.id, db_id = %record.db_id, error = %err, "refusing unprocessable query");
            return record;
        }
    };

    let violations = detect_violations(&references, &context.policies);
    let decision = decide(
        &example.query,
        &query,
        &violations,
        &context.catalog,
        &context.policies,
        config,
    );
    if let Some(reason) = decision.refusal_reason() {
        debug!(id = %record.id, %reason, "refused");
    }

    if matches!(decision, Decision::Passthrough(_)) {
        record.negative_examples.extend(generate_negative(
            &example.query,
            &query,
            &context.catalog,
            &context.policies,
        ));
    }
    record.gold_label = decision.into();
    record.violations_original = violations;
    record
}

/// Label every example of a split in parallel, preserving input order.
///
/// Fails when an example names a database without a context.
pub fn process_split(
    split: &str,
    examples: &[SpiderExample],
    contexts: &Contexts,
    config: &RewriteConfig,
) -> Result<Vec<DatasetRecord>> {
    info!(split, examples = examples.len(), "processing split");
    let records = examples
        .par_iter()
        .enumerate()
        .map(|(index, example)| {
            let context =
                contexts
                    .get(&example.db_id)
                    .ok_or_else(|| AuditError::UnknownDatabase {
                        db_id: example.db_id.clone(),
                    })?;
            Ok(process_example(
                DatasetRecord::make_id(split, index),
                example,
                context,
                config,
            ))
        })
        .collect::<Result<Vec<_>>>()?;

    let refused = records.iter().filter(|r| r.gold_label.is_refuse()).count();
    info!(split, records = records.len(), refused, "split processed");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::policy::Policy;
    use serde_json::json;

    fn context() -> DatabaseContext {
        let catalog = Catalog::builder("music")
            .table("singer", &["singer_id", "name", "email"])
            .primary_key("singer", "singer_id")
            .build();
        DatabaseContext::new(catalog, &RuleSet::default(), &[])
    }

    fn example(query: &str, sql: serde_json::Value) -> SpiderExample {
        SpiderExample {
            db_id: "music".to_string(),
            question: "q".to_string(),
            query: query.to_string(),
            sql,
        }
    }

    fn select_column(col: usize) -> serde_json::Value {
        json!({
            "select": [false, [[0, [0, [0, col, false], null]]]],
            "from": {"table_units": [["table_unit", 0]], "conds": []},
            "where": [], "groupBy": [], "having": [], "orderBy": [], "limit": null,
            "intersect": null, "union": null, "except": null
        })
    }

    #[test]
    fn context_applies_overrides_after_classification() {
        let catalog = Catalog::builder("music")
            .table("singer", &["name", "email"])
            .build();
        let overrides = vec![PolicyOverride {
            db_id: "music".to_string(),
            table: "singer".to_string(),
            column: "email".to_string(),
            final_policy: Policy::Public,
        }];
        let context = DatabaseContext::new(catalog, &RuleSet::default(), &overrides);
        assert_eq!(context.policies.policy_of("singer", "email"), Policy::Public);
        assert_eq!(context.policies.policy_of("singer", "name"), Policy::Public);
    }

    #[test]
    fn compliant_query_passes_through_with_a_negative() {
        let record = process_example(
            "dev_00000".to_string(),
            &example("SELECT name FROM singer", select_column(2)),
            &context(),
            &RewriteConfig::default(),
        );
        assert_eq!(
            record.gold_label,
            GoldLabel::Sql("SELECT name FROM singer".to_string())
        );
        assert_eq!(record.negative_examples.len(), 1);
        assert_eq!(record.negative_examples[0].sql, "SELECT email, name FROM singer");
    }

    #[test]
    fn violating_query_gets_no_negative() {
        let record = process_example(
            "dev_00001".to_string(),
            &example("SELECT email FROM singer", select_column(3)),
            &context(),
            &RewriteConfig::default(),
        );
        assert_eq!(record.violations_original.len(), 1);
        assert_eq!(
            record.gold_label,
            GoldLabel::Sql("SELECT singer_id FROM singer".to_string())
        );
        assert!(record.negative_examples.is_empty());
    }

    #[test]
    fn unresolvable_column_is_refused() {
        let record = process_example(
            "dev_00002".to_string(),
            &example("SELECT ghost FROM singer", select_column(99)),
            &context(),
            &RewriteConfig::default(),
        );
        assert!(record.gold_label.is_refuse());
        assert!(record.violations_original.is_empty());
        assert!(record.negative_examples.is_empty());
    }

    #[test]
    fn split_preserves_order_and_rejects_unknown_databases() {
        let mut contexts = Contexts::new();
        contexts.insert("music".to_string(), Arc::new(context()));
        let examples: Vec<_> = (0..20)
            .map(|i| example(&format!("SELECT name FROM singer -- {i}"), select_column(2)))
            .collect();

        let records =
            process_split("train", &examples, &contexts, &RewriteConfig::default()).unwrap();
        assert_eq!(records.len(), 20);
        assert_eq!(records[13].id, "train_00013");
        assert_eq!(records[13].original_sql, "SELECT name FROM singer -- 13");

        let mut stray = example("SELECT 1", select_column(2));
        stray.db_id = "nowhere".to_string();
        let err = process_split("train", &[stray], &contexts, &RewriteConfig::default())
            .expect_err("unknown database should fail");
        assert!(matches!(err, AuditError::UnknownDatabase { .. }));
    }
}
