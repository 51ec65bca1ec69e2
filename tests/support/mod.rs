#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;

use sqlpolicy::analyzer::extractor::extract_references;
use sqlpolicy::analyzer::violations::detect_violations;
use sqlpolicy::classifier::rules::RuleSet;
use sqlpolicy::generator::gold::{decide, Decision};
use sqlpolicy::generator::rewriter::RewriteConfig;
use sqlpolicy::model::catalog::{load_catalogs, Catalog};
use sqlpolicy::model::policy::{PolicyMap, Violation};
use sqlpolicy::parser::spider::{load_examples, SpiderExample};
use sqlpolicy::parser::sql_parser::parse_query;
use sqlpolicy::pipeline::{build_contexts, Contexts};

pub(crate) fn fixture_dir(fixture: &str) -> PathBuf {
    PathBuf::from("tests/fixtures").join(fixture)
}

pub(crate) fn load_fixture_catalogs(fixture: &str) -> BTreeMap<String, Catalog> {
    load_catalogs(&fixture_dir(fixture).join("tables.json")).expect("fixture schema should load")
}

pub(crate) fn load_fixture_catalog(fixture: &str, db_id: &str) -> Catalog {
    load_fixture_catalogs(fixture)
        .remove(db_id)
        .unwrap_or_else(|| panic!("fixture {fixture} has no database {db_id}"))
}

pub(crate) fn load_fixture_examples(fixture: &str) -> Vec<SpiderExample> {
    load_examples(&fixture_dir(fixture).join("examples.json"))
        .expect("fixture examples should load")
}

pub(crate) fn load_fixture_contexts(fixture: &str) -> Contexts {
    build_contexts(load_fixture_catalogs(fixture), &RuleSet::default(), &[])
}

/// Violations of `sql`, parsed from text against `catalog`.
pub(crate) fn violations_of(sql: &str, catalog: &Catalog, policies: &PolicyMap) -> Vec<Violation> {
    let query = parse_query(sql, catalog)
        .unwrap_or_else(|e| panic!("failed to parse {sql:?}: {e}"));
    let references = extract_references(&query, catalog)
        .unwrap_or_else(|e| panic!("failed to extract references of {sql:?}: {e}"));
    detect_violations(&references, policies)
}

/// Full accept/refuse decision for SQL text.
pub(crate) fn decide_text(sql: &str, catalog: &Catalog, policies: &PolicyMap) -> Decision {
    let query = parse_query(sql, catalog)
        .unwrap_or_else(|e| panic!("failed to parse {sql:?}: {e}"));
    let violations = violations_of(sql, catalog, policies);
    decide(
        sql,
        &query,
        &violations,
        catalog,
        policies,
        &RewriteConfig::default(),
    )
}
