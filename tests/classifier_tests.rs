mod support;

use sqlpolicy::classifier::overrides::{apply_overrides, overrides_from_json};
use sqlpolicy::classifier::policy_classifier::classify_catalog;
use sqlpolicy::classifier::rules::RuleSet;
use sqlpolicy::model::policy::Policy;
use sqlpolicy::pipeline::DatabaseContext;
use support::load_fixture_catalog;

#[test]
fn injected_rules_replace_the_builtin_list() {
    let catalog = load_fixture_catalog("concert_singer", "concert_singer");
    let rules = RuleSet::from_json(
        r#"[
            {"policy": "Hidden", "matcher": {"exact": "name"}},
            {"policy": "AggOnly", "matcher": {"contains": "capacity"}}
        ]"#,
    )
    .expect("rules should parse");

    let policies = classify_catalog(&catalog, &rules);
    assert_eq!(policies.get("singer.Name"), Some(Policy::Hidden));
    assert_eq!(policies.get("stadium.Name"), Some(Policy::Hidden));
    assert_eq!(policies.get("stadium.Capacity"), Some(Policy::AggOnly));
    // Nothing else matches, so the built-in identifier rule no longer applies.
    assert_eq!(policies.get("singer.Singer_ID"), Some(Policy::Public));
    assert_eq!(policies.get("singer.Email"), Some(Policy::Public));
}

#[test]
fn overrides_apply_per_database_and_only_to_known_columns() {
    let catalog = load_fixture_catalog("concert_singer", "concert_singer");
    let mut policies = classify_catalog(&catalog, &RuleSet::default());
    let before = policies.clone();

    let overrides = overrides_from_json(
        r#"[
            {"db_id": "concert_singer", "table": "singer", "column": "Country", "final_policy": "Hidden"},
            {"db_id": "concert_singer", "table": "singer", "column": "Nickname", "final_policy": "Hidden"},
            {"db_id": "other_db", "table": "singer", "column": "Name", "final_policy": "Hidden"}
        ]"#,
    )
    .expect("overrides should parse");

    assert_eq!(apply_overrides(&mut policies, &overrides, "concert_singer"), 1);
    assert_eq!(policies.get("singer.Country"), Some(Policy::Hidden));
    assert_eq!(policies.get("singer.Nickname"), None);
    assert_eq!(policies.get("singer.Name"), Some(Policy::Public));
    assert_eq!(policies.len(), before.len());
}

#[test]
fn classification_is_idempotent() {
    let catalog = load_fixture_catalog("concert_singer", "concert_singer");
    let first = DatabaseContext::new(catalog.clone(), &RuleSet::default(), &[]);
    let second = DatabaseContext::new(catalog, &RuleSet::default(), &[]);
    assert_eq!(first.policies, second.policies);
}
