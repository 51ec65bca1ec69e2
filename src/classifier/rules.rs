use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{AuditError, Result};
use crate::model::policy::Policy;

/// How a rule matches a column name. All matching is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameMatcher {
    /// The whole name equals the pattern.
    Exact(String),
    /// The name starts with the pattern.
    Prefix(String),
    /// The name ends with the pattern.
    Suffix(String),
    /// The pattern occurs anywhere in the name.
    Contains(String),
}

impl NameMatcher {
    /// Test a column name against this matcher.
    pub fn matches(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        match self {
            NameMatcher::Exact(p) => name == p.to_ascii_lowercase(),
            NameMatcher::Prefix(p) => name.starts_with(&p.to_ascii_lowercase()),
            NameMatcher::Suffix(p) => name.ends_with(&p.to_ascii_lowercase()),
            NameMatcher::Contains(p) => name.contains(&p.to_ascii_lowercase()),
        }
    }
}

/// One `(matcher, outcome)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    /// Policy assigned when the matcher fires.
    pub policy: Policy,
    /// Name test.
    pub matcher: NameMatcher,
}

impl PolicyRule {
    fn new(policy: Policy, matcher: NameMatcher) -> Self {
        Self { policy, matcher }
    }
}

/// Ordered rule list. The first matching rule decides; no match means `Public`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet {
    rules: Vec<PolicyRule>,
}

impl RuleSet {
    /// Build a rule set from rules in priority order.
    pub fn new(rules: Vec<PolicyRule>) -> Self {
        Self { rules }
    }

    /// Parse a JSON array of `{"policy": ..., "matcher": {"suffix": "_id"}}` entries.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read rules from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| AuditError::io(path, e))?;
        Self::from_json(&json)
    }

    /// Rules in priority order.
    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }

    /// First rule matching `name`, if any.
    pub fn first_match(&self, name: &str) -> Option<&PolicyRule> {
        self.rules.iter().find(|rule| rule.matcher.matches(name))
    }
}

impl Default for RuleSet {
    /// Identifier/code columns first, then personal attributes, then monetary and score columns.
    fn default() -> Self {
        use NameMatcher::{Contains, Exact, Prefix, Suffix};

        let mut rules = vec![
            PolicyRule::new(Policy::JoinOnly, Exact("id".into())),
            PolicyRule::new(Policy::JoinOnly, Suffix("_id".into())),
            PolicyRule::new(Policy::JoinOnly, Prefix("id_".into())),
            PolicyRule::new(Policy::JoinOnly, Suffix("_code".into())),
            PolicyRule::new(Policy::JoinOnly, Exact("stuid".into())),
        ];
        for term in [
            "email",
            "phone",
            "address",
            "gender",
            "nationality",
            "birth",
            "ssn",
            "password",
        ] {
            rules.push(PolicyRule::new(Policy::Hidden, Contains(term.into())));
        }
        // Short words collide with unrelated names as substrings ("message", "usage").
        for word in ["sex", "weight", "height", "age"] {
            rules.push(PolicyRule::new(Policy::Hidden, Exact(word.into())));
        }
        for term in [
            "salary", "income", "price", "amount", "cost", "budget", "balance", "revenue",
            "profit", "score", "rating",
        ] {
            rules.push(PolicyRule::new(Policy::AggOnly, Contains(term.into())));
        }
        rules.push(PolicyRule::new(Policy::AggOnly, Exact("total".into())));

        Self { rules }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matchers_are_case_insensitive() {
        assert!(NameMatcher::Suffix("_id".into()).matches("Singer_ID"));
        assert!(NameMatcher::Contains("email".into()).matches("Contact_Email_Address"));
        assert!(NameMatcher::Exact("age".into()).matches("AGE"));
        assert!(!NameMatcher::Exact("age".into()).matches("usage"));
        assert!(NameMatcher::Prefix("id_".into()).matches("ID_card"));
    }

    #[test]
    fn default_rules_keep_priority_order() {
        let rules = RuleSet::default();
        assert_eq!(rules.rules()[0].policy, Policy::JoinOnly);
        assert_eq!(rules.rules().last().map(|r| r.policy), Some(Policy::AggOnly));
        // `_id` wins over `price` because identifier rules come first.
        assert_eq!(
            rules.first_match("price_id").map(|r| r.policy),
            Some(Policy::JoinOnly)
        );
    }

    #[test]
    fn rules_load_from_json() {
        let rules = RuleSet::from_json(
            r#"[
                {"policy": "Hidden", "matcher": {"contains": "secret"}},
                {"policy": "AggOnly", "matcher": {"exact": "points"}}
            ]"#,
        )
        .expect("rules should parse");
        assert_eq!(rules.rules().len(), 2);
        assert_eq!(
            rules.first_match("TopSecret").map(|r| r.policy),
            Some(Policy::Hidden)
        );
        assert!(RuleSet::from_json(r#"[{"policy": "Secret", "matcher": {"exact": "x"}}]"#).is_err());
    }
}
