use crate::classifier::rules::RuleSet;
use crate::model::catalog::Catalog;
use crate::model::policy::{Policy, PolicyMap};

/// Classify a single column name: first matching rule wins, `Public` otherwise.
pub fn classify_column(name: &str, rules: &RuleSet) -> Policy {
    rules
        .first_match(name)
        .map_or(Policy::Public, |rule| rule.policy)
}

/// Assign a policy to every declared column of the catalog, keyed by `table.column`.
pub fn classify_catalog(catalog: &Catalog, rules: &RuleSet) -> PolicyMap {
    let mut policies = PolicyMap::new();
    for (_, column) in catalog.all_columns() {
        let Some(table) = column.table else {
            continue;
        };
        let Ok(table_name) = catalog.table_name(table) else {
            continue;
        };
        policies.insert(table_name, &column.name, classify_column(&column.name, rules));
    }
    policies
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rules_follow_priority() {
        let rules = RuleSet::default();
        assert_eq!(classify_column("Singer_ID", &rules), Policy::JoinOnly);
        assert_eq!(classify_column("id", &rules), Policy::JoinOnly);
        assert_eq!(classify_column("country_code", &rules), Policy::JoinOnly);
        assert_eq!(classify_column("StuID", &rules), Policy::JoinOnly);
        assert_eq!(classify_column("Email", &rules), Policy::Hidden);
        assert_eq!(classify_column("Date_of_Birth", &rules), Policy::Hidden);
        assert_eq!(classify_column("Age", &rules), Policy::Hidden);
        assert_eq!(classify_column("Salary", &rules), Policy::AggOnly);
        assert_eq!(classify_column("total", &rules), Policy::AggOnly);
        assert_eq!(classify_column("Name", &rules), Policy::Public);
        // Exact-only words do not leak into longer names.
        assert_eq!(classify_column("Page_Count", &rules), Policy::Public);
        assert_eq!(classify_column("Total_Passengers", &rules), Policy::Public);
    }

    #[test]
    fn classify_catalog_covers_every_declared_column() {
        let catalog = Catalog::builder("db")
            .table("singer", &["Singer_ID", "Name", "Email"])
            .table("concert", &["concert_ID", "Budget"])
            .build();

        let policies = classify_catalog(&catalog, &RuleSet::default());
        assert_eq!(policies.len(), 5);
        assert_eq!(policies.get("singer.Singer_ID"), Some(Policy::JoinOnly));
        assert_eq!(policies.get("singer.Name"), Some(Policy::Public));
        assert_eq!(policies.get("singer.Email"), Some(Policy::Hidden));
        assert_eq!(policies.get("concert.Budget"), Some(Policy::AggOnly));
        assert_eq!(policies.get("*.*"), None);
    }
}
