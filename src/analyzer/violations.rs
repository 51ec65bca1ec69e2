use crate::analyzer::permissions::is_allowed;
use crate::model::policy::{ColumnRef, PolicyMap, Violation};

/// Evaluate one reference. Columns missing from the map are `Public`.
pub fn check_reference(reference: &ColumnRef, policies: &PolicyMap) -> Option<Violation> {
    let column = reference.qualified_name();
    let policy = policies.policy_of_qualified(&column);
    if is_allowed(policy, reference.role, reference.agg) {
        return None;
    }
    Some(Violation {
        column,
        role: reference.role,
        policy,
        agg_id: reference.agg,
    })
}

/// Every disallowed reference, in extraction order. Duplicates are evaluated independently.
pub fn detect_violations(references: &[ColumnRef], policies: &PolicyMap) -> Vec<Violation> {
    references
        .iter()
        .filter_map(|reference| check_reference(reference, policies))
        .collect()
}
