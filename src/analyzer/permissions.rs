use crate::model::policy::{AggregateId, Policy, Role};

/// Base permission table. Rows follow [`Policy::ALL`], columns follow [`Role::ALL`].
const PERMISSIONS: [[bool; 4]; 4] = [
    // SelectExpr, JoinCond, WherePred, AggArg
    [true, true, true, true],     // Public
    [false, true, true, false],   // JoinOnly
    [false, false, false, true],  // AggOnly
    [false, false, false, false], // Hidden
];

/// Aggregates an `AggOnly` column may be passed to.
pub const AGG_ONLY_AGGREGATES: [AggregateId; 2] = [AggregateId::Count, AggregateId::Avg];

fn policy_row(policy: Policy) -> usize {
    match policy {
        Policy::Public => 0,
        Policy::JoinOnly => 1,
        Policy::AggOnly => 2,
        Policy::Hidden => 3,
    }
}

fn role_column(role: Role) -> usize {
    match role {
        Role::SelectExpr => 0,
        Role::JoinCond => 1,
        Role::WherePred => 2,
        Role::AggArg => 3,
    }
}

/// Entry of the base table, without the aggregate refinement.
pub fn base_permission(policy: Policy, role: Role) -> bool {
    PERMISSIONS[policy_row(policy)][role_column(role)]
}

/// Whether a reference with `role` and effective aggregate `agg` is allowed under `policy`.
///
/// `AggOnly` columns are only allowed as arguments of `COUNT` or `AVG`.
pub fn is_allowed(policy: Policy, role: Role, agg: AggregateId) -> bool {
    if !base_permission(policy, role) {
        return false;
    }
    match (policy, role) {
        (Policy::AggOnly, Role::AggArg) => AGG_ONLY_AGGREGATES.contains(&agg),
        _ => true,
    }
}
