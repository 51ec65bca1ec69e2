//! Bounded rewrite of violating queries.
//!
//! Guards refuse violations no rewrite can repair. Remaining select-list
//! violations are then repaired by name substitution (`Hidden`, `JoinOnly`)
//! or `AVG(...)` wrapping (`AggOnly`), for at most [`RewriteConfig::max_passes`]
//! passes. The rewritten text is parsed and checked again before it is
//! accepted; only select-list uses of the substitutes themselves may still
//! violate.

use std::fmt;
use tracing::debug;

use crate::analyzer::extractor::extract_references;
use crate::analyzer::permissions::AGG_ONLY_AGGREGATES;
use crate::analyzer::violations::detect_violations;
use crate::error::AuditError;
use crate::generator::text::{replace_word, wrap_with_avg};
use crate::model::catalog::{Catalog, CatalogColumn, ColumnId};
use crate::model::policy::{qualified_name, AggregateId, Policy, PolicyMap, Role, Violation};
use crate::parser::sql_parser::parse_query;

/// Rewrite engine parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewriteConfig {
    /// Upper bound on substitution passes.
    pub max_passes: usize,
    /// Policy a same-table substitute column must carry.
    pub substitute_policy: Policy,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            max_passes: 2,
            substitute_policy: Policy::JoinOnly,
        }
    }
}

/// Why a query was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefusalReason {
    /// The top-level select list projects a bare `*`.
    WildcardSelect,
    /// A `Hidden` or `AggOnly` column is used in a join or where predicate.
    ForbiddenPredicate {
        /// Qualified column.
        column: String,
        /// Its policy.
        policy: Policy,
        /// The predicate role.
        role: Role,
    },
    /// An `AggOnly` column is passed to an aggregate other than `COUNT` / `AVG`.
    IllegalAggregate {
        /// Qualified column.
        column: String,
        /// The offending aggregate.
        agg: AggregateId,
    },
    /// Only aggregate-argument violations remain; none can be rewritten.
    AggregateArgumentsOnly,
    /// No distinct same-table substitute exists for a select-list column.
    NoRewriteCandidate {
        /// Qualified column.
        column: String,
    },
    /// Violations remained after every pass.
    RewriteLimitExceeded,
    /// The rewritten text does not parse or still violates the policy.
    RewriteRejected(String),
    /// The query could not be decoded or resolved.
    InvalidQuery(String),
}

impl fmt::Display for RefusalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefusalReason::WildcardSelect => write!(f, "bare * in select list"),
            RefusalReason::ForbiddenPredicate {
                column,
                policy,
                role,
            } => write!(f, "{policy} column in {role}: {column}"),
            RefusalReason::IllegalAggregate { column, agg } => write!(
                f,
                "AggOnly column with non-AVG/COUNT aggregate {}: {column}",
                agg.function_name().unwrap_or("none")
            ),
            RefusalReason::AggregateArgumentsOnly => {
                write!(f, "violations only in aggregate arguments")
            }
            RefusalReason::NoRewriteCandidate { column } => {
                write!(f, "no rewrite candidate for {column}")
            }
            RefusalReason::RewriteLimitExceeded => write!(f, "rewrite limit exceeded"),
            RefusalReason::RewriteRejected(message) => {
                write!(f, "rewritten query rejected: {message}")
            }
            RefusalReason::InvalidQuery(message) => write!(f, "invalid query: {message}"),
        }
    }
}

/// Result of a rewrite attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteOutcome {
    /// Compliant text (the original when there was nothing to rewrite).
    Success(String),
    /// The query cannot be made compliant.
    Failure(RefusalReason),
}

impl RewriteOutcome {
    /// True for [`RewriteOutcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, RewriteOutcome::Success(_))
    }

    /// Rewritten text on success.
    pub fn sql(&self) -> Option<&str> {
        match self {
            RewriteOutcome::Success(sql) => Some(sql),
            RewriteOutcome::Failure(_) => None,
        }
    }
}

/// Try to bring `sql` into compliance with `policies`.
///
/// The input text is never modified in place; a successful outcome carries
/// a new string.
pub fn rewrite(
    sql: &str,
    violations: &[Violation],
    catalog: &Catalog,
    policies: &PolicyMap,
    config: &RewriteConfig,
) -> RewriteOutcome {
    if let Some(reason) = guard(violations) {
        debug!(%reason, "rewrite refused by guard");
        return RewriteOutcome::Failure(reason);
    }
    if violations.is_empty() {
        return RewriteOutcome::Success(sql.to_string());
    }
    if !violations.iter().any(|v| v.role == Role::SelectExpr) {
        return RewriteOutcome::Failure(RefusalReason::AggregateArgumentsOnly);
    }

    let mut text = sql.to_string();
    let mut remaining: Vec<&Violation> = violations.iter().collect();
    let mut missing_candidate: Option<&Violation> = None;
    let mut substitutes: Vec<String> = Vec::new();
    let mut wrapped: Vec<&str> = Vec::new();

    for pass in 1..=config.max_passes {
        let mut next = Vec::with_capacity(remaining.len());
        for violation in remaining {
            if violation.role != Role::SelectExpr {
                next.push(violation);
                continue;
            }
            match violation.policy {
                Policy::Hidden | Policy::JoinOnly => {
                    match find_substitute(violation, catalog, policies, config) {
                        Some(substitute) => {
                            text = replace_word(&text, violation.bare_column(), &substitute);
                            substitutes.push(qualified_name(violation.table(), &substitute));
                        }
                        None => {
                            missing_candidate.get_or_insert(violation);
                            next.push(violation);
                        }
                    }
                }
                Policy::AggOnly => match wrap_with_avg(&text, violation.bare_column()) {
                    Some(rewritten) => {
                        text = rewritten;
                        wrapped.push(&violation.column);
                    }
                    // Duplicate references are covered by the first wrap.
                    None if wrapped.contains(&violation.column.as_str()) => {}
                    None => next.push(violation),
                },
                Policy::Public => {}
            }
        }
        remaining = next;
        debug!(pass, remaining = remaining.len(), "rewrite pass finished");
        if remaining.is_empty() {
            return match recheck(&text, &substitutes, catalog, policies) {
                Ok(()) => RewriteOutcome::Success(text),
                Err(reason) => {
                    debug!(%reason, "rewrite failed");
                    RewriteOutcome::Failure(reason)
                }
            };
        }
    }

    let reason = match missing_candidate {
        Some(violation) => RefusalReason::NoRewriteCandidate {
            column: violation.column.clone(),
        },
        None => RefusalReason::RewriteLimitExceeded,
    };
    debug!(%reason, "rewrite failed");
    RewriteOutcome::Failure(reason)
}

/// Refusals that are decided before any text is touched.
fn guard(violations: &[Violation]) -> Option<RefusalReason> {
    if let Some(v) = violations.iter().find(|v| {
        matches!(v.role, Role::JoinCond | Role::WherePred)
            && matches!(v.policy, Policy::Hidden | Policy::AggOnly)
    }) {
        return Some(RefusalReason::ForbiddenPredicate {
            column: v.column.clone(),
            policy: v.policy,
            role: v.role,
        });
    }

    violations
        .iter()
        .find(|v| {
            v.role == Role::AggArg
                && v.policy == Policy::AggOnly
                && !AGG_ONLY_AGGREGATES.contains(&v.agg_id)
        })
        .map(|v| RefusalReason::IllegalAggregate {
            column: v.column.clone(),
            agg: v.agg_id,
        })
}

/// Parse `text` again and make sure nothing but select-list uses of
/// `substitutes` violates.
fn recheck(
    text: &str,
    substitutes: &[String],
    catalog: &Catalog,
    policies: &PolicyMap,
) -> Result<(), RefusalReason> {
    let rejected = |err: AuditError| RefusalReason::RewriteRejected(err.to_string());
    let query = parse_query(text, catalog).map_err(rejected)?;
    let references = extract_references(&query, catalog).map_err(rejected)?;
    match detect_violations(&references, policies)
        .into_iter()
        .find(|v| v.role != Role::SelectExpr || !substitutes.contains(&v.column))
    {
        Some(v) => Err(RefusalReason::RewriteRejected(format!(
            "{} still used in {}",
            v.column, v.role
        ))),
        None => Ok(()),
    }
}

/// Bare name of the preferred same-table substitute for a violating column.
///
/// Candidates carry [`RewriteConfig::substitute_policy`] and differ from the
/// violating column; primary keys win, then lexical order of the qualified name.
fn find_substitute(
    violation: &Violation,
    catalog: &Catalog,
    policies: &PolicyMap,
    config: &RewriteConfig,
) -> Option<String> {
    let table = catalog.table_id(violation.table())?;
    let table_name = catalog.table_name(table).ok()?;

    let mut candidates: Vec<(ColumnId, &CatalogColumn)> = catalog
        .columns_of(table)
        .filter(|(_, column)| !column.name.eq_ignore_ascii_case(violation.bare_column()))
        .filter(|(_, column)| {
            policies.policy_of(table_name, &column.name) == config.substitute_policy
        })
        .collect();
    candidates.sort_by_key(|(id, column)| {
        (
            !catalog.is_primary_key(*id),
            qualified_name(table_name, &column.name),
        )
    });
    candidates.first().map(|(_, column)| column.name.clone())
}
