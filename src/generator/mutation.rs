//! Single-edit mutations that turn a compliant query into a known-violating one.
//!
//! Rules are tried in order and the first candidate that checks out wins:
//! 1. add a `Hidden` column of a `FROM` table to the select list;
//! 2. strip an `AVG(...)` / `COUNT(...)` wrapper from an `AggOnly` column;
//! 3. add a `JoinOnly` column of a `FROM` table to the select list.
//!
//! Insertions are skipped for set-operation queries, whose branches must keep
//! matching column counts. Every candidate is parsed again and kept only when
//! its violations are exactly the recorded one.

use crate::analyzer::extractor::extract_references;
use crate::analyzer::permissions::AGG_ONLY_AGGREGATES;
use crate::analyzer::violations::{check_reference, detect_violations};
use crate::generator::text::{add_to_select, contains_word, strip_aggregate_wrapper};
use crate::model::catalog::{Catalog, TableId};
use crate::model::label::NegativeExample;
use crate::model::policy::{
    qualified_name, AggregateId, ColumnRef, Policy, PolicyMap, Role, Violation,
};
use crate::model::query::{Query, SetOperation, TableUnit};
use crate::parser::sql_parser::parse_query;

/// Produce at most one negative example for `sql`.
pub fn generate_negative(
    sql: &str,
    query: &Query,
    catalog: &Catalog,
    policies: &PolicyMap,
) -> Option<NegativeExample> {
    let outer = match query.set_operation {
        SetOperation::None => unique(query.from.tables.iter().filter_map(|unit| match unit {
            TableUnit::Base(id) => Some(*id),
            TableUnit::Subquery(_) => None,
        })),
        _ => Vec::new(),
    };

    add_hidden_column(sql, &outer, catalog, policies)
        .into_iter()
        .chain(unwrap_aggregate(sql, query, catalog, policies))
        .chain(add_join_only_column(sql, &outer, catalog, policies))
        .find(|negative| reproduces(negative, catalog, policies))
}

fn add_hidden_column(
    sql: &str,
    tables: &[TableId],
    catalog: &Catalog,
    policies: &PolicyMap,
) -> Vec<NegativeExample> {
    insertable_columns(sql, tables, catalog, policies, Policy::Hidden)
        .into_iter()
        .filter_map(|(table, column)| {
            Some(NegativeExample {
                sql: add_to_select(sql, &column)?,
                violations: vec![select_violation(&table, &column, Policy::Hidden)],
            })
        })
        .collect()
}

/// Candidates come from the aggregate arguments the query actually has, so
/// each one already resolves to its own table.
fn unwrap_aggregate(
    sql: &str,
    query: &Query,
    catalog: &Catalog,
    policies: &PolicyMap,
) -> Vec<NegativeExample> {
    let Ok(references) = extract_references(query, catalog) else {
        return Vec::new();
    };
    let tables = unique(query.all_tables());

    let mut seen: Vec<String> = Vec::new();
    let mut found = Vec::new();
    for reference in references {
        if reference.role != Role::AggArg
            || !AGG_ONLY_AGGREGATES.contains(&reference.agg)
            || policies.policy_of(&reference.table, &reference.column) != Policy::AggOnly
        {
            continue;
        }
        let key = reference.qualified_name();
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);

        // The wrapper is found by bare name, which must not belong to a second table.
        let Some(table) = catalog.table_id(&reference.table) else {
            continue;
        };
        if shared_name(table, &reference.column, &tables, catalog) {
            continue;
        }
        if let Some(mutated) = strip_aggregate_wrapper(sql, &reference.column) {
            found.push(NegativeExample {
                sql: mutated,
                violations: vec![select_violation(
                    &reference.table,
                    &reference.column,
                    Policy::AggOnly,
                )],
            });
        }
    }
    found
}

fn add_join_only_column(
    sql: &str,
    tables: &[TableId],
    catalog: &Catalog,
    policies: &PolicyMap,
) -> Vec<NegativeExample> {
    insertable_columns(sql, tables, catalog, policies, Policy::JoinOnly)
        .into_iter()
        .filter_map(|(table, column)| {
            let reference = ColumnRef {
                table,
                column,
                role: Role::SelectExpr,
                agg: AggregateId::None,
            };
            let violation = check_reference(&reference, policies)?;
            Some(NegativeExample {
                sql: add_to_select(sql, &reference.column)?,
                violations: vec![violation],
            })
        })
        .collect()
}

/// Columns with `policy` that can be added to the select list as a bare name.
///
/// The name must not already occur in the text and must not also belong to
/// another `FROM` table, so that it resolves to exactly this column.
fn insertable_columns(
    sql: &str,
    tables: &[TableId],
    catalog: &Catalog,
    policies: &PolicyMap,
    policy: Policy,
) -> Vec<(String, String)> {
    let mut found = Vec::new();
    for &table in tables {
        let Ok(table_name) = catalog.table_name(table) else {
            continue;
        };
        for (_, column) in catalog.columns_of(table) {
            if policies.policy_of(table_name, &column.name) != policy
                || contains_word(sql, &column.name)
                || shared_name(table, &column.name, tables, catalog)
            {
                continue;
            }
            found.push((table_name.to_string(), column.name.clone()));
        }
    }
    found
}

fn shared_name(table: TableId, column: &str, tables: &[TableId], catalog: &Catalog) -> bool {
    tables
        .iter()
        .any(|&other| other != table && catalog.column_id(other, column).is_some())
}

/// True when re-extracting `negative.sql` yields exactly its recorded violations.
fn reproduces(negative: &NegativeExample, catalog: &Catalog, policies: &PolicyMap) -> bool {
    parse_query(&negative.sql, catalog)
        .and_then(|query| extract_references(&query, catalog))
        .is_ok_and(|references| detect_violations(&references, policies) == negative.violations)
}

fn select_violation(table: &str, column: &str, policy: Policy) -> Violation {
    Violation {
        column: qualified_name(table, column),
        role: Role::SelectExpr,
        policy,
        agg_id: AggregateId::None,
    }
}

fn unique(tables: impl IntoIterator<Item = TableId>) -> Vec<TableId> {
    let mut seen = Vec::new();
    for table in tables {
        if !seen.contains(&table) {
            seen.push(table);
        }
    }
    seen
}
