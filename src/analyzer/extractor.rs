//! Column-reference extraction.
//!
//! Walks the select list, join predicates, where predicates, derived tables,
//! predicate subqueries and set-operation branches of a query. `GROUP BY`,
//! `HAVING`, `ORDER BY` and `LIMIT` are never visited.

use crate::error::Result;
use crate::model::catalog::Catalog;
use crate::model::policy::{AggregateId, ColumnRef, Role};
use crate::model::query::{ColumnUnit, Condition, Operand, Query, TableUnit};

/// Every column reference reachable from `query`, tagged with role and effective aggregate.
///
/// Wildcard units are skipped. A column index outside the catalog fails the
/// whole extraction.
pub fn extract_references(query: &Query, catalog: &Catalog) -> Result<Vec<ColumnRef>> {
    let mut refs = Vec::new();
    collect_query(query, catalog, &mut refs)?;
    Ok(refs)
}

/// True when the top-level select list projects a bare `*`.
///
/// `COUNT(*)` does not count: its effective aggregate is nonzero. Nested
/// queries are not inspected.
pub fn has_wildcard_select(query: &Query) -> bool {
    query.select.items.iter().any(|item| {
        item.value
            .column_units()
            .any(|unit| unit.column.is_wildcard() && !effective_agg(unit, item.agg).is_aggregate())
    })
}

fn effective_agg(unit: &ColumnUnit, outer: AggregateId) -> AggregateId {
    if unit.agg.is_aggregate() {
        unit.agg
    } else {
        outer
    }
}

fn collect_query(query: &Query, catalog: &Catalog, refs: &mut Vec<ColumnRef>) -> Result<()> {
    for item in &query.select.items {
        for unit in item.value.column_units() {
            let agg = effective_agg(unit, item.agg);
            let role = if agg.is_aggregate() {
                Role::AggArg
            } else {
                Role::SelectExpr
            };
            push_unit(unit, role, agg, catalog, refs)?;
        }
    }

    collect_condition(&query.from.conditions, Role::JoinCond, catalog, refs)?;
    collect_condition(&query.where_clause, Role::WherePred, catalog, refs)?;

    for unit in &query.from.tables {
        if let TableUnit::Subquery(sub) = unit {
            collect_query(sub, catalog, refs)?;
        }
    }

    if let Some(branch) = query.set_operation.branch() {
        collect_query(branch, catalog, refs)?;
    }
    Ok(())
}

fn collect_condition(
    condition: &Condition,
    role: Role,
    catalog: &Catalog,
    refs: &mut Vec<ColumnRef>,
) -> Result<()> {
    for predicate in &condition.predicates {
        for unit in predicate.left.column_units() {
            push_unit(unit, role, unit.agg, catalog, refs)?;
        }
        for operand in predicate.operands() {
            match operand {
                Operand::Column(unit) => push_unit(unit, role, AggregateId::None, catalog, refs)?,
                // Nested queries keep roles relative to their own clauses.
                Operand::Subquery(sub) => collect_query(sub, catalog, refs)?,
                Operand::Literal(_) => {}
            }
        }
    }
    Ok(())
}

fn push_unit(
    unit: &ColumnUnit,
    role: Role,
    agg: AggregateId,
    catalog: &Catalog,
    refs: &mut Vec<ColumnRef>,
) -> Result<()> {
    if unit.column.is_wildcard() {
        return Ok(());
    }
    let (table, column) = catalog.resolve(unit.column)?;
    refs.push(ColumnRef {
        table: table.to_string(),
        column: column.to_string(),
        role,
        agg,
    });
    Ok(())
}
