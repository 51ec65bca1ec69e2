//! Decoding of Spider query dicts into the typed query grammar.
//!
//! Spider ships every query twice: as SQL text (`query`) and as a nested
//! JSON structure (`sql`) built from positional tuples. Every decode error
//! carries the JSON path of the offending node.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use crate::error::{AuditError, Result};
use crate::model::catalog::{ColumnId, TableId};
use crate::model::policy::AggregateId;
use crate::model::query::{
    ColumnUnit, Condition, Connector, FromClause, Literal, Operand, OrderBy, Predicate,
    PredicateOp, Query, SelectItem, SelectList, SetOperation, SortDirection, TableUnit, UnitOp,
    ValueUnit,
};

/// One entry of a Spider example file (`train_spider.json`, `dev.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpiderExample {
    /// Database the query runs against.
    pub db_id: String,
    /// Natural-language question.
    pub question: String,
    /// SQL text.
    pub query: String,
    /// Structured query dict, decoded lazily with [`decode_query`].
    pub sql: Value,
}

/// Parse a Spider example file.
pub fn examples_from_json(json: &str) -> Result<Vec<SpiderExample>> {
    Ok(serde_json::from_str(json)?)
}

/// Read and parse a Spider example file.
pub fn load_examples(path: &Path) -> Result<Vec<SpiderExample>> {
    let json = std::fs::read_to_string(path).map_err(|e| AuditError::io(path, e))?;
    examples_from_json(&json)
}

/// Decode a Spider query dict.
pub fn decode_query(sql: &Value) -> Result<Query> {
    query_at(sql, "$")
}

fn query_at(value: &Value, path: &str) -> Result<Query> {
    if !value.is_object() {
        return Err(AuditError::invalid(path, "query must be an object"));
    }

    let select = select_at(required(value, "select", path)?, &child(path, "select"))?;
    let from = from_at(required(value, "from", path)?, &child(path, "from"))?;
    let where_clause = optional_condition(value, "where", path)?;
    let having = optional_condition(value, "having", path)?;

    let group_by = match present(value, "groupBy") {
        Some(units) => {
            let group_path = child(path, "groupBy");
            array_at(units, &group_path)?
                .iter()
                .enumerate()
                .map(|(idx, unit)| column_unit_at(unit, &index(&group_path, idx)))
                .collect::<Result<Vec<_>>>()?
        }
        None => Vec::new(),
    };

    let order_by = match present(value, "orderBy") {
        Some(order) => order_by_at(order, &child(path, "orderBy"))?,
        None => None,
    };

    let limit = match present(value, "limit") {
        Some(limit) => Some(limit.as_u64().ok_or_else(|| {
            AuditError::invalid(child(path, "limit"), "limit must be a non-negative integer")
        })?),
        None => None,
    };

    let mut set_operation = SetOperation::None;
    for key in ["intersect", "union", "except"] {
        let Some(branch) = present(value, key) else {
            continue;
        };
        if !matches!(set_operation, SetOperation::None) {
            return Err(AuditError::invalid(
                path,
                "at most one set-operation branch may be populated",
            ));
        }
        let branch = Box::new(query_at(branch, &child(path, key))?);
        set_operation = match key {
            "intersect" => SetOperation::Intersect(branch),
            "union" => SetOperation::Union(branch),
            _ => SetOperation::Except(branch),
        };
    }

    Ok(Query {
        select,
        from,
        where_clause,
        group_by,
        having,
        order_by,
        limit,
        set_operation,
    })
}

fn select_at(value: &Value, path: &str) -> Result<SelectList> {
    let [distinct, items] = tuple::<2>(value, path)?;
    let items_path = index(path, 1);
    let items = array_at(items, &items_path)?
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            let item_path = index(&items_path, idx);
            let [agg, unit] = tuple::<2>(item, &item_path)?;
            Ok(SelectItem {
                agg: aggregate_at(agg, &index(&item_path, 0))?,
                value: value_unit_at(unit, &index(&item_path, 1))?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(SelectList {
        distinct: flag_at(distinct, &index(path, 0))?,
        items,
    })
}

fn from_at(value: &Value, path: &str) -> Result<FromClause> {
    let units_path = child(path, "table_units");
    let tables = array_at(required(value, "table_units", path)?, &units_path)?
        .iter()
        .enumerate()
        .map(|(idx, unit)| table_unit_at(unit, &index(&units_path, idx)))
        .collect::<Result<Vec<_>>>()?;

    Ok(FromClause {
        tables,
        conditions: optional_condition(value, "conds", path)?,
    })
}

fn table_unit_at(value: &Value, path: &str) -> Result<TableUnit> {
    let [kind, payload] = tuple::<2>(value, path)?;
    match kind.as_str() {
        Some("table_unit") => Ok(TableUnit::Base(TableId(index_at(payload, &index(path, 1))?))),
        Some("sql") => Ok(TableUnit::Subquery(Box::new(query_at(
            payload,
            &index(path, 1),
        )?))),
        _ => Err(AuditError::invalid(
            index(path, 0),
            format!("unknown table unit kind {kind}"),
        )),
    }
}

fn optional_condition(value: &Value, key: &str, path: &str) -> Result<Condition> {
    match present(value, key) {
        Some(cond) => condition_at(cond, &child(path, key)),
        None => Ok(Condition::default()),
    }
}

/// Conditions alternate predicates and `"and"` / `"or"` connectors.
fn condition_at(value: &Value, path: &str) -> Result<Condition> {
    let items = array_at(value, path)?;
    if items.len() % 2 == 0 && !items.is_empty() {
        return Err(AuditError::invalid(path, "condition ends with a connector"));
    }

    let mut condition = Condition::default();
    let mut pending = Connector::And;
    for (idx, item) in items.iter().enumerate() {
        let item_path = index(path, idx);
        if idx % 2 == 1 {
            pending = match item.as_str().map(str::to_ascii_lowercase).as_deref() {
                Some("and") => Connector::And,
                Some("or") => Connector::Or,
                _ => {
                    return Err(AuditError::invalid(
                        item_path,
                        "expected \"and\" or \"or\" between predicates",
                    ))
                }
            };
        } else {
            condition.push(pending, predicate_at(item, &item_path)?);
        }
    }
    Ok(condition)
}

fn predicate_at(value: &Value, path: &str) -> Result<Predicate> {
    let [negated, op, left, right, upper] = tuple::<5>(value, path)?;
    let op_path = index(path, 1);
    let op = match op {
        Value::Null => return Err(AuditError::invalid(op_path, "predicate is missing its operator")),
        other => other
            .as_u64()
            .and_then(PredicateOp::from_id)
            .ok_or_else(|| AuditError::invalid(op_path, format!("unknown operator id {other}")))?,
    };

    Ok(Predicate {
        negated: flag_at(negated, &index(path, 0))?,
        op,
        left: value_unit_at(left, &index(path, 2))?,
        right: operand_at(right, &index(path, 3))?,
        upper: operand_at(upper, &index(path, 4))?,
    })
}

fn operand_at(value: &Value, path: &str) -> Result<Option<Operand>> {
    let operand = match value {
        Value::Null => return Ok(None),
        Value::Number(n) => Operand::Literal(Literal::Number(n.as_f64().unwrap_or_default())),
        Value::String(s) => Operand::Literal(Literal::Text(s.clone())),
        Value::Bool(b) => Operand::Literal(Literal::Text(b.to_string())),
        Value::Object(_) => Operand::Subquery(Box::new(query_at(value, path)?)),
        Value::Array(_) => Operand::Column(column_unit_at(value, path)?),
    };
    Ok(Some(operand))
}

fn order_by_at(value: &Value, path: &str) -> Result<Option<OrderBy>> {
    if array_at(value, path)?.is_empty() {
        return Ok(None);
    }
    let [direction, units] = tuple::<2>(value, path)?;
    let direction = match direction.as_str() {
        Some("asc") => SortDirection::Asc,
        Some("desc") => SortDirection::Desc,
        _ => {
            return Err(AuditError::invalid(
                index(path, 0),
                format!("unknown sort direction {direction}"),
            ))
        }
    };
    let units_path = index(path, 1);
    let values = array_at(units, &units_path)?
        .iter()
        .enumerate()
        .map(|(idx, unit)| value_unit_at(unit, &index(&units_path, idx)))
        .collect::<Result<Vec<_>>>()?;
    Ok(Some(OrderBy { direction, values }))
}

fn value_unit_at(value: &Value, path: &str) -> Result<ValueUnit> {
    let [op, left, right] = tuple::<3>(value, path)?;
    let op_path = index(path, 0);
    let op = op
        .as_u64()
        .and_then(UnitOp::from_id)
        .ok_or_else(|| AuditError::invalid(op_path, format!("unknown unit operator {op}")))?;
    let right = match right {
        Value::Null => None,
        unit => Some(column_unit_at(unit, &index(path, 2))?),
    };
    Ok(ValueUnit {
        op,
        left: column_unit_at(left, &index(path, 1))?,
        right,
    })
}

fn column_unit_at(value: &Value, path: &str) -> Result<ColumnUnit> {
    let [agg, column, distinct] = tuple::<3>(value, path)?;
    Ok(ColumnUnit {
        agg: aggregate_at(agg, &index(path, 0))?,
        column: ColumnId(index_at(column, &index(path, 1))?),
        distinct: flag_at(distinct, &index(path, 2))?,
    })
}

fn aggregate_at(value: &Value, path: &str) -> Result<AggregateId> {
    value
        .as_u64()
        .and_then(|id| u8::try_from(id).ok())
        .and_then(|id| AggregateId::try_from(id).ok())
        .ok_or_else(|| AuditError::invalid(path, format!("unknown aggregate id {value}")))
}

fn index_at(value: &Value, path: &str) -> Result<usize> {
    value
        .as_u64()
        .and_then(|idx| usize::try_from(idx).ok())
        .ok_or_else(|| AuditError::invalid(path, format!("expected an index, found {value}")))
}

/// Spider mixes JSON booleans and 0/1 integers for flags.
fn flag_at(value: &Value, path: &str) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) if n.as_u64() == Some(0) => Ok(false),
        Value::Number(n) if n.as_u64() == Some(1) => Ok(true),
        Value::Null => Ok(false),
        other => Err(AuditError::invalid(path, format!("expected a flag, found {other}"))),
    }
}

fn array_at<'a>(value: &'a Value, path: &str) -> Result<&'a Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| AuditError::invalid(path, "expected an array"))
}

fn tuple<'a, const N: usize>(value: &'a Value, path: &str) -> Result<[&'a Value; N]> {
    let items = array_at(value, path)?;
    if items.len() != N {
        return Err(AuditError::invalid(
            path,
            format!("expected {N} elements, found {}", items.len()),
        ));
    }
    Ok(std::array::from_fn(|idx| &items[idx]))
}

fn required<'a>(value: &'a Value, key: &str, path: &str) -> Result<&'a Value> {
    value
        .get(key)
        .ok_or_else(|| AuditError::invalid(path, format!("missing field '{key}'")))
}

/// A field that is present and not `null`.
fn present<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value.get(key).filter(|v| !v.is_null())
}

fn child(path: &str, key: &str) -> String {
    format!("{path}.{key}")
}

fn index(path: &str, idx: usize) -> String {
    format!("{path}[{idx}]")
}
