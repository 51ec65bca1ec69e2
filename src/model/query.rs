//! Typed query grammar.
//!
//! Each node kind carries only its own well-typed fields. Optional recursion
//! points (set operations, subquery operands) are explicit enum variants or
//! `Option`s so callers must handle "no further recursion".

use std::fmt;

use crate::model::catalog::{ColumnId, TableId};
use crate::model::policy::AggregateId;

/// A (possibly nested) query.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Projection list.
    pub select: SelectList,
    /// Table units and join predicates.
    pub from: FromClause,
    /// `WHERE` predicates.
    pub where_clause: Condition,
    /// `GROUP BY` columns. Not traversed for policy purposes.
    pub group_by: Vec<ColumnUnit>,
    /// `HAVING` predicates. Not traversed for policy purposes.
    pub having: Condition,
    /// `ORDER BY`. Not traversed for policy purposes.
    pub order_by: Option<OrderBy>,
    /// `LIMIT`. Not traversed for policy purposes.
    pub limit: Option<u64>,
    /// Trailing `INTERSECT` / `UNION` / `EXCEPT` branch.
    pub set_operation: SetOperation,
}

impl Query {
    /// A query with the given projection and base tables and no other clauses.
    pub fn simple(select: SelectList, tables: Vec<TableUnit>) -> Self {
        Self {
            select,
            from: FromClause {
                tables,
                conditions: Condition::default(),
            },
            where_clause: Condition::default(),
            group_by: Vec::new(),
            having: Condition::default(),
            order_by: None,
            limit: None,
            set_operation: SetOperation::None,
        }
    }

    /// Base tables named in this query's `FROM`, descending into derived tables.
    pub fn referenced_tables(&self) -> Vec<TableId> {
        let mut tables = Vec::new();
        for unit in &self.from.tables {
            match unit {
                TableUnit::Base(id) => tables.push(*id),
                TableUnit::Subquery(sub) => tables.extend(sub.referenced_tables()),
            }
        }
        tables
    }

    /// Every base table the query touches, including predicate subqueries
    /// and set-operation branches.
    pub fn all_tables(&self) -> Vec<TableId> {
        let mut tables = Vec::new();
        self.collect_tables(&mut tables);
        tables
    }

    fn collect_tables(&self, tables: &mut Vec<TableId>) {
        for unit in &self.from.tables {
            match unit {
                TableUnit::Base(id) => tables.push(*id),
                TableUnit::Subquery(sub) => sub.collect_tables(tables),
            }
        }
        for condition in [&self.from.conditions, &self.where_clause, &self.having] {
            for predicate in &condition.predicates {
                for operand in predicate.operands() {
                    if let Operand::Subquery(sub) = operand {
                        sub.collect_tables(tables);
                    }
                }
            }
        }
        if let Some(branch) = self.set_operation.branch() {
            branch.collect_tables(tables);
        }
    }

    /// Attach `op` to the last query of the set-operation chain.
    pub fn append_set_operation(&mut self, op: SetOperation) {
        match &mut self.set_operation {
            SetOperation::Intersect(next) | SetOperation::Union(next) | SetOperation::Except(next) => {
                next.append_set_operation(op);
            }
            SetOperation::None => self.set_operation = op,
        }
    }
}

/// Projection list: distinct flag plus ordered entries.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectList {
    /// `SELECT DISTINCT`
    pub distinct: bool,
    /// Ordered entries.
    pub items: Vec<SelectItem>,
}

/// One select-list entry: an outer aggregate applied to a value unit.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    /// Aggregate wrapping the whole entry (`COUNT(DISTINCT x)` puts `Count` here).
    pub agg: AggregateId,
    /// The value being projected.
    pub value: ValueUnit,
}

impl SelectItem {
    /// A bare, non-aggregated column entry.
    pub fn column(column: ColumnId) -> Self {
        Self {
            agg: AggregateId::None,
            value: ValueUnit::column(ColumnUnit::plain(column)),
        }
    }

    /// An aggregated single-column entry.
    pub fn aggregate(agg: AggregateId, column: ColumnId) -> Self {
        Self {
            agg,
            value: ValueUnit::column(ColumnUnit::plain(column)),
        }
    }
}

/// `FROM` clause.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FromClause {
    /// Ordered table units.
    pub tables: Vec<TableUnit>,
    /// Join predicates (`ON ...`), flattened.
    pub conditions: Condition,
}

/// A `FROM` entry.
#[derive(Debug, Clone, PartialEq)]
pub enum TableUnit {
    /// A catalog table.
    Base(TableId),
    /// A derived table.
    Subquery(Box<Query>),
}

/// Connector between consecutive predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    /// `AND`
    And,
    /// `OR`
    Or,
}

impl fmt::Display for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Connector::And => write!(f, "and"),
            Connector::Or => write!(f, "or"),
        }
    }
}

/// Flattened predicate list: `p0 c0 p1 c1 p2 ...`.
///
/// `connectors.len()` is `predicates.len() - 1` for a non-empty condition.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Condition {
    /// Predicates in source order.
    pub predicates: Vec<Predicate>,
    /// Connectors between consecutive predicates.
    pub connectors: Vec<Connector>,
}

impl Condition {
    /// True when there are no predicates.
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Append a predicate, joined to the previous one with `connector`.
    pub fn push(&mut self, connector: Connector, predicate: Predicate) {
        if !self.predicates.is_empty() {
            self.connectors.push(connector);
        }
        self.predicates.push(predicate);
    }
}

/// Comparison operator of a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateOp {
    /// `NOT` (bare negation operator id)
    Not,
    /// `BETWEEN a AND b`
    Between,
    /// `=`
    Eq,
    /// `>`
    Gt,
    /// `<`
    Lt,
    /// `>=`
    GtEq,
    /// `<=`
    LtEq,
    /// `!=`
    NotEq,
    /// `IN`
    In,
    /// `LIKE`
    Like,
    /// `IS`
    Is,
    /// `EXISTS`
    Exists,
}

impl PredicateOp {
    /// Every operator, in numeric id order.
    pub const ALL: [PredicateOp; 12] = [
        PredicateOp::Not,
        PredicateOp::Between,
        PredicateOp::Eq,
        PredicateOp::Gt,
        PredicateOp::Lt,
        PredicateOp::GtEq,
        PredicateOp::LtEq,
        PredicateOp::NotEq,
        PredicateOp::In,
        PredicateOp::Like,
        PredicateOp::Is,
        PredicateOp::Exists,
    ];

    /// Numeric id used by the Spider query format.
    pub fn id(self) -> u8 {
        match self {
            PredicateOp::Not => 0,
            PredicateOp::Between => 1,
            PredicateOp::Eq => 2,
            PredicateOp::Gt => 3,
            PredicateOp::Lt => 4,
            PredicateOp::GtEq => 5,
            PredicateOp::LtEq => 6,
            PredicateOp::NotEq => 7,
            PredicateOp::In => 8,
            PredicateOp::Like => 9,
            PredicateOp::Is => 10,
            PredicateOp::Exists => 11,
        }
    }

    /// Operator for a numeric id.
    pub fn from_id(id: u64) -> Option<Self> {
        PredicateOp::ALL.into_iter().find(|op| u64::from(op.id()) == id)
    }
}

/// A single predicate: `[NOT] left op right [AND upper]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    /// Leading `NOT`.
    pub negated: bool,
    /// Comparison operator.
    pub op: PredicateOp,
    /// Left-hand value.
    pub left: ValueUnit,
    /// First right-hand operand.
    pub right: Option<Operand>,
    /// Second right-hand operand (`BETWEEN` upper bound).
    pub upper: Option<Operand>,
}

impl Predicate {
    /// `left op right` without negation or upper bound.
    pub fn compare(left: ValueUnit, op: PredicateOp, right: Operand) -> Self {
        Self {
            negated: false,
            op,
            left,
            right: Some(right),
            upper: None,
        }
    }

    /// Right-hand operands that are present.
    pub fn operands(&self) -> impl Iterator<Item = &Operand> {
        [self.right.as_ref(), self.upper.as_ref()].into_iter().flatten()
    }
}

/// Right-hand side of a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A scalar literal.
    Literal(Literal),
    /// A column unit.
    Column(ColumnUnit),
    /// A nested query.
    Subquery(Box<Query>),
}

/// Scalar literal operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Numeric literal.
    Number(f64),
    /// String literal (also `NULL`, booleans and other non-numeric scalars).
    Text(String),
}

/// Arithmetic operator of a value unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnitOp {
    /// Single column, no arithmetic.
    #[default]
    None,
    /// `-`
    Minus,
    /// `+`
    Plus,
    /// `*`
    Times,
    /// `/`
    Divide,
}

impl UnitOp {
    /// Numeric id used by the Spider query format.
    pub fn id(self) -> u8 {
        match self {
            UnitOp::None => 0,
            UnitOp::Minus => 1,
            UnitOp::Plus => 2,
            UnitOp::Times => 3,
            UnitOp::Divide => 4,
        }
    }

    /// Operator for a numeric id.
    pub fn from_id(id: u64) -> Option<Self> {
        [
            UnitOp::None,
            UnitOp::Minus,
            UnitOp::Plus,
            UnitOp::Times,
            UnitOp::Divide,
        ]
        .into_iter()
        .find(|op| u64::from(op.id()) == id)
    }
}

/// One column unit, or two combined by an arithmetic operator.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueUnit {
    /// Arithmetic operator; [`UnitOp::None`] when `right` is absent.
    pub op: UnitOp,
    /// First column unit.
    pub left: ColumnUnit,
    /// Second column unit for binary arithmetic.
    pub right: Option<ColumnUnit>,
}

impl ValueUnit {
    /// A value unit over a single column unit.
    pub fn column(unit: ColumnUnit) -> Self {
        Self {
            op: UnitOp::None,
            left: unit,
            right: None,
        }
    }

    /// Column units that are present.
    pub fn column_units(&self) -> impl Iterator<Item = &ColumnUnit> {
        std::iter::once(&self.left).chain(self.right.as_ref())
    }
}

/// `(aggregate, column, distinct)` triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnUnit {
    /// Aggregate applied directly to the column.
    pub agg: AggregateId,
    /// Catalog column; [`ColumnId::WILDCARD`] for `*`.
    pub column: ColumnId,
    /// `DISTINCT` inside the aggregate.
    pub distinct: bool,
}

impl ColumnUnit {
    /// A non-aggregated, non-distinct reference.
    pub fn plain(column: ColumnId) -> Self {
        Self {
            agg: AggregateId::None,
            column,
            distinct: false,
        }
    }
}

/// Sort direction of `ORDER BY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
}

/// `ORDER BY` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    /// Direction shared by all keys.
    pub direction: SortDirection,
    /// Sort keys.
    pub values: Vec<ValueUnit>,
}

/// Trailing set-operation branch of a query.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SetOperation {
    /// No further branch.
    #[default]
    None,
    /// `INTERSECT <query>`
    Intersect(Box<Query>),
    /// `UNION <query>`
    Union(Box<Query>),
    /// `EXCEPT <query>`
    Except(Box<Query>),
}

impl SetOperation {
    /// The branch query, if any.
    pub fn branch(&self) -> Option<&Query> {
        match self {
            SetOperation::None => None,
            SetOperation::Intersect(q) | SetOperation::Union(q) | SetOperation::Except(q) => {
                Some(q)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_push_keeps_connector_invariant() {
        let pred = || {
            Predicate::compare(
                ValueUnit::column(ColumnUnit::plain(ColumnId(1))),
                PredicateOp::Eq,
                Operand::Literal(Literal::Number(1.0)),
            )
        };
        let mut cond = Condition::default();
        cond.push(Connector::Or, pred());
        assert!(cond.connectors.is_empty());

        cond.push(Connector::And, pred());
        cond.push(Connector::Or, pred());

        assert_eq!(cond.predicates.len(), 3);
        assert_eq!(cond.connectors, vec![Connector::And, Connector::Or]);
    }

    #[test]
    fn referenced_tables_descend_into_derived_tables() {
        let inner = Query::simple(
            SelectList {
                distinct: false,
                items: vec![SelectItem::column(ColumnId(1))],
            },
            vec![TableUnit::Base(TableId(2))],
        );
        let outer = Query::simple(
            SelectList::default(),
            vec![
                TableUnit::Base(TableId(0)),
                TableUnit::Subquery(Box::new(inner)),
            ],
        );
        assert_eq!(outer.referenced_tables(), vec![TableId(0), TableId(2)]);
    }

    #[test]
    fn all_tables_reach_predicate_subqueries_and_branches() {
        let single = |table: usize| {
            Query::simple(
                SelectList {
                    distinct: false,
                    items: vec![SelectItem::column(ColumnId(1))],
                },
                vec![TableUnit::Base(TableId(table))],
            )
        };
        let mut outer = single(0);
        outer.where_clause.push(
            Connector::And,
            Predicate::compare(
                ValueUnit::column(ColumnUnit::plain(ColumnId(1))),
                PredicateOp::In,
                Operand::Subquery(Box::new(single(1))),
            ),
        );
        outer.append_set_operation(SetOperation::Union(Box::new(single(2))));

        assert_eq!(outer.referenced_tables(), vec![TableId(0)]);
        assert_eq!(outer.all_tables(), vec![TableId(0), TableId(1), TableId(2)]);
    }

    #[test]
    fn operator_ids_round_trip() {
        for op in PredicateOp::ALL {
            assert_eq!(PredicateOp::from_id(u64::from(op.id())), Some(op));
        }
        assert_eq!(PredicateOp::from_id(12), None);
        assert_eq!(UnitOp::from_id(3), Some(UnitOp::Times));
        assert_eq!(UnitOp::from_id(5), None);
    }
}
