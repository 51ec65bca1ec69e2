//! Lowering of SQL text into the typed query grammar.
//!
//! SQL is parsed with the SQLite dialect and then lowered against a
//! [`Catalog`], resolving every column reference to its catalog index the
//! same way the Spider query dicts do. Only the Spider grammar is supported;
//! anything outside it is reported as [`AuditError::UnsupportedSql`].

use sqlparser::ast::{
    self, BinaryOperator, Distinct, Expr, GroupByExpr, Ident, JoinConstraint, JoinOperator,
    SelectItem as AstSelectItem, SetExpr, SetOperator, Statement, TableFactor, UnaryOperator,
    Value,
};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;

use crate::error::{AuditError, Result};
use crate::model::catalog::{Catalog, ColumnId, TableId};
use crate::model::policy::AggregateId;
use crate::model::query::{
    ColumnUnit, Condition, Connector, FromClause, Literal, Operand, OrderBy, Predicate,
    PredicateOp, Query, SelectItem, SelectList, SetOperation, SortDirection, TableUnit, UnitOp,
    ValueUnit,
};
use crate::parser::expr::{aggregate_call, identifier_parts, AggregateArg};
use crate::parser::names::normalize_identifier;

/// Parse a single `SELECT` statement and lower it against `catalog`.
pub fn parse_query(sql: &str, catalog: &Catalog) -> Result<Query> {
    let statements = Parser::parse_sql(&SQLiteDialect {}, sql)?;
    let [Statement::Query(query)] = statements.as_slice() else {
        return Err(AuditError::unsupported(format!(
            "expected a single SELECT statement, found {} statement(s)",
            statements.len()
        )));
    };
    Lowerer::new(catalog).lower_query(query)
}

/// Columns visible through one `FROM` entry.
#[derive(Debug)]
enum Source {
    Table(TableId),
    /// Output columns of a derived table, by output name.
    Derived(Vec<(String, ColumnId)>),
}

#[derive(Debug)]
struct Binding {
    /// Normalized alias, or table name when unaliased.
    name: String,
    source: Source,
}

/// `ORDER BY` / `LIMIT` of a query, applied to the first `SELECT` of its body.
#[derive(Clone, Copy, Default)]
struct Tail<'q> {
    order_by: Option<&'q ast::OrderBy>,
    limit: Option<&'q Expr>,
}

impl Tail<'_> {
    fn is_empty(&self) -> bool {
        self.order_by.is_none() && self.limit.is_none()
    }
}

struct Lowerer<'c> {
    catalog: &'c Catalog,
    /// Innermost scope last. Subqueries see every enclosing scope.
    scopes: Vec<Vec<Binding>>,
}

impl<'c> Lowerer<'c> {
    fn new(catalog: &'c Catalog) -> Self {
        Self {
            catalog,
            scopes: Vec::new(),
        }
    }

    fn lower_query(&mut self, query: &ast::Query) -> Result<Query> {
        if query.with.is_some() {
            return Err(AuditError::unsupported("WITH clauses"));
        }
        if query.offset.is_some() || query.fetch.is_some() {
            return Err(AuditError::unsupported("OFFSET / FETCH"));
        }
        let tail = Tail {
            order_by: query.order_by.as_ref(),
            limit: query.limit.as_ref(),
        };
        self.lower_set_expr(&query.body, tail)
    }

    fn lower_set_expr(&mut self, body: &SetExpr, tail: Tail<'_>) -> Result<Query> {
        match body {
            SetExpr::Select(select) => self.lower_select(select, tail),
            SetExpr::Query(inner) if tail.is_empty() => self.lower_query(inner),
            SetExpr::Query(_) => Err(AuditError::unsupported(
                "ORDER BY / LIMIT around a parenthesized query",
            )),
            SetExpr::SetOperation {
                op, left, right, ..
            } => {
                let mut query = self.lower_set_expr(left, tail)?;
                let branch = Box::new(self.lower_set_expr(right, Tail::default())?);
                query.append_set_operation(match op {
                    SetOperator::Union => SetOperation::Union(branch),
                    SetOperator::Intersect => SetOperation::Intersect(branch),
                    SetOperator::Except => SetOperation::Except(branch),
                });
                Ok(query)
            }
            other => Err(AuditError::unsupported(format!("query body `{other}`"))),
        }
    }

    fn lower_select(&mut self, select: &ast::Select, tail: Tail<'_>) -> Result<Query> {
        let distinct = match &select.distinct {
            None => false,
            Some(Distinct::Distinct) => true,
            Some(Distinct::On(_)) => return Err(AuditError::unsupported("DISTINCT ON")),
        };

        // Derived tables are lowered before this query's own scope exists.
        let mut tables = Vec::new();
        let mut bindings = Vec::new();
        let mut join_predicates = Vec::new();
        for table in &select.from {
            let (unit, binding) = self.lower_table_factor(&table.relation)?;
            tables.push(unit);
            bindings.push(binding);
            for join in &table.joins {
                let (unit, binding) = self.lower_table_factor(&join.relation)?;
                tables.push(unit);
                bindings.push(binding);
                if let Some(on) = join_condition(&join.join_operator)? {
                    join_predicates.push(on);
                }
            }
        }

        self.scopes.push(bindings);
        let lowered = self.lower_select_body(select, distinct, tables, &join_predicates, tail);
        self.scopes.pop();
        lowered
    }

    fn lower_select_body(
        &mut self,
        select: &ast::Select,
        distinct: bool,
        tables: Vec<TableUnit>,
        join_predicates: &[&Expr],
        tail: Tail<'_>,
    ) -> Result<Query> {
        let mut conditions = Condition::default();
        for on in join_predicates {
            self.lower_condition(on, Connector::And, &mut conditions)?;
        }

        let mut items = Vec::with_capacity(select.projection.len());
        let mut aliases = Vec::new();
        for item in &select.projection {
            match item {
                AstSelectItem::UnnamedExpr(expr) => items.push(self.lower_select_item(expr)?),
                AstSelectItem::ExprWithAlias { expr, alias } => {
                    let lowered = self.lower_select_item(expr)?;
                    aliases.push((normalize_identifier(&alias.value), lowered.clone()));
                    items.push(lowered);
                }
                AstSelectItem::Wildcard(_) | AstSelectItem::QualifiedWildcard(..) => {
                    items.push(SelectItem::column(ColumnId::WILDCARD));
                }
            }
        }

        let mut where_clause = Condition::default();
        if let Some(selection) = &select.selection {
            self.lower_condition(selection, Connector::And, &mut where_clause)?;
        }

        let group_by = match &select.group_by {
            GroupByExpr::Expressions(exprs, _) => exprs
                .iter()
                .map(|expr| self.lower_column_unit(expr))
                .collect::<Result<Vec<_>>>()?,
            GroupByExpr::All(_) => return Err(AuditError::unsupported("GROUP BY ALL")),
        };

        let mut having = Condition::default();
        if let Some(expr) = &select.having {
            self.lower_condition(expr, Connector::And, &mut having)?;
        }

        let order_by = match tail.order_by {
            Some(order) => self.lower_order_by(order, &aliases)?,
            None => None,
        };
        let limit = tail.limit.map(lower_limit).transpose()?;

        Ok(Query {
            select: SelectList { distinct, items },
            from: FromClause { tables, conditions },
            where_clause,
            group_by,
            having,
            order_by,
            limit,
            set_operation: SetOperation::None,
        })
    }

    fn lower_table_factor(&mut self, factor: &TableFactor) -> Result<(TableUnit, Binding)> {
        match factor {
            TableFactor::Table { name, alias, .. } => {
                let table_name = name
                    .0
                    .last()
                    .map(|ident| ident.value.as_str())
                    .unwrap_or_default();
                let table = self
                    .catalog
                    .table_id(table_name)
                    .ok_or_else(|| AuditError::UnknownTable {
                        name: name.to_string(),
                    })?;
                let binding_name = alias
                    .as_ref()
                    .map_or(table_name, |alias| alias.name.value.as_str());
                Ok((
                    TableUnit::Base(table),
                    Binding {
                        name: normalize_identifier(binding_name),
                        source: Source::Table(table),
                    },
                ))
            }
            TableFactor::Derived {
                subquery, alias, ..
            } => {
                let lowered = self.lower_query(subquery)?;
                let columns = derived_columns(subquery, &lowered, self.catalog);
                let name = alias
                    .as_ref()
                    .map(|alias| normalize_identifier(&alias.name.value))
                    .unwrap_or_default();
                Ok((
                    TableUnit::Subquery(Box::new(lowered)),
                    Binding {
                        name,
                        source: Source::Derived(columns),
                    },
                ))
            }
            other => Err(AuditError::unsupported(format!("FROM entry `{other}`"))),
        }
    }

    fn lower_select_item(&mut self, expr: &Expr) -> Result<SelectItem> {
        match aggregate_call(expr) {
            Some(call) => {
                let mut value = match call.arg {
                    AggregateArg::Wildcard => {
                        ValueUnit::column(ColumnUnit::plain(ColumnId::WILDCARD))
                    }
                    AggregateArg::Expr(arg) => self.lower_value_unit(arg)?,
                };
                value.left.distinct = call.distinct;
                Ok(SelectItem {
                    agg: call.agg,
                    value,
                })
            }
            None => Ok(SelectItem {
                agg: AggregateId::None,
                value: self.lower_value_unit(expr)?,
            }),
        }
    }

    fn lower_value_unit(&mut self, expr: &Expr) -> Result<ValueUnit> {
        match expr {
            Expr::Nested(inner) => self.lower_value_unit(inner),
            Expr::BinaryOp { left, op, right } => {
                let op = match op {
                    BinaryOperator::Minus => UnitOp::Minus,
                    BinaryOperator::Plus => UnitOp::Plus,
                    BinaryOperator::Multiply => UnitOp::Times,
                    BinaryOperator::Divide => UnitOp::Divide,
                    other => {
                        return Err(AuditError::unsupported(format!(
                            "operator `{other}` in a value expression"
                        )))
                    }
                };
                Ok(ValueUnit {
                    op,
                    left: self.lower_column_unit(left)?,
                    right: Some(self.lower_column_unit(right)?),
                })
            }
            _ => Ok(ValueUnit::column(self.lower_column_unit(expr)?)),
        }
    }

    fn lower_column_unit(&mut self, expr: &Expr) -> Result<ColumnUnit> {
        if let Expr::Nested(inner) = expr {
            return self.lower_column_unit(inner);
        }
        if let Some(call) = aggregate_call(expr) {
            let column = match call.arg {
                AggregateArg::Wildcard => ColumnId::WILDCARD,
                AggregateArg::Expr(arg) => self.column_of(arg)?,
            };
            return Ok(ColumnUnit {
                agg: call.agg,
                column,
                distinct: call.distinct,
            });
        }
        Ok(ColumnUnit::plain(self.column_of(expr)?))
    }

    fn column_of(&self, expr: &Expr) -> Result<ColumnId> {
        let parts = identifier_parts(expr)
            .ok_or_else(|| AuditError::unsupported(format!("expression `{expr}`")))?;
        self.resolve_column(&parts)
    }

    /// Resolve `column` or `qualifier.column`, innermost scope first.
    fn resolve_column(&self, parts: &[&Ident]) -> Result<ColumnId> {
        let display = || {
            parts
                .iter()
                .map(|ident| ident.value.as_str())
                .collect::<Vec<_>>()
                .join(".")
        };
        let Some((column, qualifier)) = parts.split_last() else {
            return Err(AuditError::UnknownColumn { name: display() });
        };

        match qualifier.last() {
            Some(qualifier) => {
                let wanted = normalize_identifier(&qualifier.value);
                let binding = self
                    .scopes
                    .iter()
                    .rev()
                    .flat_map(|scope| scope.iter())
                    .find(|binding| binding.name == wanted)
                    .ok_or_else(|| AuditError::UnknownTable {
                        name: qualifier.value.clone(),
                    })?;
                self.lookup(binding, &column.value)
                    .ok_or_else(|| AuditError::UnknownColumn { name: display() })
            }
            None => self
                .scopes
                .iter()
                .rev()
                .find_map(|scope| {
                    scope
                        .iter()
                        .find_map(|binding| self.lookup(binding, &column.value))
                })
                .ok_or_else(|| AuditError::UnknownColumn { name: display() }),
        }
    }

    fn lookup(&self, binding: &Binding, column: &str) -> Option<ColumnId> {
        match &binding.source {
            Source::Table(table) => self.catalog.column_id(*table, column),
            Source::Derived(columns) => {
                let wanted = normalize_identifier(column);
                columns
                    .iter()
                    .find(|(name, _)| *name == wanted)
                    .map(|(_, id)| *id)
            }
        }
    }

    /// Flatten nested `AND` / `OR` into a predicate list.
    fn lower_condition(
        &mut self,
        expr: &Expr,
        connector: Connector,
        out: &mut Condition,
    ) -> Result<()> {
        match expr {
            Expr::BinaryOp {
                left,
                op: op @ (BinaryOperator::And | BinaryOperator::Or),
                right,
            } => {
                self.lower_condition(left, connector, out)?;
                let joint = if *op == BinaryOperator::And {
                    Connector::And
                } else {
                    Connector::Or
                };
                self.lower_condition(right, joint, out)
            }
            Expr::Nested(inner) if is_connective(inner) => {
                self.lower_condition(inner, connector, out)
            }
            _ => {
                let predicate = self.lower_predicate(expr)?;
                out.push(connector, predicate);
                Ok(())
            }
        }
    }

    fn lower_predicate(&mut self, expr: &Expr) -> Result<Predicate> {
        match expr {
            Expr::Nested(inner) => self.lower_predicate(inner),
            Expr::UnaryOp {
                op: UnaryOperator::Not,
                expr,
            } => {
                let mut predicate = self.lower_predicate(expr)?;
                predicate.negated = !predicate.negated;
                Ok(predicate)
            }
            Expr::BinaryOp { left, op, right } => {
                let op = comparison_op(op).ok_or_else(|| {
                    AuditError::unsupported(format!("operator `{op}` in a predicate"))
                })?;
                Ok(Predicate::compare(
                    self.lower_value_unit(left)?,
                    op,
                    self.lower_operand(right)?,
                ))
            }
            Expr::Between {
                expr,
                negated,
                low,
                high,
            } => Ok(Predicate {
                negated: *negated,
                op: PredicateOp::Between,
                left: self.lower_value_unit(expr)?,
                right: Some(self.lower_operand(low)?),
                upper: Some(self.lower_operand(high)?),
            }),
            Expr::InSubquery {
                expr,
                subquery,
                negated,
            } => Ok(Predicate {
                negated: *negated,
                op: PredicateOp::In,
                left: self.lower_value_unit(expr)?,
                right: Some(Operand::Subquery(Box::new(self.lower_query(subquery)?))),
                upper: None,
            }),
            Expr::Like {
                negated,
                expr,
                pattern,
                ..
            } => Ok(Predicate {
                negated: *negated,
                op: PredicateOp::Like,
                left: self.lower_value_unit(expr)?,
                right: Some(self.lower_operand(pattern)?),
                upper: None,
            }),
            Expr::IsNull(inner) | Expr::IsNotNull(inner) => Ok(Predicate {
                negated: matches!(expr, Expr::IsNotNull(_)),
                op: PredicateOp::Is,
                left: self.lower_value_unit(inner)?,
                right: Some(Operand::Literal(Literal::Text("null".to_string()))),
                upper: None,
            }),
            other => Err(AuditError::unsupported(format!("predicate `{other}`"))),
        }
    }

    fn lower_operand(&mut self, expr: &Expr) -> Result<Operand> {
        match expr {
            Expr::Nested(inner) => self.lower_operand(inner),
            Expr::Subquery(query) => Ok(Operand::Subquery(Box::new(self.lower_query(query)?))),
            Expr::Value(value) => Ok(Operand::Literal(literal(value)?)),
            Expr::UnaryOp {
                op: UnaryOperator::Minus,
                expr: inner,
            } => match inner.as_ref() {
                Expr::Value(Value::Number(n, _)) => {
                    Ok(Operand::Literal(Literal::Number(-parse_number(n)?)))
                }
                other => Err(AuditError::unsupported(format!("operand `-{other}`"))),
            },
            // SQLite reads a double-quoted name that matches no column as a string.
            Expr::Identifier(ident) if ident.quote_style == Some('"') => {
                match self.resolve_column(&[ident]) {
                    Ok(column) => Ok(Operand::Column(ColumnUnit::plain(column))),
                    Err(_) => Ok(Operand::Literal(Literal::Text(ident.value.clone()))),
                }
            }
            _ => Ok(Operand::Column(self.lower_column_unit(expr)?)),
        }
    }

    fn lower_order_by(
        &mut self,
        order: &ast::OrderBy,
        aliases: &[(String, SelectItem)],
    ) -> Result<Option<OrderBy>> {
        let Some(first) = order.exprs.first() else {
            return Ok(None);
        };
        let direction = if first.asc == Some(false) {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        };
        let values = order
            .exprs
            .iter()
            .map(|key| match self.lower_value_unit(&key.expr) {
                Ok(value) => Ok(value),
                Err(err) => projection_alias(&key.expr, aliases).ok_or(err),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(OrderBy { direction, values }))
    }
}

/// `ON` expression of a join, if any.
fn join_condition(operator: &JoinOperator) -> Result<Option<&Expr>> {
    let constraint = match operator {
        JoinOperator::Inner(c)
        | JoinOperator::LeftOuter(c)
        | JoinOperator::RightOuter(c)
        | JoinOperator::FullOuter(c) => c,
        JoinOperator::CrossJoin => return Ok(None),
        _ => return Err(AuditError::unsupported("join kind")),
    };
    match constraint {
        JoinConstraint::On(expr) => Ok(Some(expr)),
        JoinConstraint::None => Ok(None),
        JoinConstraint::Using(_) | JoinConstraint::Natural => {
            Err(AuditError::unsupported("USING / NATURAL joins"))
        }
    }
}

fn is_connective(expr: &Expr) -> bool {
    match expr {
        Expr::BinaryOp { op, .. } => matches!(op, BinaryOperator::And | BinaryOperator::Or),
        Expr::Nested(inner) => is_connective(inner),
        _ => false,
    }
}

fn comparison_op(op: &BinaryOperator) -> Option<PredicateOp> {
    match op {
        BinaryOperator::Eq => Some(PredicateOp::Eq),
        BinaryOperator::Gt => Some(PredicateOp::Gt),
        BinaryOperator::Lt => Some(PredicateOp::Lt),
        BinaryOperator::GtEq => Some(PredicateOp::GtEq),
        BinaryOperator::LtEq => Some(PredicateOp::LtEq),
        BinaryOperator::NotEq => Some(PredicateOp::NotEq),
        _ => None,
    }
}

fn literal(value: &Value) -> Result<Literal> {
    Ok(match value {
        Value::Number(n, _) => Literal::Number(parse_number(n)?),
        Value::SingleQuotedString(s) | Value::DoubleQuotedString(s) => Literal::Text(s.clone()),
        Value::Null => Literal::Text("null".to_string()),
        other => Literal::Text(other.to_string()),
    })
}

fn parse_number(text: &str) -> Result<f64> {
    text.parse::<f64>()
        .map_err(|_| AuditError::unsupported(format!("numeric literal `{text}`")))
}

fn lower_limit(expr: &Expr) -> Result<u64> {
    match expr {
        Expr::Value(Value::Number(n, _)) => n
            .parse::<u64>()
            .map_err(|_| AuditError::unsupported(format!("LIMIT {n}"))),
        other => Err(AuditError::unsupported(format!("LIMIT {other}"))),
    }
}

fn projection_alias(expr: &Expr, aliases: &[(String, SelectItem)]) -> Option<ValueUnit> {
    let Expr::Identifier(ident) = expr else {
        return None;
    };
    let wanted = normalize_identifier(&ident.value);
    aliases
        .iter()
        .find(|(alias, _)| *alias == wanted)
        .map(|(_, item)| {
            let mut value = item.value.clone();
            if item.agg.is_aggregate() && !value.left.agg.is_aggregate() {
                value.left.agg = item.agg;
            }
            value
        })
}

/// Output columns of a derived table, named the way an outer query refers to them.
fn derived_columns(
    subquery: &ast::Query,
    lowered: &Query,
    catalog: &Catalog,
) -> Vec<(String, ColumnId)> {
    let Some(select) = leftmost_select(&subquery.body) else {
        return Vec::new();
    };

    let mut columns = Vec::new();
    for (item, lowered_item) in select.projection.iter().zip(&lowered.select.items) {
        let column = lowered_item.value.left.column;
        match item {
            AstSelectItem::ExprWithAlias { alias, .. } => {
                columns.push((normalize_identifier(&alias.value), column));
            }
            AstSelectItem::UnnamedExpr(expr) => {
                if let Some(last) = identifier_parts(expr).and_then(|parts| parts.last().copied()) {
                    columns.push((normalize_identifier(&last.value), column));
                }
            }
            AstSelectItem::Wildcard(_) | AstSelectItem::QualifiedWildcard(..) => {
                for table in lowered.referenced_tables() {
                    columns.extend(
                        catalog
                            .columns_of(table)
                            .map(|(id, c)| (normalize_identifier(&c.name), id)),
                    );
                }
            }
        }
    }
    columns
}

fn leftmost_select(body: &SetExpr) -> Option<&ast::Select> {
    match body {
        SetExpr::Select(select) => Some(select),
        SetExpr::Query(query) => leftmost_select(&query.body),
        SetExpr::SetOperation { left, .. } => leftmost_select(left),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        Catalog::builder("concert_singer")
            .table("stadium", &["Stadium_ID", "Name", "Capacity"])
            .table("singer", &["Singer_ID", "Name", "Age", "Stadium_ID"])
            .primary_key("stadium", "Stadium_ID")
            .primary_key("singer", "Singer_ID")
            .build()
    }

    #[test]
    fn lowers_aliases_joins_and_aggregates() {
        let catalog = catalog();
        let query = parse_query(
            "SELECT T1.Name, count(DISTINCT T2.Name) FROM stadium AS T1 \
             JOIN singer AS T2 ON T1.Stadium_ID = T2.Stadium_ID GROUP BY T1.Name",
            &catalog,
        )
        .expect("query should lower");

        assert_eq!(query.select.items[0], SelectItem::column(ColumnId(2)));
        assert_eq!(query.select.items[1].agg, AggregateId::Count);
        assert_eq!(query.select.items[1].value.left.column, ColumnId(5));
        assert!(query.select.items[1].value.left.distinct);

        let join = &query.from.conditions.predicates[0];
        assert_eq!(join.left.left.column, ColumnId(1));
        assert_eq!(
            join.right,
            Some(Operand::Column(ColumnUnit::plain(ColumnId(7))))
        );
        assert_eq!(query.group_by, vec![ColumnUnit::plain(ColumnId(2))]);
    }

    #[test]
    fn bare_columns_resolve_to_first_table_in_from_order() {
        let catalog = catalog();
        let query = parse_query("SELECT Name FROM singer", &catalog).unwrap();
        assert_eq!(query.select.items[0], SelectItem::column(ColumnId(5)));
    }

    #[test]
    fn subquery_operands_see_their_own_scope() {
        let catalog = catalog();
        let query = parse_query(
            "SELECT Name FROM stadium WHERE Capacity > (SELECT avg(Age) FROM singer) OR Name = \"x\"",
            &catalog,
        )
        .unwrap();

        assert_eq!(query.where_clause.connectors, vec![Connector::Or]);
        let Some(Operand::Subquery(sub)) = &query.where_clause.predicates[0].right else {
            panic!("expected a subquery operand");
        };
        assert_eq!(sub.select.items[0], SelectItem::aggregate(AggregateId::Avg, ColumnId(6)));
        assert_eq!(
            query.where_clause.predicates[1].right,
            Some(Operand::Literal(Literal::Text("x".to_string())))
        );
    }

    #[test]
    fn set_operations_chain_right_nested() {
        let catalog = catalog();
        let query = parse_query(
            "SELECT Name FROM singer UNION SELECT Name FROM stadium EXCEPT SELECT Name FROM singer",
            &catalog,
        )
        .unwrap();

        let SetOperation::Union(second) = &query.set_operation else {
            panic!("expected union");
        };
        assert!(matches!(second.set_operation, SetOperation::Except(_)));
    }

    #[test]
    fn order_by_and_limit_attach_to_first_select() {
        let catalog = catalog();
        let query = parse_query(
            "SELECT Name, count(*) AS cnt FROM singer GROUP BY Name ORDER BY cnt DESC LIMIT 3",
            &catalog,
        )
        .unwrap();

        let order = query.order_by.expect("order by");
        assert_eq!(order.direction, SortDirection::Desc);
        assert_eq!(order.values[0].left.agg, AggregateId::Count);
        assert_eq!(query.limit, Some(3));
    }

    #[test]
    fn unknown_names_and_unsupported_constructs_fail() {
        let catalog = catalog();
        assert!(matches!(
            parse_query("SELECT missing FROM singer", &catalog),
            Err(AuditError::UnknownColumn { .. })
        ));
        assert!(matches!(
            parse_query("SELECT Name FROM nowhere", &catalog),
            Err(AuditError::UnknownTable { .. })
        ));
        assert!(matches!(
            parse_query("SELECT Name FROM singer WHERE Age IN (1, 2)", &catalog),
            Err(AuditError::UnsupportedSql { .. })
        ));
        assert!(matches!(
            parse_query("SELECT Name FROM singer; SELECT Name FROM stadium", &catalog),
            Err(AuditError::UnsupportedSql { .. })
        ));
    }
}
