use sqlparser::ast::{
    DuplicateTreatment, Expr, Function, FunctionArg, FunctionArgExpr, FunctionArguments, Ident,
};

use crate::model::policy::AggregateId;
use crate::parser::names::normalize_identifier;

/// Identifier parts of a column expression.
///
/// Supports plain identifiers (`name`) and qualified identifiers
/// (`T1.name`), looking through parentheses.
pub fn identifier_parts(expr: &Expr) -> Option<Vec<&Ident>> {
    match expr {
        Expr::Identifier(ident) => Some(vec![ident]),
        Expr::CompoundIdentifier(parts) if !parts.is_empty() => Some(parts.iter().collect()),
        Expr::Nested(inner) => identifier_parts(inner),
        _ => None,
    }
}

/// Lowercased terminal name of a function call (`main.COUNT` -> `count`).
pub fn normalized_function_name(func: &Function) -> String {
    func.name
        .0
        .last()
        .map(|ident| normalize_identifier(&ident.value))
        .unwrap_or_default()
}

/// Extract the expression payload from a SQL function argument.
pub fn function_arg_expr(arg: &FunctionArg) -> Option<&Expr> {
    match arg {
        FunctionArg::Unnamed(FunctionArgExpr::Expr(expr))
        | FunctionArg::Named {
            arg: FunctionArgExpr::Expr(expr),
            ..
        }
        | FunctionArg::ExprNamed {
            arg: FunctionArgExpr::Expr(expr),
            ..
        } => Some(expr),
        _ => None,
    }
}

/// Argument of a recognized aggregate call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AggregateArg<'a> {
    /// `COUNT(*)` / `COUNT(t.*)`
    Wildcard,
    /// Any other single argument.
    Expr(&'a Expr),
}

/// A single-argument call to `MAX`, `MIN`, `COUNT`, `SUM`, or `AVG`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateCall<'a> {
    /// Which aggregate.
    pub agg: AggregateId,
    /// The argument.
    pub arg: AggregateArg<'a>,
    /// `DISTINCT` inside the parentheses.
    pub distinct: bool,
}

/// Recognize an aggregate call, looking through parentheses.
pub fn aggregate_call(expr: &Expr) -> Option<AggregateCall<'_>> {
    match expr {
        Expr::Nested(inner) => aggregate_call(inner),
        Expr::Function(func) => {
            let agg = AggregateId::from_function_name(&normalized_function_name(func))?;
            let FunctionArguments::List(list) = &func.args else {
                return None;
            };
            let [single] = list.args.as_slice() else {
                return None;
            };
            let arg = match single {
                FunctionArg::Unnamed(
                    FunctionArgExpr::Wildcard | FunctionArgExpr::QualifiedWildcard(_),
                ) => AggregateArg::Wildcard,
                other => AggregateArg::Expr(function_arg_expr(other)?),
            };
            Some(AggregateCall {
                agg,
                arg,
                distinct: matches!(list.duplicate_treatment, Some(DuplicateTreatment::Distinct)),
            })
        }
        _ => None,
    }
}
