/// `sqlparser` expression helpers: identifier parts and aggregate calls.
pub mod expr;
/// Identifier and table-name normalization helpers (qualified names, quoted identifiers).
pub mod names;
/// Spider query-dict decoding and example loading.
pub mod spider;
/// SQL text lowering into the typed query grammar.
pub mod sql_parser;
