/// Per-database table/column registry and Spider schema loading.
pub mod catalog;
/// Gold labels and negative examples.
pub mod label;
/// Policies, roles, aggregate ids, column references, and violations.
pub mod policy;
/// Typed recursive query grammar.
pub mod query;
