/// Manual per-column policy overrides applied after automatic classification.
pub mod overrides;
/// Column classification: runs the ordered rule list over every catalog column.
pub mod policy_classifier;
/// Injectable, ordered name-matching rules and the built-in default set.
pub mod rules;
