//! Audit SQL queries against per-column usage policies, rewrite violating
//! queries into compliant ones, and manufacture known-violating variants.
#![warn(missing_docs)]

/// Query reference extraction, permission matrix, and violation detection.
pub mod analyzer;
/// Column policy classification: ordered name rules plus manual overrides.
pub mod classifier;
/// Error taxonomy shared by loaders, extraction, and SQL lowering.
pub mod error;
/// Rewrite engine, accept/refuse decision procedure, and mutation generator.
pub mod generator;
/// Catalog, typed query grammar, policies, and labels.
pub mod model;
/// Dataset record and QA report output.
pub mod output;
/// Spider JSON decoding, SQL text lowering, and identifier helpers.
pub mod parser;
/// Per-database context and per-record processing.
pub mod pipeline;
