/// Accept/refuse decision procedure producing gold labels.
pub mod gold;
/// Single-edit mutation generator for negative examples.
pub mod mutation;
/// Bounded, priority-ordered rewrite engine and refusal reasons.
pub mod rewriter;
/// Name-based SQL text edits shared by the rewriter and mutation generator.
pub mod text;
