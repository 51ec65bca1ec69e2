/// Recursive column-reference extraction and the top-level wildcard check.
pub mod extractor;
/// Policy x role permission matrix with the aggregate refinement for `AggOnly`.
pub mod permissions;
/// Evaluation of extracted references against a policy map.
pub mod violations;
