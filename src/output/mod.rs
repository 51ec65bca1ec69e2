/// Writes dataset, policy and QA report files.
pub mod formatter;
/// Serializable dataset record.
pub mod record;
/// QA statistics, threshold warnings and the Markdown report.
pub mod report;
