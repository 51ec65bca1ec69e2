use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::model::policy::{Policy, PolicyMap, Role};
use crate::output::record::DatasetRecord;
use crate::parser::names::table_of_qualified;

/// Dataset quality statistics for one split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaReport {
    /// Split name.
    pub split: String,
    /// Number of records.
    pub total_records: usize,
    /// Share of records whose original query has a violation.
    pub violation_rate: f64,
    /// Share of records labeled `REFUSE`.
    pub refuse_rate: f64,
    /// Share of records with a negative example.
    pub negative_rate: f64,
    /// Original-query violations per role.
    pub role_distribution: BTreeMap<Role, usize>,
    /// Original-query violations per policy.
    pub policy_distribution: BTreeMap<Policy, usize>,
    /// Refuse rate per database.
    pub db_refuse_rates: BTreeMap<String, f64>,
    /// Threshold checks that failed.
    pub warnings: Vec<String>,
}

impl QaReport {
    /// True when no check raised a warning.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Compute statistics and threshold warnings for the records of `split`.
pub fn run_qa_check(records: &[DatasetRecord], split: &str) -> QaReport {
    let mut report = QaReport {
        split: split.to_string(),
        total_records: records.len(),
        violation_rate: 0.0,
        refuse_rate: 0.0,
        negative_rate: 0.0,
        role_distribution: BTreeMap::new(),
        policy_distribution: BTreeMap::new(),
        db_refuse_rates: BTreeMap::new(),
        warnings: Vec::new(),
    };
    if records.is_empty() {
        report.warnings.push("No data found".to_string());
        return report;
    }

    let total = records.len() as f64;
    let share = |count: usize| count as f64 / total;

    report.violation_rate = share(records.iter().filter(|r| r.has_violations()).count());
    if report.violation_rate < 0.10 {
        report.warnings.push(format!(
            "Q1: Violation rate too low: {} (expected >10%)",
            percent(report.violation_rate)
        ));
    } else if report.violation_rate > 0.30 {
        report.warnings.push(format!(
            "Q1: Violation rate too high: {} (expected <30%)",
            percent(report.violation_rate)
        ));
    }

    report.refuse_rate = share(records.iter().filter(|r| r.gold_label.is_refuse()).count());
    if report.refuse_rate < 0.05 {
        report.warnings.push(format!(
            "Q2: REFUSE rate too low: {} (expected >5%)",
            percent(report.refuse_rate)
        ));
    } else if report.refuse_rate > 0.15 {
        report.warnings.push(format!(
            "Q2: REFUSE rate too high: {} (expected <15%)",
            percent(report.refuse_rate)
        ));
    }

    let mut per_db: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for record in records {
        let entry = per_db.entry(record.db_id.as_str()).or_default();
        entry.0 += 1;
        if record.gold_label.is_refuse() {
            entry.1 += 1;
        }
    }
    report.db_refuse_rates = per_db
        .into_iter()
        .map(|(db, (count, refused))| (db.to_string(), refused as f64 / count as f64))
        .collect();
    let rates: Vec<f64> = report.db_refuse_rates.values().copied().collect();
    if let Some(deviation) = sample_std_dev(&rates) {
        if deviation > 0.3 {
            report.warnings.push(format!(
                "Q3: High DB REFUSE rate variance: stdev={deviation:.2} (expected <0.3)"
            ));
        }
    }

    report.negative_rate = share(
        records
            .iter()
            .filter(|r| !r.negative_examples.is_empty())
            .count(),
    );
    let invalid_negatives = records
        .iter()
        .flat_map(|r| &r.negative_examples)
        .filter(|n| n.violations.len() != 1)
        .count();
    if invalid_negatives > 0 {
        report.warnings.push(format!(
            "Q4: {invalid_negatives} negative examples with edit distance != 1"
        ));
    }

    for violation in records.iter().flat_map(|r| &r.violations_original) {
        *report.role_distribution.entry(violation.role).or_default() += 1;
        *report.policy_distribution.entry(violation.policy).or_default() += 1;
    }
    let total_violations: usize = report.role_distribution.values().sum();
    if total_violations > 0 {
        let join_share = report
            .role_distribution
            .get(&Role::JoinCond)
            .copied()
            .unwrap_or(0) as f64
            / total_violations as f64;
        if join_share < 0.05 {
            report.warnings.push(format!(
                "Q5: JoinCond violations very rare: {} (expected >5%)",
                percent(join_share)
            ));
        }
    }

    report
}

/// Bessel-corrected standard deviation; `None` below two samples.
fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(variance.sqrt())
}

fn percent(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}

/// Policy coverage across every classified database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyStats {
    /// Columns per policy.
    pub policy_counts: BTreeMap<Policy, usize>,
    /// Tables with at least one classified column.
    pub tables: usize,
    /// Tables with a `Hidden` column.
    pub tables_with_hidden: usize,
    /// Tables with an `AggOnly` column.
    pub tables_with_agg_only: usize,
    /// Databases considered.
    pub databases: usize,
    /// Databases with a `Hidden` or `AggOnly` column.
    pub databases_with_sensitive: usize,
}

impl PolicyStats {
    /// Tally `maps`, one per database.
    pub fn collect<'a>(maps: impl IntoIterator<Item = &'a PolicyMap>) -> Self {
        let mut stats = PolicyStats::default();
        for map in maps {
            stats.databases += 1;
            let mut per_table: BTreeMap<&str, BTreeSet<Policy>> = BTreeMap::new();
            for (column, policy) in map.iter() {
                *stats.policy_counts.entry(policy).or_default() += 1;
                per_table
                    .entry(table_of_qualified(column))
                    .or_default()
                    .insert(policy);
            }
            for policies in per_table.values() {
                stats.tables += 1;
                stats.tables_with_hidden += usize::from(policies.contains(&Policy::Hidden));
                stats.tables_with_agg_only += usize::from(policies.contains(&Policy::AggOnly));
            }
            if map
                .iter()
                .any(|(_, p)| matches!(p, Policy::Hidden | Policy::AggOnly))
            {
                stats.databases_with_sensitive += 1;
            }
        }
        stats
    }

    /// Total classified columns.
    pub fn columns(&self) -> usize {
        self.policy_counts.values().sum()
    }
}

/// Markdown rendering of policy coverage and per-split QA results.
pub struct QaSummary<'a> {
    /// Policy coverage.
    pub stats: &'a PolicyStats,
    /// One report per split.
    pub reports: &'a [QaReport],
}

impl fmt::Display for QaSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# sqlpolicy Dataset Report")?;
        writeln!(f)?;

        writeln!(f, "## Policy Distribution")?;
        writeln!(f)?;
        writeln!(f, "| Policy | Columns | Share |")?;
        writeln!(f, "|--------|---------|-------|")?;
        let columns = self.stats.columns();
        for policy in Policy::ALL {
            let count = self.stats.policy_counts.get(&policy).copied().unwrap_or(0);
            writeln!(
                f,
                "| {policy} | {count} | {} |",
                ratio(count, columns)
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "- Tables with Hidden: {}",
            ratio(self.stats.tables_with_hidden, self.stats.tables)
        )?;
        writeln!(
            f,
            "- Tables with AggOnly: {}",
            ratio(self.stats.tables_with_agg_only, self.stats.tables)
        )?;
        writeln!(
            f,
            "- DBs with Hidden or AggOnly: {}",
            ratio(self.stats.databases_with_sensitive, self.stats.databases)
        )?;

        for report in self.reports {
            writeln!(f)?;
            writeln!(f, "## Split `{}`", report.split)?;
            writeln!(f)?;
            writeln!(f, "| Metric | Value |")?;
            writeln!(f, "|--------|-------|")?;
            writeln!(f, "| Records | {} |", report.total_records)?;
            writeln!(f, "| Violation rate | {} |", percent(report.violation_rate))?;
            writeln!(f, "| REFUSE rate | {} |", percent(report.refuse_rate))?;
            writeln!(f, "| Negative rate | {} |", percent(report.negative_rate))?;

            if !report.role_distribution.is_empty() {
                writeln!(f)?;
                writeln!(f, "Violations by role:")?;
                for (role, count) in &report.role_distribution {
                    writeln!(f, "- {role}: {count}")?;
                }
            }
            if !report.policy_distribution.is_empty() {
                writeln!(f)?;
                writeln!(f, "Violations by policy:")?;
                for (policy, count) in &report.policy_distribution {
                    writeln!(f, "- {policy}: {count}")?;
                }
            }

            writeln!(f)?;
            if report.warnings.is_empty() {
                writeln!(f, "No warnings.")?;
            } else {
                writeln!(f, "Warnings:")?;
                for warning in &report.warnings {
                    writeln!(f, "- {warning}")?;
                }
            }
        }
        Ok(())
    }
}

fn ratio(count: usize, total: usize) -> String {
    if total == 0 {
        return "n/a".to_string();
    }
    percent(count as f64 / total as f64)
}

/// Build the Markdown dataset report.
pub fn build_report(stats: &PolicyStats, reports: &[QaReport]) -> String {
    QaSummary { stats, reports }.to_string()
}
