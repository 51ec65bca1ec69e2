//! CLI entry point for `sqlpolicy`.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use sqlpolicy::classifier::overrides::load_overrides;
use sqlpolicy::classifier::rules::RuleSet;
use sqlpolicy::generator::rewriter::RewriteConfig;
use sqlpolicy::model::catalog::load_catalogs;
use sqlpolicy::output::formatter;
use sqlpolicy::output::report::{build_report, run_qa_check, PolicyStats};
use sqlpolicy::parser::spider::load_examples;
use sqlpolicy::pipeline::{build_contexts, process_split};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "sqlpolicy",
    about = "Label Spider queries against per-column usage policies"
)]
struct Cli {
    /// Spider data directory
    #[arg(long, default_value = "spider_data")]
    spider_dir: PathBuf,

    /// Schema file, relative to the Spider directory
    #[arg(long, default_value = "tables.json")]
    tables: PathBuf,

    /// Split to process as NAME=FILE (FILE relative to the Spider directory)
    #[arg(long = "split", value_parser = parse_split, default_values_t = default_splits())]
    splits: Vec<SplitArg>,

    /// Output directory
    #[arg(long, default_value = "data")]
    output_dir: PathBuf,

    /// JSON list of manual policy overrides
    #[arg(long)]
    overrides: Option<PathBuf>,

    /// JSON classification rule list replacing the built-in rules
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Upper bound on rewrite passes
    #[arg(long, default_value_t = RewriteConfig::default().max_passes)]
    max_passes: usize,

    /// Print debug diagnostics
    #[arg(long)]
    verbose: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SplitArg {
    name: String,
    file: PathBuf,
}

impl std::fmt::Display for SplitArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.name, self.file.display())
    }
}

fn parse_split(value: &str) -> Result<SplitArg, String> {
    let (name, file) = value
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=FILE, got '{value}'"))?;
    if name.is_empty() || file.is_empty() {
        return Err(format!("expected NAME=FILE, got '{value}'"));
    }
    Ok(SplitArg {
        name: name.to_string(),
        file: PathBuf::from(file),
    })
}

fn default_splits() -> Vec<SplitArg> {
    vec![
        SplitArg {
            name: "train".to_string(),
            file: PathBuf::from("train_spider.json"),
        },
        SplitArg {
            name: "dev".to_string(),
            file: PathBuf::from("dev.json"),
        },
    ]
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let catalogs = match load_catalogs(&cli.spider_dir.join(&cli.tables)) {
        Ok(catalogs) => catalogs,
        Err(e) => {
            eprintln!("Error loading schemas: {e}");
            process::exit(2);
        }
    };
    info!(databases = catalogs.len(), "loaded schemas");

    let rules = match &cli.rules {
        Some(path) => match RuleSet::load(path) {
            Ok(rules) => rules,
            Err(e) => {
                eprintln!("Error loading classification rules: {e}");
                process::exit(2);
            }
        },
        None => RuleSet::default(),
    };

    let overrides = match &cli.overrides {
        Some(path) => match load_overrides(path) {
            Ok(overrides) => overrides,
            Err(e) => {
                eprintln!("Error loading overrides: {e}");
                process::exit(2);
            }
        },
        None => Vec::new(),
    };

    let contexts = build_contexts(catalogs, &rules, &overrides);
    if let Err(e) = formatter::write_policies(
        &cli.output_dir,
        contexts
            .iter()
            .map(|(db_id, context)| (db_id.as_str(), &context.policies)),
    ) {
        eprintln!("Error writing policies: {e}");
        process::exit(2);
    }
    let stats = PolicyStats::collect(contexts.values().map(|context| &context.policies));

    let config = RewriteConfig {
        max_passes: cli.max_passes,
        ..RewriteConfig::default()
    };

    let mut reports = Vec::with_capacity(cli.splits.len());
    for split in &cli.splits {
        let examples = match load_examples(&cli.spider_dir.join(&split.file)) {
            Ok(examples) => examples,
            Err(e) => {
                eprintln!("Error loading split '{}': {e}", split.name);
                process::exit(2);
            }
        };
        let records = match process_split(&split.name, &examples, &contexts, &config) {
            Ok(records) => records,
            Err(e) => {
                eprintln!("Error processing split '{}': {e}", split.name);
                process::exit(2);
            }
        };
        if let Err(e) = formatter::write_dataset(&cli.output_dir, &split.name, &records) {
            eprintln!("Error writing split '{}': {e}", split.name);
            process::exit(2);
        }

        let report = run_qa_check(&records, &split.name);
        for warning in &report.warnings {
            warn!(split = %split.name, "{warning}");
        }
        reports.push(report);
    }

    let markdown = build_report(&stats, &reports);
    if let Err(e) = formatter::write_qa_reports(&cli.output_dir, &reports, &markdown) {
        eprintln!("Error writing QA report: {e}");
        process::exit(2);
    }

    // Exit code 1 flags datasets that miss a QA threshold.
    if reports.iter().any(|report| !report.is_clean()) {
        process::exit(1);
    }
}
