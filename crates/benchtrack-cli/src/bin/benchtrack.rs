use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use benchtrack_cli::{
    ConfigLoader, DuplicatePolicy, EnvOverrides, IngestOutcome, IngestRequest, Ingestor,
    TrackerConfig,
};
use benchtrack_history::{CommitRef, HistoryStore};
use benchtrack_regression::{parse_factor, RegressionDetector, RegressionReport};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Continuous benchmark history and regression checks
#[derive(Parser)]
#[command(name = "benchtrack")]
#[command(about = "Record CI benchmark results and flag performance regressions")]
#[command(version)]
struct Cli {
    /// Configuration file (yaml, toml or json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Thresholds {
    /// Ratio above which a result is WARN, e.g. 1.5 or 150%
    #[arg(long)]
    warn_factor: Option<String>,

    /// Ratio above which a result is ALERT, e.g. 2.0 or 200%
    #[arg(long)]
    alert_factor: Option<String>,

    /// Number of prior points in the baseline window
    #[arg(long)]
    window: Option<usize>,

    /// Exit with status 1 when any result is ALERT
    #[arg(long)]
    fail_on_alert: bool,

    /// Print the report as JSON instead of markdown
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse one run's output, append it to the history and classify it
    Ingest {
        /// History snapshot (.js for the dashboard script form, otherwise JSON)
        #[arg(short, long)]
        data: PathBuf,

        /// Benchmark suite name
        #[arg(short, long)]
        suite: String,

        /// Tool that produced the output (cargo, go, benchmarkjs, customSmallerIsBetter, customBiggerIsBetter)
        #[arg(short, long)]
        tool: String,

        /// File holding the raw benchmark output
        #[arg(short, long)]
        output: PathBuf,

        /// JSON file with the resolved commit
        #[arg(long)]
        commit: PathBuf,

        /// Ingestion time in epoch milliseconds (defaults to the time of commit)
        #[arg(long)]
        date: Option<i64>,

        /// Treat an already recorded commit as a no-op instead of an error
        #[arg(long)]
        allow_duplicate: bool,

        #[command(flatten)]
        thresholds: Thresholds,
    },
    /// Print one measurement's series as JSON lines
    Query {
        #[arg(short, long)]
        data: PathBuf,

        #[arg(short, long)]
        suite: String,

        /// Measurement name
        #[arg(short, long)]
        bench: String,
    },
    /// Classify the latest entry of a suite against its history
    Check {
        #[arg(short, long)]
        data: PathBuf,

        #[arg(short, long)]
        suite: String,

        #[command(flatten)]
        thresholds: Thresholds,
    },
    /// List suites with their entry counts
    Suites {
        #[arg(short, long)]
        data: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("❌ {:#}", e);
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Ingest {
            data,
            suite,
            tool,
            output,
            commit,
            date,
            allow_duplicate,
            thresholds,
        } => {
            apply_thresholds(&mut config, &thresholds)?;

            let raw_output = std::fs::read_to_string(&output)
                .with_context(|| format!("Failed to read benchmark output {}", output.display()))?;
            let commit: CommitRef = serde_json::from_str(
                &std::fs::read_to_string(&commit)
                    .with_context(|| format!("Failed to read commit {}", commit.display()))?,
            )
            .context("Commit file is not a valid commit object")?;

            let policy = if allow_duplicate {
                DuplicatePolicy::Skip
            } else {
                DuplicatePolicy::Reject
            };
            let ingestor = Ingestor::new(open_store(&data, &config), detector(&config)?)
                .with_duplicate_policy(policy);

            let outcome = ingestor
                .ingest(IngestRequest {
                    suite,
                    tool,
                    raw_output,
                    commit,
                    date,
                })
                .context("Ingestion failed")?;

            match outcome {
                IngestOutcome::Appended { report, .. } => {
                    print_report(&report, thresholds.json)?;
                    Ok(exit_for(&report, &config))
                }
                IngestOutcome::SkippedDuplicate { commit_id } => {
                    println!("⚠️  Commit {} already recorded; history unchanged", commit_id);
                    Ok(ExitCode::SUCCESS)
                }
            }
        }

        Commands::Query { data, suite, bench } => {
            let loaded = open_store(&data, &config).load()?;
            for point in loaded.snapshot.query(&suite, &bench) {
                let line = serde_json::json!({
                    "date": point.date,
                    "value": point.value,
                    "range": point.range,
                    "unit": point.unit,
                    "commit": point.commit_id,
                });
                println!("{}", line);
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Check {
            data,
            suite,
            thresholds,
        } => {
            apply_thresholds(&mut config, &thresholds)?;
            let loaded = open_store(&data, &config).load()?;
            let report = detector(&config)?
                .report_latest(&loaded.snapshot, &suite)
                .with_context(|| format!("Suite '{}' has no entries", suite))?;
            print_report(&report, thresholds.json)?;
            Ok(exit_for(&report, &config))
        }

        Commands::Suites { data } => {
            let loaded = open_store(&data, &config).load()?;
            for suite in loaded.snapshot.suites() {
                println!("{}\t{}", suite, loaded.snapshot.entries(suite).len());
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<TrackerConfig> {
    let mut config = match path {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => TrackerConfig::default(),
    };
    EnvOverrides::apply(&mut config)?;
    Ok(config)
}

fn apply_thresholds(config: &mut TrackerConfig, thresholds: &Thresholds) -> Result<()> {
    if let Some(raw) = &thresholds.warn_factor {
        config.regression.warn_factor = parse_factor(raw).map_err(anyhow::Error::msg)?;
    }
    if let Some(raw) = &thresholds.alert_factor {
        config.regression.alert_factor = parse_factor(raw).map_err(anyhow::Error::msg)?;
    }
    if let Some(window) = thresholds.window {
        config.regression.window = Some(window);
    }
    config.fail_on_alert |= thresholds.fail_on_alert;
    config.validate()?;
    Ok(())
}

fn open_store(data: &Path, config: &TrackerConfig) -> HistoryStore {
    HistoryStore::new(data)
        .with_repo_url(config.repo_url.clone())
        .with_options(config.store.to_options())
}

fn detector(config: &TrackerConfig) -> Result<RegressionDetector> {
    Ok(RegressionDetector::new(config.regression.clone())?)
}

fn print_report(report: &RegressionReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", report.to_markdown());
    }
    Ok(())
}

fn exit_for(report: &RegressionReport, config: &TrackerConfig) -> ExitCode {
    if report.has_alerts() && config.fail_on_alert {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}
