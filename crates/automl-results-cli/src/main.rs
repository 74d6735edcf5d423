//! automl-results - AutoML benchmark results preparation CLI
//!
//! ## Commands
//!
//! - `prepare`: Run the preparation pipeline and write tables and reports
//! - `states`: Print done/failed/missing fold counts per framework
//! - `inspect`: Show what score file names say about their content

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};

use automl_results::reporting::{
    leaderboard, source_digests, state_counts, summarize, write_csv, write_report_json,
    write_rows_csv, write_summary_md, BenchmarkReport,
};
use automl_results::telemetry::{init_tracing, LogFormat};
use automl_results::{infer_runs, prepare_benchmark, BenchmarkConfig, ImputationPolicy, ScoreFile};

#[derive(Parser)]
#[command(name = "automl-results")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Prepare AutoML benchmark results for cross-framework comparison", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prepare every configured run and write result tables and reports
    Prepare {
        /// Benchmark configuration (TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Directory scanned for score files when the config has no runs
        #[arg(short, long)]
        results: Option<PathBuf>,

        /// Output directory
        #[arg(short, long, default_value = "prepared")]
        output: PathBuf,
    },

    /// Print fold state counts per framework
    States {
        /// Benchmark configuration (TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Directory scanned for score files when the config has no runs
        #[arg(short, long)]
        results: Option<PathBuf>,
    },

    /// Parse score file names
    Inspect {
        /// Score files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let format = if cli.json {
        LogFormat::Json
    } else {
        LogFormat::from_env()
    };
    init_tracing(format, level);

    match cli.command {
        Commands::Prepare {
            config,
            results,
            output,
        } => cmd_prepare(&config, results.as_deref(), &output),
        Commands::States { config, results } => cmd_states(&config, results.as_deref()),
        Commands::Inspect { files } => cmd_inspect(&files),
    }
}

/// Load a configuration, expand source globs and fall back to runs inferred
/// from a results directory.
fn load_config(path: &Path, results_dir: Option<&Path>) -> Result<BenchmarkConfig> {
    let mut config = BenchmarkConfig::from_file(path)
        .with_context(|| format!("Failed to load config {:?}", path))?;

    for run in &mut config.runs {
        run.sources = expand_sources(&run.sources)
            .with_context(|| format!("Failed to expand sources of run {}", run.name))?;
    }

    if config.runs.is_empty() {
        let Some(dir) = results_dir else {
            bail!("config {:?} defines no runs and no --results directory was given", path);
        };
        config.runs = runs_from_directory(dir, &config)?;
    }
    Ok(config)
}

/// Expand glob patterns in order. Each pattern's matches are sorted; a
/// pattern without matches is kept verbatim so the loader can report it.
fn expand_sources(patterns: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for pattern in patterns {
        let text = pattern.to_string_lossy();
        let mut matches: Vec<PathBuf> = glob::glob(&text)
            .with_context(|| format!("Invalid source pattern {text}"))?
            .filter_map(|entry| entry.ok())
            .collect();
        if matches.is_empty() {
            out.push(pattern.clone());
        } else {
            matches.sort();
            out.extend(matches);
        }
    }
    Ok(out)
}

/// Frameworks used as imputation or normalization reference.
fn reference_frameworks(config: &BenchmarkConfig) -> Vec<String> {
    let mut refs = Vec::new();
    if let Some(ImputationPolicy::Framework { framework }) = &config.imputation {
        refs.push(framework.clone());
    }
    if let Some(normalization) = &config.normalization {
        refs.push(normalization.zero.framework.clone());
    }
    refs
}

fn runs_from_directory(
    dir: &Path,
    config: &BenchmarkConfig,
) -> Result<Vec<automl_results::RunDefinition>> {
    let pattern = dir.join("**").join("*.csv");
    let files = expand_sources(&[pattern])?
        .into_iter()
        .filter(|p| p.is_file())
        .collect::<Vec<_>>();
    let (mut runs, unknown) = infer_runs(&files);
    for path in &unknown {
        warn!(path = %path.display(), "cannot tell the framework of score file, skipping");
    }
    let refs = reference_frameworks(config);
    for run in &mut runs {
        run.reference = refs.contains(&run.name);
    }
    info!(dir = %dir.display(), runs = runs.len(), "runs inferred from score files");
    Ok(runs)
}

fn cmd_prepare(config_path: &Path, results_dir: Option<&Path>, output: &Path) -> Result<()> {
    let config = load_config(config_path, results_dir)?;
    let results = prepare_benchmark(&config).context("Failed to prepare results")?;

    std::fs::create_dir_all(output)
        .with_context(|| format!("Failed to create output directory {:?}", output))?;

    let combined = &results.combined;
    write_csv(&output.join("results.csv"), &combined.results)?;
    write_csv(&output.join("done.csv"), &combined.done)?;
    write_csv(&output.join("failed.csv"), &combined.failed)?;
    write_csv(&output.join("missing.csv"), &combined.missing)?;

    let summaries = summarize(combined);
    write_rows_csv(&output.join("summary.csv"), &summaries)?;
    write_rows_csv(&output.join("leaderboard.csv"), &leaderboard(&summaries))?;

    let sources = source_digests(&config.runs)?;
    let report = BenchmarkReport::new(&results, sources, chrono::Utc::now());
    write_report_json(&output.join("report.json"), &report)?;
    write_summary_md(&output.join("summary.md"), &report)?;

    println!(
        "Prepared {} run(s): {} frameworks, {} tasks",
        results.runs.len(),
        report.frameworks.len(),
        report.tasks
    );
    println!(
        "Folds:     {} done, {} failed, {} missing",
        combined.done.len(),
        combined.failed.len(),
        combined.missing.len()
    );
    if !report.warnings.is_empty() {
        println!("Warnings:  {}", report.warnings.len());
    }
    println!("Output:    {}", output.display());
    Ok(())
}

fn cmd_states(config_path: &Path, results_dir: Option<&Path>) -> Result<()> {
    let config = load_config(config_path, results_dir)?;
    let results = prepare_benchmark(&config).context("Failed to prepare results")?;

    println!(
        "{:<24} {:>6} {:>6} {:>8} {:>8}",
        "framework", "done", "failed", "missing", "imputed"
    );
    for c in state_counts(&results.merged) {
        println!(
            "{:<24} {:>6} {:>6} {:>8} {:>8}",
            c.framework, c.done, c.failed, c.missing, c.imputed
        );
    }
    Ok(())
}

fn cmd_inspect(files: &[PathBuf]) -> Result<()> {
    for path in files {
        match ScoreFile::parse(path) {
            Some(f) => println!(
                "{}: framework={} benchmark={} task={} constraint={} mode={}",
                path.display(),
                f.framework.as_deref().unwrap_or("-"),
                f.benchmark.as_deref().unwrap_or("-"),
                f.task.as_deref().unwrap_or("-"),
                f.constraint.as_deref().unwrap_or("-"),
                f.mode.as_deref().unwrap_or("-"),
            ),
            None => println!("{}: unrecognized score file name", path.display()),
        }
    }
    Ok(())
}
