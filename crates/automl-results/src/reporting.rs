//! Read-only reductions over prepared results and their on-disk artifacts.
//!
//! Nothing here mutates a [`PreparedResults`]; every function reads and
//! reduces.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::aggregate::PreparedResults;
use crate::domain::{
    ExecutionRecord, PreparationWarning, ProblemType, RecordState, ResultTable, RunDefinition,
};
use crate::pipeline::BenchmarkResults;

pub const SCHEMA_VERSION: &str = "1.0";

const LOW_PRECISION_COLUMNS: &[&str] = &["duration", "training_duration", "predict_duration"];

/// `value` with `digits` significant digits, trailing zeros removed.
pub fn format_significant(value: f64, digits: usize) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    let digits = digits.max(1);
    let exp = value.abs().log10().floor() as i32;
    if exp < -4 || exp >= digits as i32 {
        let s = format!("{:.*e}", digits - 1, value);
        return match s.split_once('e') {
            Some((mantissa, e)) => format!("{}e{}", trim_zeros(mantissa), e),
            None => s,
        };
    }
    let decimals = (digits as i32 - 1 - exp).max(0) as usize;
    trim_zeros(&format!("{value:.decimals$}")).to_string()
}

fn trim_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

fn cell(record: &ExecutionRecord, column: &str) -> String {
    let number = |v: Option<f64>| {
        v.map(|x| {
            if LOW_PRECISION_COLUMNS.contains(&column) {
                format!("{x:.1}")
            } else {
                format_significant(x, 6)
            }
        })
        .unwrap_or_default()
    };
    match column {
        "result" => number(record.result),
        "duration" => number(record.duration),
        "training_duration" => number(record.training_duration),
        "predict_duration" => number(record.predict_duration),
        "models_count" => number(record.models_count),
        "score" => number(record.score),
        "imp_result" => number(record.imp_result),
        "imp_score" => number(record.imp_score),
        "norm_score" => number(record.norm_score),
        other => record.column(other).unwrap_or_default(),
    }
}

/// Column order of an exported table: fixed columns, derived columns, then
/// the dynamic metric columns in name order.
pub fn export_columns(table: &ResultTable) -> Vec<String> {
    let dynamic: BTreeSet<&str> = table
        .iter()
        .flat_map(|r| r.extra.keys().map(String::as_str))
        .filter(|k| {
            !ExecutionRecord::FIXED_COLUMNS.contains(k)
                && !ExecutionRecord::DERIVED_COLUMNS.contains(k)
        })
        .collect();
    ExecutionRecord::FIXED_COLUMNS
        .iter()
        .chain(ExecutionRecord::DERIVED_COLUMNS)
        .copied()
        .chain(dynamic)
        .map(String::from)
        .collect()
}

/// Write a table as CSV. Missing values are empty cells.
pub fn export_csv<W: io::Write>(table: &ResultTable, writer: W) -> Result<()> {
    let columns = export_columns(table);
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(&columns).context("write csv header")?;
    for record in table {
        out.write_record(columns.iter().map(|c| cell(record, c)))
            .context("write csv row")?;
    }
    out.flush().context("flush csv")?;
    Ok(())
}

pub fn write_csv(path: &Path, table: &ResultTable) -> Result<()> {
    let file = std::fs::File::create(path).with_context(|| format!("create {:?}", path))?;
    export_csv(table, file).with_context(|| format!("write {:?}", path))
}

fn mean(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let (sum, n) = values
        .flatten()
        .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Per (task, framework) reduction of the fold rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub task: String,
    pub framework: String,
    pub problem_type: Option<ProblemType>,
    pub folds: usize,
    pub done: usize,
    pub failed: usize,
    pub missing: usize,
    pub imputed: usize,
    pub result: Option<f64>,
    pub score: Option<f64>,
    pub imp_score: Option<f64>,
    pub norm_score: Option<f64>,
}

/// Summaries sorted by task, then framework.
pub fn summarize(prepared: &PreparedResults) -> Vec<TaskSummary> {
    let mut groups: BTreeMap<(&str, &str), Vec<&ExecutionRecord>> = BTreeMap::new();
    for r in &prepared.results {
        groups
            .entry((r.task.as_str(), r.framework.as_str()))
            .or_default()
            .push(r);
    }

    groups
        .into_iter()
        .map(|((task, framework), rows)| {
            let count = |state: RecordState| rows.iter().filter(|r| r.state == Some(state)).count();
            TaskSummary {
                task: task.to_string(),
                framework: framework.to_string(),
                problem_type: prepared.metadata.problem_type(task),
                folds: rows.len(),
                done: count(RecordState::Done),
                failed: count(RecordState::Failed),
                missing: count(RecordState::Missing),
                imputed: rows.iter().filter(|r| r.is_imputed()).count(),
                result: mean(rows.iter().map(|r| r.result)),
                score: mean(rows.iter().map(|r| r.score)),
                imp_score: mean(rows.iter().map(|r| r.imp_score)),
                norm_score: mean(rows.iter().map(|r| r.norm_score)),
            }
        })
        .collect()
}

/// Ranks of `values`, 1 for the highest; tied values share their average
/// rank.
fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[b].total_cmp(&values[a]));
    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = rank;
        }
        i = j + 1;
    }
    ranks
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub problem_type: Option<ProblemType>,
    pub framework: String,
    /// Mean over tasks of the framework's rank by mean imputed score.
    pub mean_rank: f64,
    /// Tasks the framework could be ranked on.
    pub tasks: usize,
    pub norm_score: Option<f64>,
}

/// Frameworks ranked per problem type, best first.
pub fn leaderboard(summaries: &[TaskSummary]) -> Vec<LeaderboardEntry> {
    let mut by_type: BTreeMap<Option<ProblemType>, BTreeMap<&str, Vec<&TaskSummary>>> =
        BTreeMap::new();
    for s in summaries {
        by_type
            .entry(s.problem_type)
            .or_default()
            .entry(s.task.as_str())
            .or_default()
            .push(s);
    }

    let mut entries = Vec::new();
    for (problem_type, tasks) in by_type {
        let mut ranks: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        let mut norms: BTreeMap<&str, Vec<Option<f64>>> = BTreeMap::new();
        for rows in tasks.values() {
            let scored: Vec<(&str, f64)> = rows
                .iter()
                .filter_map(|s| s.imp_score.map(|v| (s.framework.as_str(), v)))
                .collect();
            let values: Vec<f64> = scored.iter().map(|(_, v)| *v).collect();
            for ((framework, _), rank) in scored.iter().zip(average_ranks(&values)) {
                ranks.entry(*framework).or_default().push(rank);
            }
            for s in rows {
                norms.entry(s.framework.as_str()).or_default().push(s.norm_score);
            }
        }

        let mut group: Vec<LeaderboardEntry> = ranks
            .into_iter()
            .map(|(framework, r)| LeaderboardEntry {
                problem_type,
                framework: framework.to_string(),
                mean_rank: r.iter().sum::<f64>() / r.len() as f64,
                tasks: r.len(),
                norm_score: norms
                    .get(framework)
                    .and_then(|n| mean(n.iter().copied())),
            })
            .collect();
        group.sort_by(|a, b| {
            a.mean_rank
                .total_cmp(&b.mean_rank)
                .then_with(|| a.framework.cmp(&b.framework))
        });
        entries.extend(group);
    }
    entries
}

/// Serialize rows of any record type to CSV.
pub fn write_rows_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut out = csv::Writer::from_path(path).with_context(|| format!("create {:?}", path))?;
    for row in rows {
        out.serialize(row).with_context(|| format!("write {:?}", path))?;
    }
    out.flush().with_context(|| format!("flush {:?}", path))?;
    Ok(())
}

/// Fold counts per state for one framework.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCounts {
    pub framework: String,
    pub done: usize,
    pub failed: usize,
    pub missing: usize,
    pub imputed: usize,
}

/// State counts per framework, in framework name order.
pub fn state_counts(prepared: &PreparedResults) -> Vec<StateCounts> {
    let mut counts: BTreeMap<&str, StateCounts> = BTreeMap::new();
    for r in &prepared.results {
        let c = counts.entry(r.framework.as_str()).or_insert_with(|| StateCounts {
            framework: r.framework.clone(),
            ..StateCounts::default()
        });
        match r.state {
            Some(RecordState::Done) => c.done += 1,
            Some(RecordState::Failed) => c.failed += 1,
            Some(RecordState::Missing) => c.missing += 1,
            None => {}
        }
        if r.is_imputed() {
            c.imputed += 1;
        }
    }
    counts.into_values().collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDigest {
    pub path: String,
    pub sha256: String,
}

pub fn digest_file(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("read {:?}", path))?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Digests of every existing source of `runs`, in run order.
pub fn source_digests(runs: &[RunDefinition]) -> Result<Vec<SourceDigest>> {
    let mut out = Vec::new();
    for path in runs.iter().flat_map(|r| r.sources.iter()) {
        if !path.is_file() {
            continue;
        }
        out.push(SourceDigest {
            path: path.display().to_string(),
            sha256: digest_file(path)?,
        });
    }
    Ok(out)
}

/// Artifact persisted as `report.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    pub frameworks: Vec<String>,
    pub tasks: usize,
    pub states: Vec<StateCounts>,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub warnings: Vec<PreparationWarning>,
    pub sources: Vec<SourceDigest>,
}

impl BenchmarkReport {
    pub fn new(
        results: &BenchmarkResults,
        sources: Vec<SourceDigest>,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let summaries = summarize(&results.combined);
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            generated_at,
            frameworks: results.combined.frameworks(),
            tasks: results.combined.results.tasks().len(),
            states: state_counts(&results.combined),
            leaderboard: leaderboard(&summaries),
            warnings: results.warnings().to_vec(),
            sources,
        }
    }
}

/// Write report.json in pretty JSON format.
pub fn write_report_json(path: &Path, report: &BenchmarkReport) -> Result<()> {
    let content = serde_json::to_string_pretty(report).context("serialize benchmark report")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

fn opt(v: Option<f64>) -> String {
    v.map(|x| format_significant(x, 4))
        .unwrap_or_else(|| "-".to_string())
}

fn problem_label(p: Option<ProblemType>) -> &'static str {
    p.map_or("unknown", ProblemType::as_str)
}

/// Render the markdown summary.
pub fn render_summary_md(report: &BenchmarkReport) -> String {
    let mut out = String::new();
    out.push_str("# Benchmark Summary\n\n");
    out.push_str(&format!(
        "- frameworks: {}\n- tasks: {}\n- warnings: {}\n\n",
        report.frameworks.len(),
        report.tasks,
        report.warnings.len()
    ));

    out.push_str("## States\n");
    out.push_str("| framework | done | failed | missing | imputed |\n");
    out.push_str("|---|---|---|---|---|\n");
    for s in &report.states {
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            s.framework, s.done, s.failed, s.missing, s.imputed
        ));
    }
    out.push('\n');

    let mut current: Option<Option<ProblemType>> = None;
    for e in &report.leaderboard {
        if current != Some(e.problem_type) {
            out.push_str(&format!("## Leaderboard ({})\n", problem_label(e.problem_type)));
            out.push_str("| framework | mean rank | tasks | norm score |\n");
            out.push_str("|---|---|---|---|\n");
            current = Some(e.problem_type);
        }
        out.push_str(&format!(
            "| {} | {:.2} | {} | {} |\n",
            e.framework,
            e.mean_rank,
            e.tasks,
            opt(e.norm_score)
        ));
    }
    out
}

/// Write summary.md.
pub fn write_summary_md(path: &Path, report: &BenchmarkReport) -> Result<()> {
    std::fs::write(path, render_summary_md(report)).with_context(|| format!("write {:?}", path))?;
    Ok(())
}
