//! Raw result loading.
//!
//! Reads the score files of one run and concatenates them, in source order,
//! into a single [`ResultTable`] tagged with canonical framework names.
//! Absent files and runs without sources yield empty tables, not errors.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::domain::{
    ExecutionRecord, PreparationWarning, ProblemType, Result, ResultTable, ResultsError,
    RunDefinition, Task, TaskMetadata,
};
use crate::metrics::METRICS;
use crate::obs;

/// Output of loading one run.
#[derive(Debug, Clone, Default)]
pub struct LoadedRun {
    pub table: ResultTable,
    pub warnings: Vec<PreparationWarning>,
}

/// Load every source of `run` in order.
pub fn load_run(run: &RunDefinition, error_max_length: usize) -> Result<LoadedRun> {
    let mut loaded = LoadedRun::default();
    let mut found = 0;

    for path in &run.sources {
        if !path.is_file() {
            warn!(run = %run.name, path = %path.display(), "result source not found, skipping");
            continue;
        }
        found += 1;
        let file = std::fs::File::open(path)?;
        let part = read_records(file, &path.display().to_string(), run, error_max_length)?;
        loaded.table = loaded.table.concat(part.table);
        loaded.warnings.extend(part.warnings);
    }

    if found == 0 {
        obs::emit_empty_source(&run.name);
        loaded.warnings.push(PreparationWarning::EmptySource {
            run: run.name.clone(),
        });
        return Ok(loaded);
    }

    METRICS.add_rows_loaded(loaded.table.len() as u64);
    obs::emit_sources_loaded(&run.name, found, loaded.table.len());
    Ok(loaded)
}

/// Column positions of the fixed score-file layout.
#[derive(Default)]
struct Columns {
    by_name: BTreeMap<String, usize>,
}

impl Columns {
    fn new(headers: &csv::StringRecord) -> Self {
        let by_name = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim().to_string(), i))
            .collect();
        Self { by_name }
    }

    fn get<'r>(&self, record: &'r csv::StringRecord, name: &str) -> Option<&'r str> {
        self.by_name
            .get(name)
            .and_then(|&i| record.get(i))
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    fn has(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }
}

/// Parse score-file rows from any reader.
///
/// `source_name` is only used in diagnostics. Rows whose `framework` column
/// is empty or absent are tagged with the run name.
pub fn read_records<R: io::Read>(
    reader: R,
    source_name: &str,
    run: &RunDefinition,
    error_max_length: usize,
) -> Result<LoadedRun> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let cols = Columns::new(&headers);

    if !cols.has("task") || !cols.has("fold") {
        return Err(ResultsError::InvalidRecord {
            source_name: source_name.to_string(),
            row: 0,
            reason: "missing required `task` or `fold` column".to_string(),
        });
    }

    let mut loaded = LoadedRun::default();
    for (idx, row) in csv_reader.records().enumerate() {
        let row = row?;
        // header is line 1
        let line = idx + 2;

        let fold_raw = cols.get(&row, "fold").unwrap_or_default();
        let fold = parse_fold(fold_raw).ok_or_else(|| ResultsError::InvalidRecord {
            source_name: source_name.to_string(),
            row: line,
            reason: format!("invalid fold `{fold_raw}`"),
        })?;

        let label = cols.get(&row, "framework").unwrap_or(run.name.as_str());
        let mut record = ExecutionRecord {
            id: cols.get(&row, "id").map(String::from),
            task: cols.get(&row, "task").unwrap_or_default().to_string(),
            framework: run.canonical_framework(label).to_string(),
            constraint: cols.get(&row, "constraint").map(String::from),
            fold,
            metric: cols.get(&row, "metric").map(String::from),
            mode: cols.get(&row, "mode").map(String::from),
            version: cols.get(&row, "version").map(String::from),
            params: cols.get(&row, "params").map(String::from),
            app_version: cols.get(&row, "app_version").map(String::from),
            utc: cols.get(&row, "utc").map(String::from),
            duration: cols.get(&row, "duration").and_then(parse_number),
            training_duration: cols.get(&row, "training_duration").and_then(parse_number),
            predict_duration: cols.get(&row, "predict_duration").and_then(parse_number),
            models_count: cols.get(&row, "models_count").and_then(parse_number),
            seed: cols.get(&row, "seed").and_then(parse_seed),
            info: cols
                .get(&row, "info")
                .map(|s| truncate_message(s, error_max_length)),
            ..ExecutionRecord::default()
        };

        for (name, &i) in &cols.by_name {
            if ExecutionRecord::FIXED_COLUMNS.contains(&name.as_str()) {
                continue;
            }
            if let Some(v) = row.get(i).map(str::trim).filter(|v| !v.is_empty()) {
                record.extra.insert(name.clone(), v.to_string());
            }
        }

        match ResultValue::parse(cols.get(&row, "result")) {
            ResultValue::Number(v) => record.result = Some(v),
            ResultValue::Absent => {}
            ResultValue::Malformed(raw) => {
                let message = truncate_message(
                    &format!("non-numeric result `{raw}`"),
                    error_max_length,
                );
                record.push_info(&message);
                loaded.warnings.push(PreparationWarning::MalformedResult {
                    key: record.key(),
                    raw: raw.to_string(),
                });
            }
        }

        loaded.table.push(record);
    }

    debug!(source = %source_name, rows = loaded.table.len(), "source parsed");
    Ok(loaded)
}

enum ResultValue<'a> {
    Number(f64),
    Absent,
    Malformed(&'a str),
}

impl<'a> ResultValue<'a> {
    fn parse(raw: Option<&'a str>) -> Self {
        let Some(raw) = raw else {
            return Self::Absent;
        };
        if is_missing_token(raw) {
            return Self::Absent;
        }
        match raw.parse::<f64>() {
            Ok(v) if v.is_nan() => Self::Absent,
            Ok(v) => Self::Number(v),
            Err(_) => Self::Malformed(raw),
        }
    }
}

fn is_missing_token(raw: &str) -> bool {
    matches!(
        raw.to_ascii_lowercase().as_str(),
        "" | "nan" | "none" | "null" | "na"
    )
}

fn parse_number(raw: &str) -> Option<f64> {
    if is_missing_token(raw) {
        return None;
    }
    raw.parse::<f64>().ok().filter(|v| !v.is_nan())
}

/// Folds are small non-negative integers; float renderings like `3.0` are
/// accepted.
fn parse_fold(raw: &str) -> Option<u32> {
    if let Ok(f) = raw.parse::<u32>() {
        return Some(f);
    }
    let v = raw.parse::<f64>().ok()?;
    (v >= 0.0 && v.fract() == 0.0 && v <= f64::from(u32::MAX)).then_some(v as u32)
}

fn parse_seed(raw: &str) -> Option<i64> {
    raw.parse::<i64>()
        .ok()
        .or_else(|| parse_number(raw).filter(|v| v.fract() == 0.0).map(|v| v as i64))
}

/// Shorten a diagnostic to `max_len` characters, ending with `...` when cut.
pub fn truncate_message(message: &str, max_len: usize) -> String {
    if message.chars().count() <= max_len {
        return message.to_string();
    }
    let kept: String = message.chars().take(max_len.saturating_sub(3)).collect();
    format!("{kept}...")
}

/// Problem type implied by a task's main metric.
pub fn infer_problem_type(metric: &str) -> Option<ProblemType> {
    match metric.trim().to_ascii_lowercase().trim_start_matches("neg_") {
        "auc" => Some(ProblemType::Binary),
        "logloss" => Some(ProblemType::Multiclass),
        "rmse" | "mae" | "mse" | "msle" | "rmsle" | "r2" => Some(ProblemType::Regression),
        _ => None,
    }
}

/// Task metadata observable from result rows: task id, main metric and the
/// problem type that metric implies.
pub fn metadata_from_records(table: &ResultTable) -> TaskMetadata {
    table
        .iter()
        .filter(|r| !r.task.trim().is_empty())
        .map(|r| {
            let mut task = Task::new(r.task.clone());
            if let Some(id) = &r.id {
                task.id = id.clone();
            }
            task.metric = r.metric.clone();
            task.problem_type = r.metric.as_deref().and_then(infer_problem_type);
            task
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct TaskMetadataRow {
    #[serde(alias = "name")]
    task: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default, rename = "type")]
    problem_type: Option<String>,
    #[serde(default)]
    metric: Option<String>,
    #[serde(default)]
    nrows: Option<u64>,
    #[serde(default)]
    nfeatures: Option<u64>,
    #[serde(default)]
    nclasses: Option<u32>,
}

/// Load a task metadata CSV (`task`, `id`, `type`, `metric`, `nrows`,
/// `nfeatures`, `nclasses`; only `task` is required).
pub fn load_task_metadata(path: &Path) -> Result<TaskMetadata> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;
    let mut metadata = TaskMetadata::new();
    for (idx, row) in reader.deserialize::<TaskMetadataRow>().enumerate() {
        let row = row?;
        let problem_type = match row.problem_type.as_deref().filter(|s| !s.is_empty()) {
            Some(s) => Some(s.parse::<ProblemType>().map_err(|reason| {
                ResultsError::InvalidRecord {
                    source_name: path.display().to_string(),
                    row: idx + 2,
                    reason,
                }
            })?),
            None => None,
        };
        let mut task = Task::new(row.task.clone());
        task.id = row.id.filter(|s| !s.is_empty()).unwrap_or(row.task);
        task.problem_type = problem_type;
        task.metric = row.metric.filter(|s| !s.is_empty());
        task.nrows = row.nrows;
        task.nfeatures = row.nfeatures;
        task.nclasses = row.nclasses;
        metadata.observe(task);
    }
    Ok(metadata)
}
