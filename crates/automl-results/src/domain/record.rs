//! Execution records and result tables.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifying key of an execution record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub task: String,
    pub fold: u32,
    pub framework: String,
}

impl RecordKey {
    pub fn new(task: impl Into<String>, fold: u32, framework: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            fold,
            framework: framework.into(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.task, self.fold, self.framework)
    }
}

/// Execution state of an expected (task, fold, framework) combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    Done,
    Failed,
    Missing,
}

impl RecordState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Missing => "missing",
        }
    }
}

impl fmt::Display for RecordState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of a results table: a single task/fold/framework execution.
///
/// Raw columns are never modified once loaded; preparation stages only set
/// the derived columns (`score`, `imp_result`, `imp_score`, `norm_score`,
/// `state`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: Option<String>,
    pub task: String,
    pub framework: String,
    pub constraint: Option<String>,
    pub fold: u32,
    pub result: Option<f64>,
    pub metric: Option<String>,
    pub mode: Option<String>,
    pub version: Option<String>,
    pub params: Option<String>,
    pub app_version: Option<String>,
    pub utc: Option<String>,
    pub duration: Option<f64>,
    pub training_duration: Option<f64>,
    pub predict_duration: Option<f64>,
    pub models_count: Option<f64>,
    pub seed: Option<i64>,
    pub info: Option<String>,
    /// Columns outside the fixed layout (per-metric scores and the like).
    #[serde(default)]
    pub extra: BTreeMap<String, String>,

    pub score: Option<f64>,
    pub imp_result: Option<f64>,
    pub imp_score: Option<f64>,
    pub norm_score: Option<f64>,
    pub state: Option<RecordState>,
}

impl ExecutionRecord {
    /// Score-file columns with a dedicated field, in file order.
    pub const FIXED_COLUMNS: &'static [&'static str] = &[
        "id",
        "task",
        "framework",
        "constraint",
        "fold",
        "result",
        "metric",
        "mode",
        "version",
        "params",
        "app_version",
        "utc",
        "duration",
        "training_duration",
        "predict_duration",
        "models_count",
        "seed",
        "info",
    ];

    /// Columns computed during preparation.
    pub const DERIVED_COLUMNS: &'static [&'static str] =
        &["score", "imp_result", "imp_score", "norm_score", "state"];

    pub fn new(
        task: impl Into<String>,
        fold: u32,
        framework: impl Into<String>,
        result: Option<f64>,
    ) -> Self {
        Self {
            task: task.into(),
            fold,
            framework: framework.into(),
            result,
            ..Self::default()
        }
    }

    /// Placeholder row for an expected combination that never ran.
    pub fn missing(key: &RecordKey) -> Self {
        Self {
            task: key.task.clone(),
            fold: key.fold,
            framework: key.framework.clone(),
            state: Some(RecordState::Missing),
            ..Self::default()
        }
    }

    pub fn with_metric(mut self, metric: impl Into<String>) -> Self {
        self.metric = Some(metric.into());
        self
    }

    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = Some(info.into());
        self
    }

    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.task.clone(), self.fold, self.framework.clone())
    }

    /// Whether the record has the fields needed to identify it.
    pub fn has_key(&self) -> bool {
        !self.task.trim().is_empty() && !self.framework.trim().is_empty()
    }

    /// A fold counts as imputed when it carries an imputed value but no
    /// result of its own.
    pub fn is_imputed(&self) -> bool {
        self.result.is_none() && self.imp_result.is_some()
    }

    /// Append a diagnostic to `info`, keeping earlier diagnostics.
    pub fn push_info(&mut self, message: &str) {
        self.info = match self.info.take().filter(|s| !s.is_empty()) {
            Some(existing) => Some(format!("{existing}; {message}")),
            None => Some(message.to_string()),
        };
    }

    /// String rendering of a column by name, used by row filters.
    pub fn column(&self, name: &str) -> Option<String> {
        fn num(v: Option<f64>) -> Option<String> {
            v.map(|x| x.to_string())
        }
        match name {
            "id" => self.id.clone(),
            "task" => Some(self.task.clone()),
            "framework" => Some(self.framework.clone()),
            "constraint" => self.constraint.clone(),
            "fold" => Some(self.fold.to_string()),
            "result" => num(self.result),
            "metric" => self.metric.clone(),
            "mode" => self.mode.clone(),
            "version" => self.version.clone(),
            "params" => self.params.clone(),
            "app_version" => self.app_version.clone(),
            "utc" => self.utc.clone(),
            "duration" => num(self.duration),
            "training_duration" => num(self.training_duration),
            "predict_duration" => num(self.predict_duration),
            "models_count" => num(self.models_count),
            "seed" => self.seed.map(|s| s.to_string()),
            "info" => self.info.clone(),
            "score" => num(self.score),
            "imp_result" => num(self.imp_result),
            "imp_score" => num(self.imp_score),
            "norm_score" => num(self.norm_score),
            "state" => self.state.map(|s| s.as_str().to_string()),
            other => self.extra.get(other).cloned(),
        }
    }
}

/// An ordered table of execution records.
///
/// Row order is the concatenation order of the sources and is significant:
/// deduplication tie-breaks on it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultTable {
    records: Vec<ExecutionRecord>,
}

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ExecutionRecord> {
        self.records.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, ExecutionRecord> {
        self.records.iter_mut()
    }

    pub fn records(&self) -> &[ExecutionRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ExecutionRecord> {
        self.records
    }

    pub fn push(&mut self, record: ExecutionRecord) {
        self.records.push(record);
    }

    /// Append all rows of `other` after the rows of `self`.
    pub fn concat(mut self, other: ResultTable) -> Self {
        self.records.extend(other.records);
        self
    }

    pub fn filter<F>(&self, mut predicate: F) -> Self
    where
        F: FnMut(&ExecutionRecord) -> bool,
    {
        self.records
            .iter()
            .filter(|r| predicate(r))
            .cloned()
            .collect()
    }

    pub fn retain<F>(&mut self, predicate: F)
    where
        F: FnMut(&ExecutionRecord) -> bool,
    {
        self.records.retain(predicate);
    }

    /// Frameworks in order of first appearance.
    pub fn frameworks(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for r in &self.records {
            if seen.insert(r.framework.as_str()) {
                out.push(r.framework.clone());
            }
        }
        out
    }

    /// Sorted distinct task names.
    pub fn tasks(&self) -> BTreeSet<String> {
        self.records.iter().map(|r| r.task.clone()).collect()
    }

    /// Sorted distinct folds.
    pub fn folds(&self) -> BTreeSet<u32> {
        self.records.iter().map(|r| r.fold).collect()
    }

    pub fn for_framework(&self, framework: &str) -> Self {
        self.filter(|r| r.framework == framework)
    }

    pub fn for_task(&self, task: &str) -> Self {
        self.filter(|r| r.task == task)
    }

    /// First record with the given key.
    pub fn get(&self, key: &RecordKey) -> Option<&ExecutionRecord> {
        self.records
            .iter()
            .find(|r| r.fold == key.fold && r.task == key.task && r.framework == key.framework)
    }

    /// Sort rows by (framework, task, fold) for stable presentation.
    pub fn sort_by_key(&mut self) {
        self.records.sort_by(|a, b| {
            (&a.framework, &a.task, a.fold).cmp(&(&b.framework, &b.task, b.fold))
        });
    }
}

impl FromIterator<ExecutionRecord> for ResultTable {
    fn from_iter<I: IntoIterator<Item = ExecutionRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl From<Vec<ExecutionRecord>> for ResultTable {
    fn from(records: Vec<ExecutionRecord>) -> Self {
        Self { records }
    }
}

impl IntoIterator for ResultTable {
    type Item = ExecutionRecord;
    type IntoIter = std::vec::IntoIter<ExecutionRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultTable {
    type Item = &'a ExecutionRecord;
    type IntoIter = std::slice::Iter<'a, ExecutionRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl Extend<ExecutionRecord> for ResultTable {
    fn extend<I: IntoIterator<Item = ExecutionRecord>>(&mut self, iter: I) {
        self.records.extend(iter);
    }
}
