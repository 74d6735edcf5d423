//! Benchmark task metadata.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::metric::Metric;

/// Problem type of a benchmark task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemType {
    Binary,
    Multiclass,
    Regression,
}

impl ProblemType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Binary => "binary",
            Self::Multiclass => "multiclass",
            Self::Regression => "regression",
        }
    }

    /// Default metric reported for this problem type.
    pub fn default_metric(self) -> Metric {
        match self {
            Self::Binary => Metric::Auc,
            Self::Multiclass => Metric::Logloss,
            Self::Regression => Metric::Rmse,
        }
    }
}

impl fmt::Display for ProblemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProblemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "binary" => Ok(Self::Binary),
            "multiclass" => Ok(Self::Multiclass),
            "regression" => Ok(Self::Regression),
            other => Err(format!("unknown problem type: {other}")),
        }
    }
}

/// A single benchmark problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Identifier (the `id` column of result files, falls back to the name).
    pub id: String,
    pub name: String,
    pub problem_type: Option<ProblemType>,
    /// Metric the task is scored with.
    pub metric: Option<String>,
    pub nrows: Option<u64>,
    pub nfeatures: Option<u64>,
    pub nclasses: Option<u32>,
}

impl Task {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            problem_type: None,
            metric: None,
            nrows: None,
            nfeatures: None,
            nclasses: None,
        }
    }

    pub fn with_problem_type(mut self, problem_type: ProblemType) -> Self {
        self.problem_type = Some(problem_type);
        self
    }

    pub fn with_metric(mut self, metric: impl Into<String>) -> Self {
        self.metric = Some(metric.into());
        self
    }

    /// Fill unset fields of `self` from `other`, keeping what is already known.
    fn complete_from(&mut self, other: &Task) {
        if self.problem_type.is_none() {
            self.problem_type = other.problem_type;
        }
        if self.metric.is_none() {
            self.metric = other.metric.clone();
        }
        if self.nrows.is_none() {
            self.nrows = other.nrows;
        }
        if self.nfeatures.is_none() {
            self.nfeatures = other.nfeatures;
        }
        if self.nclasses.is_none() {
            self.nclasses = other.nclasses;
        }
    }

    fn conflicting_fields(&self, other: &Task) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.id != other.id {
            fields.push("id");
        }
        if differs(&self.problem_type, &other.problem_type) {
            fields.push("problem_type");
        }
        if differs(&self.metric, &other.metric) {
            fields.push("metric");
        }
        if differs(&self.nrows, &other.nrows) {
            fields.push("nrows");
        }
        if differs(&self.nfeatures, &other.nfeatures) {
            fields.push("nfeatures");
        }
        if differs(&self.nclasses, &other.nclasses) {
            fields.push("nclasses");
        }
        fields
    }
}

fn differs<T: PartialEq>(a: &Option<T>, b: &Option<T>) -> bool {
    matches!((a, b), (Some(x), Some(y)) if x != y)
}

/// A field on which two metadata sources disagree for the same task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataConflict {
    pub task: String,
    pub field: String,
}

/// Task metadata keyed by task name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskMetadata {
    tasks: BTreeMap<String, Task>,
}

impl TaskMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, task: &str) -> Option<&Task> {
        self.tasks.get(task)
    }

    pub fn contains(&self, task: &str) -> bool {
        self.tasks.contains_key(task)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(String::as_str)
    }

    pub fn problem_type(&self, task: &str) -> Option<ProblemType> {
        self.tasks.get(task).and_then(|t| t.problem_type)
    }

    /// Record what a single source knows about a task. Fields already known
    /// are kept; unknown ones are filled in.
    pub fn observe(&mut self, task: Task) {
        match self.tasks.get_mut(&task.name) {
            Some(existing) => existing.complete_from(&task),
            None => {
                self.tasks.insert(task.name.clone(), task);
            }
        }
    }

    /// Right-biased union: entries of `other` replace entries of `self` for
    /// the same task. Returns every field on which the two sides disagreed so
    /// the caller can surface the overwrite.
    pub fn merge(&mut self, other: &TaskMetadata) -> Vec<MetadataConflict> {
        let mut conflicts = Vec::new();
        for (name, task) in &other.tasks {
            if let Some(previous) = self.tasks.get(name) {
                conflicts.extend(previous.conflicting_fields(task).into_iter().map(|field| {
                    MetadataConflict {
                        task: name.clone(),
                        field: field.to_string(),
                    }
                }));
            }
            self.tasks.insert(name.clone(), task.clone());
        }
        conflicts
    }
}

impl FromIterator<Task> for TaskMetadata {
    fn from_iter<I: IntoIterator<Item = Task>>(iter: I) -> Self {
        let mut metadata = TaskMetadata::new();
        for task in iter {
            metadata.observe(task);
        }
        metadata
    }
}
