//! Score derivation: raw metric `result` → higher-is-better `score`.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{orientation_of, ExecutionRecord, Orientation, ResultTable, TaskMetadata};

/// Monotonic inverse applied to lower-is-better results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreInverse {
    /// `score = -result`
    #[default]
    Negate,
    /// `score = 1 / (1 + result)`; intended for non-negative error metrics.
    Reciprocal,
}

impl ScoreInverse {
    fn apply(self, result: f64) -> f64 {
        match self {
            Self::Negate => -result,
            Self::Reciprocal => 1.0 / (1.0 + result),
        }
    }
}

/// Rules used to orient metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringRules {
    /// Orientation overrides by metric name (checked before the catalogue).
    #[serde(default)]
    pub overrides: BTreeMap<String, Orientation>,
    #[serde(default)]
    pub inverse: ScoreInverse,
}

impl ScoringRules {
    /// Orientation of a metric name, `None` when the metric is unknown.
    pub fn orientation(&self, metric: &str) -> Option<Orientation> {
        self.overrides
            .get(metric)
            .copied()
            .or_else(|| orientation_of(metric))
    }
}

/// Score of a single result. Higher is always better.
pub fn derive_score(result: f64, orientation: Orientation, inverse: ScoreInverse) -> f64 {
    match orientation {
        Orientation::HigherIsBetter => result,
        Orientation::LowerIsBetter => inverse.apply(result),
    }
}

/// Metric a record is scored with: its own `metric` column, else the task's
/// metric, else the default metric of the task's problem type.
pub fn metric_for(record: &ExecutionRecord, metadata: &TaskMetadata) -> Option<String> {
    if let Some(m) = record.metric.as_ref().filter(|m| !m.trim().is_empty()) {
        return Some(m.clone());
    }
    let task = metadata.get(&record.task)?;
    task.metric
        .clone()
        .or_else(|| task.problem_type.map(|p| p.default_metric().as_str().to_string()))
}

/// Set `score` on every record. Records without a result get no score.
///
/// Unknown metrics are scored as higher-is-better; each unknown metric name
/// is warned about once.
pub fn apply_scores(table: &mut ResultTable, metadata: &TaskMetadata, rules: &ScoringRules) {
    let mut unknown = BTreeSet::new();
    let mut scored = 0usize;

    for record in table.iter_mut() {
        let metric = metric_for(record, metadata);
        let orientation = match metric.as_deref() {
            Some(m) => rules.orientation(m).unwrap_or_else(|| {
                unknown.insert(m.to_string());
                Orientation::HigherIsBetter
            }),
            None => {
                unknown.insert(String::from("<none>"));
                Orientation::HigherIsBetter
            }
        };
        record.score = record
            .result
            .map(|r| derive_score(r, orientation, rules.inverse));
        if record.score.is_some() {
            scored += 1;
        }
    }

    for metric in &unknown {
        warn!(metric = %metric, "unknown metric orientation, assuming higher is better");
    }
    debug!(rows = table.len(), scored, "scores derived");
}
