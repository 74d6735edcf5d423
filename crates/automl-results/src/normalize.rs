//! Score normalization onto a shared scale.
//!
//! Per task, two anchors are computed once: the zero anchor `z` from a
//! reference framework's aggregate score and the one anchor `o` (best
//! observed score by default). Each row then gets
//!
//! ```text
//! norm_score = value + (1 - value) * (score - z) / (o - z)
//! ```
//!
//! where `value` is the zero anchor's target (0 unless configured). A task
//! without a usable anchor is left unnormalized (`None` for every row).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{
    PreparationWarning, ReferencePurpose, Result, ResultTable, ResultsError,
};
use crate::metrics::METRICS;
use crate::obs;

/// Aggregate used to reduce a framework's fold scores to one anchor value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statistic {
    #[default]
    Mean,
    Median,
    Min,
    Max,
}

impl Statistic {
    /// `None` for an empty slice.
    pub fn apply(self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        let value = match self {
            Self::Mean => values.iter().sum::<f64>() / values.len() as f64,
            Self::Median => {
                let mut sorted = values.to_vec();
                sorted.sort_by(f64::total_cmp);
                let mid = sorted.len() / 2;
                if sorted.len() % 2 == 0 {
                    (sorted[mid - 1] + sorted[mid]) / 2.0
                } else {
                    sorted[mid]
                }
            }
            Self::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Self::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        };
        Some(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZeroAnchor {
    pub framework: String,
    #[serde(default)]
    pub statistic: Statistic,
    /// Normalized value assigned to the anchor itself.
    #[serde(default)]
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OneAnchor {
    /// Highest score observed for the task across every framework.
    #[default]
    BestObserved,
    Reference {
        framework: String,
        #[serde(default)]
        statistic: Statistic,
    },
}

impl OneAnchor {
    fn label(&self) -> &str {
        match self {
            Self::BestObserved => "best_observed",
            Self::Reference { framework, .. } => framework,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationConfig {
    pub zero: ZeroAnchor,
    #[serde(default)]
    pub one: OneAnchor,
}

impl NormalizationConfig {
    /// Zero anchor on `framework`'s mean score, one anchor on the best score.
    pub fn against(framework: impl Into<String>) -> Self {
        Self {
            zero: ZeroAnchor {
                framework: framework.into(),
                statistic: Statistic::Mean,
                value: 0.0,
            },
            one: OneAnchor::BestObserved,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.zero.framework.trim().is_empty() {
            return Err(ResultsError::Config(
                "normalization zero framework must not be empty".to_string(),
            ));
        }
        if !self.zero.value.is_finite() || self.zero.value >= 1.0 {
            return Err(ResultsError::Config(format!(
                "normalization zero value must be finite and below 1, got {}",
                self.zero.value
            )));
        }
        if let OneAnchor::Reference { framework, .. } = &self.one {
            if framework.trim().is_empty() {
                return Err(ResultsError::Config(
                    "normalization one framework must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Per-task anchors, `None` when the task cannot be normalized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchors {
    pub zero: f64,
    pub one: f64,
}

fn framework_scores(table: &ResultTable, task: &str, framework: &str) -> Vec<f64> {
    table
        .iter()
        .filter(|r| r.task == task && r.framework == framework)
        .filter_map(|r| r.score)
        .filter(|s| s.is_finite())
        .collect()
}

/// Anchor from a framework's own folds, looked up in the table first and
/// in the reference rows otherwise.
fn reference_anchor(
    table: &ResultTable,
    reference: Option<&ResultTable>,
    task: &str,
    framework: &str,
    statistic: Statistic,
) -> Option<f64> {
    let mut scores = framework_scores(table, task, framework);
    if scores.is_empty() {
        if let Some(reference) = reference {
            scores = framework_scores(reference, task, framework);
        }
    }
    statistic.apply(&scores)
}

fn best_observed(table: &ResultTable, task: &str) -> Option<f64> {
    let scores: Vec<f64> = table
        .iter()
        .filter(|r| r.task == task)
        .filter_map(|r| r.score)
        .filter(|s| s.is_finite())
        .collect();
    Statistic::Max.apply(&scores)
}

/// Rescale `score` into `norm_score` for every row of the table.
pub fn normalize(
    table: &mut ResultTable,
    config: &NormalizationConfig,
    reference: Option<&ResultTable>,
) -> Vec<PreparationWarning> {
    let mut warnings = Vec::new();
    let mut anchors: BTreeMap<String, Option<Anchors>> = BTreeMap::new();

    for task in table.tasks() {
        let zero = reference_anchor(
            table,
            reference,
            &task,
            &config.zero.framework,
            config.zero.statistic,
        );
        let one = match &config.one {
            OneAnchor::BestObserved => best_observed(table, &task),
            OneAnchor::Reference {
                framework,
                statistic,
            } => reference_anchor(table, reference, &task, framework, *statistic),
        };

        let task_anchors = match (zero, one) {
            (None, _) => {
                warnings.push(missing(&task, &config.zero.framework, ReferencePurpose::ZeroAnchor));
                None
            }
            (Some(_), None) => {
                warnings.push(missing(&task, config.one.label(), ReferencePurpose::OneAnchor));
                None
            }
            (Some(z), Some(o)) if o == z => {
                warnings.push(missing(&task, config.one.label(), ReferencePurpose::OneAnchor));
                None
            }
            (Some(zero), Some(one)) => Some(Anchors { zero, one }),
        };
        anchors.insert(task, task_anchors);
    }

    let unnormalized = anchors.values().filter(|a| a.is_none()).count();
    let value = config.zero.value;
    for r in table.iter_mut() {
        r.norm_score = match (anchors.get(&r.task).copied().flatten(), r.score) {
            (Some(a), Some(score)) => {
                Some(value + (1.0 - value) * (score - a.zero) / (a.one - a.zero))
            }
            _ => None,
        };
    }

    METRICS.add_tasks_unnormalized(unnormalized as u64);
    obs::emit_normalization_applied(
        &config.zero.framework,
        anchors.len() - unnormalized,
        unnormalized,
    );
    warnings
}

fn missing(task: &str, framework: &str, purpose: ReferencePurpose) -> PreparationWarning {
    obs::emit_missing_reference(task, framework, None, purpose);
    PreparationWarning::MissingReference {
        task: task.to_string(),
        framework: framework.to_string(),
        fold: None,
        purpose,
    }
}
