//! Imputation of missing fold results, scoped per (task, framework).
//!
//! A (task, framework) combination with no successful fold at all is never
//! imputed: every `imp_result`/`imp_score` of it stays `None`. When only some
//! folds are missing or failed, exactly those folds are filled; folds with a
//! result pass through unchanged (`imp_result == result`).

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::domain::{
    Orientation, PreparationWarning, ReferencePurpose, Result, ResultTable, ResultsError,
    TaskMetadata,
};
use crate::metrics::METRICS;
use crate::obs;
use crate::score::{derive_score, metric_for, ScoringRules};

/// Source of values for missing folds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImputationPolicy {
    /// Borrow the named framework's result for the same (task, fold).
    Framework { framework: String },
    /// Use a constant raw result; its score is derived like any result.
    Constant { constant: f64 },
    /// Built-in strategies.
    Strategy { strategy: ImputationStrategy },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImputationStrategy {
    /// The lowest score observed for the same (task, fold).
    WorstObserved,
}

impl ImputationPolicy {
    pub fn framework(name: impl Into<String>) -> Self {
        Self::Framework {
            framework: name.into(),
        }
    }

    pub fn worst_observed() -> Self {
        Self::Strategy {
            strategy: ImputationStrategy::WorstObserved,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Framework { framework } if framework.trim().is_empty() => Err(
                ResultsError::Config("imputation framework must not be empty".to_string()),
            ),
            Self::Constant { constant } if !constant.is_finite() => Err(ResultsError::Config(
                format!("imputation constant must be finite, got {constant}"),
            )),
            _ => Ok(()),
        }
    }

    /// Label used in diagnostics.
    pub fn source_label(&self) -> String {
        match self {
            Self::Framework { framework } => framework.clone(),
            Self::Constant { constant } => format!("constant({constant})"),
            Self::Strategy {
                strategy: ImputationStrategy::WorstObserved,
            } => "worst_observed".to_string(),
        }
    }
}

type FoldKey = (String, u32);

#[derive(Clone, Copy)]
struct Values {
    result: Option<f64>,
    score: Option<f64>,
}

/// Values by (task, fold, framework); rows of the table win over reference
/// rows for the same key.
fn value_index(
    table: &ResultTable,
    reference: Option<&ResultTable>,
) -> HashMap<(String, u32, String), Values> {
    let mut index = HashMap::new();
    let rows = table.iter().chain(reference.into_iter().flat_map(|r| r.iter()));
    for r in rows {
        index
            .entry((r.task.clone(), r.fold, r.framework.clone()))
            .or_insert(Values {
                result: r.result,
                score: r.score,
            });
    }
    index
}

/// Worst scored value per (task, fold) over the table and the reference rows.
fn worst_index(table: &ResultTable, reference: Option<&ResultTable>) -> HashMap<FoldKey, Values> {
    let mut index: HashMap<FoldKey, Values> = HashMap::new();
    let rows = table.iter().chain(reference.into_iter().flat_map(|r| r.iter()));
    for r in rows {
        let Some(score) = r.score else { continue };
        let entry = index.entry((r.task.clone(), r.fold)).or_insert(Values {
            result: r.result,
            score: Some(score),
        });
        if entry.score.map_or(true, |s| score < s) {
            *entry = Values {
                result: r.result,
                score: Some(score),
            };
        }
    }
    index
}

/// Fill `imp_result`/`imp_score` on every row of a classified table.
///
/// With no policy, imputed columns mirror `result`/`score`. Returns a
/// warning for every fold whose imputation source had no value.
pub fn impute(
    table: &mut ResultTable,
    policy: Option<&ImputationPolicy>,
    reference: Option<&ResultTable>,
    metadata: &TaskMetadata,
    rules: &ScoringRules,
) -> Vec<PreparationWarning> {
    let Some(policy) = policy else {
        for r in table.iter_mut() {
            r.imp_result = r.result;
            r.imp_score = r.score;
        }
        return Vec::new();
    };

    let with_signal: HashSet<(String, String)> = table
        .iter()
        .filter(|r| r.result.is_some())
        .map(|r| (r.task.clone(), r.framework.clone()))
        .collect();

    let values = match policy {
        ImputationPolicy::Framework { .. } => value_index(table, reference),
        _ => HashMap::new(),
    };
    let worst = match policy {
        ImputationPolicy::Strategy {
            strategy: ImputationStrategy::WorstObserved,
        } => worst_index(table, reference),
        _ => HashMap::new(),
    };

    let mut warnings = Vec::new();
    let mut imputed = 0u64;
    let mut skipped: HashSet<(String, String)> = HashSet::new();

    for r in table.iter_mut() {
        if r.result.is_some() {
            r.imp_result = r.result;
            r.imp_score = r.score;
            continue;
        }
        r.imp_result = None;
        r.imp_score = None;
        if !with_signal.contains(&(r.task.clone(), r.framework.clone())) {
            skipped.insert((r.task.clone(), r.framework.clone()));
            continue;
        }

        let filled = match policy {
            ImputationPolicy::Framework { framework } => values
                .get(&(r.task.clone(), r.fold, framework.clone()))
                .filter(|v| v.result.is_some())
                .copied(),
            ImputationPolicy::Constant { constant } => {
                let orientation = metric_for(r, metadata)
                    .and_then(|m| rules.orientation(&m))
                    .unwrap_or(Orientation::HigherIsBetter);
                Some(Values {
                    result: Some(*constant),
                    score: Some(derive_score(*constant, orientation, rules.inverse)),
                })
            }
            ImputationPolicy::Strategy {
                strategy: ImputationStrategy::WorstObserved,
            } => worst.get(&(r.task.clone(), r.fold)).copied(),
        };

        match filled {
            Some(v) => {
                r.imp_result = v.result;
                r.imp_score = v.score;
                imputed += 1;
            }
            None => {
                let framework = policy.source_label();
                obs::emit_missing_reference(
                    &r.task,
                    &framework,
                    Some(r.fold),
                    ReferencePurpose::Imputation,
                );
                warnings.push(PreparationWarning::MissingReference {
                    task: r.task.clone(),
                    framework,
                    fold: Some(r.fold),
                    purpose: ReferencePurpose::Imputation,
                });
            }
        }
    }

    METRICS.add_folds_imputed(imputed);
    obs::emit_imputation_applied(&policy.source_label(), imputed as usize, skipped.len());
    warnings
}
