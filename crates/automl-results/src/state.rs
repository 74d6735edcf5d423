//! Task state classification.
//!
//! Every expected (task, fold, framework) combination ends up in exactly one
//! of `done`, `failed` or `missing`:
//! - `done`: a row with a numeric result
//! - `failed`: a row without a usable result (its `info` carries the reason)
//! - `missing`: no row at all; a placeholder row is synthesized for it

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::domain::{ExecutionRecord, RecordKey, RecordState, ResultTable};
use crate::obs;

/// The (task, fold) space every framework is expected to cover.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedSpace {
    pub tasks: BTreeSet<String>,
    pub folds: BTreeSet<u32>,
}

impl ExpectedSpace {
    pub fn new(
        tasks: impl IntoIterator<Item = String>,
        folds: impl IntoIterator<Item = u32>,
    ) -> Self {
        Self {
            tasks: tasks.into_iter().collect(),
            folds: folds.into_iter().collect(),
        }
    }

    /// Declared tasks and folds `0..n_folds`, widened by whatever the table
    /// actually contains so that no row falls outside the space.
    pub fn covering(
        table: &ResultTable,
        declared_tasks: impl IntoIterator<Item = String>,
        n_folds: u32,
    ) -> Self {
        let mut space = Self::new(declared_tasks, 0..n_folds);
        space.tasks.extend(
            table
                .iter()
                .filter(|r| !r.task.trim().is_empty())
                .map(|r| r.task.clone()),
        );
        space.folds.extend(table.folds());
        space
    }

    pub fn len(&self) -> usize {
        self.tasks.len() * self.folds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys_for<'a>(&'a self, framework: &'a str) -> impl Iterator<Item = RecordKey> + 'a {
        self.tasks.iter().flat_map(move |task| {
            self.folds
                .iter()
                .map(move |&fold| RecordKey::new(task.clone(), fold, framework))
        })
    }
}

/// State of a present row.
pub fn state_of(record: &ExecutionRecord) -> RecordState {
    if record.result.is_some() {
        RecordState::Done
    } else {
        RecordState::Failed
    }
}

/// Set `state` on every row of a deduplicated table and append a missing
/// placeholder for each expected combination without a row.
///
/// `frameworks` lists frameworks that must be covered even when they have no
/// rows at all (e.g. runs whose sources were empty).
pub fn classify(mut table: ResultTable, space: &ExpectedSpace, frameworks: &[String]) -> ResultTable {
    let mut present: HashSet<RecordKey> = HashSet::with_capacity(table.len());
    for record in table.iter_mut() {
        record.state = Some(state_of(record));
        present.insert(record.key());
    }

    let mut all_frameworks: Vec<String> = table.frameworks();
    for fw in frameworks {
        if !all_frameworks.contains(fw) {
            all_frameworks.push(fw.clone());
        }
    }
    all_frameworks.sort();

    let mut placeholders = Vec::new();
    for framework in &all_frameworks {
        placeholders.extend(
            space
                .keys_for(framework)
                .filter(|k| !present.contains(k))
                .map(|k| ExecutionRecord::missing(&k)),
        );
    }
    table.extend(placeholders);
    table
}

/// The three disjoint state views of a classified table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatePartition {
    pub done: ResultTable,
    pub failed: ResultTable,
    pub missing: ResultTable,
}

impl StatePartition {
    pub fn total(&self) -> usize {
        self.done.len() + self.failed.len() + self.missing.len()
    }
}

/// Split a classified table by state. Rows without a state are classified
/// on the fly.
pub fn partition(table: &ResultTable) -> StatePartition {
    let mut out = StatePartition::default();
    for record in table {
        match record.state.unwrap_or_else(|| state_of(record)) {
            RecordState::Done => out.done.push(record.clone()),
            RecordState::Failed => out.failed.push(record.clone()),
            RecordState::Missing => out.missing.push(record.clone()),
        }
    }
    obs::emit_states_classified(out.done.len(), out.failed.len(), out.missing.len());
    out
}
