//! Prepared results of one run, or of several runs merged together.

use serde::{Deserialize, Serialize};

use crate::domain::{MetadataConflict, PreparationWarning, ResultTable, TaskMetadata};
use crate::obs;
use crate::state::{partition, StatePartition};

/// Read-only output of the preparation pipeline.
///
/// `done`, `failed` and `missing` are disjoint views of `results` and
/// together cover every expected (task, fold, framework) combination.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreparedResults {
    pub results: ResultTable,
    pub done: ResultTable,
    pub failed: ResultTable,
    pub missing: ResultTable,
    pub metadata: TaskMetadata,
    #[serde(default)]
    pub warnings: Vec<PreparationWarning>,
}

impl PreparedResults {
    /// Wrap a classified table, deriving the state views from it.
    pub fn new(
        results: ResultTable,
        metadata: TaskMetadata,
        warnings: Vec<PreparationWarning>,
    ) -> Self {
        let StatePartition {
            done,
            failed,
            missing,
        } = partition(&results);
        Self {
            results,
            done,
            failed,
            missing,
            metadata,
            warnings,
        }
    }

    pub fn frameworks(&self) -> Vec<String> {
        self.results.frameworks()
    }

    /// Absorb `other`: tables and warnings are concatenated, metadata is a
    /// right-biased union. Every overwritten metadata field is logged and
    /// returned.
    pub fn merge(&mut self, other: PreparedResults) -> Vec<MetadataConflict> {
        let conflicts = self.metadata.merge(&other.metadata);
        for conflict in &conflicts {
            obs::emit_metadata_conflict(&conflict.task, &conflict.field);
        }
        self.results.extend(other.results);
        self.done.extend(other.done);
        self.failed.extend(other.failed);
        self.missing.extend(other.missing);
        self.warnings.extend(other.warnings);
        conflicts
    }

    /// Recompute the state views after `results` was modified in place.
    pub fn refresh_partitions(&mut self) {
        let parts = partition(&self.results);
        self.done = parts.done;
        self.failed = parts.failed;
        self.missing = parts.missing;
    }
}

/// Merge prepared runs left to right.
pub fn merge_all(runs: impl IntoIterator<Item = PreparedResults>) -> PreparedResults {
    let mut merged = PreparedResults::default();
    for run in runs {
        merged.merge(run);
    }
    merged
}

/// Every run's `done` rows, concatenated in run order. Rows that cannot be
/// identified (empty task or framework) are dropped.
pub fn done_rows<'a>(runs: impl IntoIterator<Item = &'a PreparedResults>) -> ResultTable {
    runs.into_iter()
        .flat_map(|run| run.done.iter())
        .filter(|r| r.has_key())
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ExecutionRecord, ProblemType, RecordState, Task};

    fn prepared(fw: &str, metadata: TaskMetadata) -> PreparedResults {
        let mut done = ExecutionRecord::new("t1", 0, fw, Some(0.9));
        done.state = Some(RecordState::Done);
        let mut failed = ExecutionRecord::new("t1", 1, fw, None);
        failed.state = Some(RecordState::Failed);
        PreparedResults::new(vec![done, failed].into(), metadata, Vec::new())
    }

    #[test]
    fn new_derives_state_views() {
        let p = prepared("A", TaskMetadata::new());
        assert_eq!(p.done.len(), 1);
        assert_eq!(p.failed.len(), 1);
        assert!(p.missing.is_empty());
    }

    #[test]
    fn merge_concatenates_views() {
        let mut a = prepared("A", TaskMetadata::new());
        let conflicts = a.merge(prepared("B", TaskMetadata::new()));
        assert!(conflicts.is_empty());
        assert_eq!(a.results.len(), 4);
        assert_eq!(a.done.len(), 2);
        assert_eq!(a.frameworks(), vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn merge_metadata_is_last_writer_wins_and_reported() {
        let left: TaskMetadata = [Task::new("t1").with_problem_type(ProblemType::Binary)]
            .into_iter()
            .collect();
        let right: TaskMetadata = [Task::new("t1").with_problem_type(ProblemType::Multiclass)]
            .into_iter()
            .collect();

        let mut a = prepared("A", left);
        let conflicts = a.merge(prepared("B", right));

        assert_eq!(a.metadata.problem_type("t1"), Some(ProblemType::Multiclass));
        assert_eq!(
            conflicts,
            vec![MetadataConflict {
                task: "t1".to_string(),
                field: "problem_type".to_string(),
            }]
        );
    }

    #[test]
    fn done_rows_drop_unidentified_records() {
        let mut a = prepared("A", TaskMetadata::new());
        let mut anonymous = ExecutionRecord::new("", 0, "A", Some(0.5));
        anonymous.state = Some(RecordState::Done);
        a.done.push(anonymous);

        let rows = done_rows([&a, &prepared("B", TaskMetadata::new())]);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.has_key()));
    }

    #[test]
    fn merge_all_of_nothing_is_empty() {
        let merged = merge_all(Vec::new());
        assert!(merged.results.is_empty());
        assert!(merged.metadata.is_empty());
    }
}
