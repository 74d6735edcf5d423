//! Deduplication of (task, fold, framework) keys.
//!
//! Tie-breaks use row order only (the order sources were concatenated in),
//! never record content.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::{RecordKey, Result, ResultTable, ResultsError};
use crate::metrics::METRICS;
use crate::obs;

/// What to do with records sharing a key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatesHandling {
    /// Reject the table, naming the duplicated keys.
    #[default]
    Fail,
    KeepFirst,
    KeepLast,
    /// Drop every record of a duplicated key.
    KeepNone,
}

struct Occurrences {
    count: usize,
    first: usize,
    last: usize,
}

fn occurrences(table: &ResultTable) -> HashMap<RecordKey, Occurrences> {
    let mut map: HashMap<RecordKey, Occurrences> = HashMap::new();
    for (idx, record) in table.iter().enumerate() {
        map.entry(record.key())
            .and_modify(|o| {
                o.count += 1;
                o.last = idx;
            })
            .or_insert(Occurrences {
                count: 1,
                first: idx,
                last: idx,
            });
    }
    map
}

/// Keys with more than one record, sorted.
pub fn duplicate_keys(table: &ResultTable) -> Vec<RecordKey> {
    let mut keys: Vec<RecordKey> = occurrences(table)
        .into_iter()
        .filter(|(_, o)| o.count > 1)
        .map(|(k, _)| k)
        .collect();
    keys.sort();
    keys
}

/// Resolve duplicated keys according to `policy`.
///
/// Surviving rows keep their relative order. The output satisfies key
/// uniqueness, so applying any policy again is a no-op.
pub fn deduplicate(table: ResultTable, policy: DuplicatesHandling) -> Result<ResultTable> {
    let occ = occurrences(&table);
    let mut duplicated: Vec<RecordKey> = occ
        .iter()
        .filter(|(_, o)| o.count > 1)
        .map(|(k, _)| k.clone())
        .collect();
    if duplicated.is_empty() {
        return Ok(table);
    }
    duplicated.sort();

    if policy == DuplicatesHandling::Fail {
        return Err(ResultsError::DuplicateRecords { keys: duplicated });
    }

    let before = table.len();
    let kept: ResultTable = table
        .into_iter()
        .enumerate()
        .filter(|(idx, record)| {
            let o = &occ[&record.key()];
            if o.count == 1 {
                return true;
            }
            match policy {
                DuplicatesHandling::KeepFirst => *idx == o.first,
                DuplicatesHandling::KeepLast => *idx == o.last,
                DuplicatesHandling::KeepNone | DuplicatesHandling::Fail => false,
            }
        })
        .map(|(_, record)| record)
        .collect();

    let dropped = before - kept.len();
    METRICS.add_duplicates_dropped(dropped as u64);
    obs::emit_duplicates_resolved(policy, duplicated.len(), dropped);
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ExecutionRecord;

    fn rec(task: &str, fold: u32, fw: &str, result: f64) -> ExecutionRecord {
        ExecutionRecord::new(task, fold, fw, Some(result))
    }

    fn table() -> ResultTable {
        vec![
            rec("t1", 0, "A", 0.1),
            rec("t1", 1, "A", 0.2),
            rec("t1", 0, "A", 0.3),
            rec("t2", 0, "A", 0.4),
            rec("t1", 0, "A", 0.5),
        ]
        .into()
    }

    fn results(t: &ResultTable) -> Vec<f64> {
        t.iter().filter_map(|r| r.result).collect()
    }

    #[test]
    fn fail_names_duplicated_keys() {
        let err = deduplicate(table(), DuplicatesHandling::Fail).unwrap_err();
        match err {
            ResultsError::DuplicateRecords { keys } => {
                assert_eq!(keys, vec![RecordKey::new("t1", 0, "A")]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn fail_accepts_unique_tables() {
        let t: ResultTable = vec![rec("t1", 0, "A", 0.1), rec("t1", 0, "B", 0.2)].into();
        let out = deduplicate(t.clone(), DuplicatesHandling::Fail).expect("unique");
        assert_eq!(out, t);
    }

    #[test]
    fn keep_first_keeps_earliest_row() {
        let out = deduplicate(table(), DuplicatesHandling::KeepFirst).expect("dedup");
        assert_eq!(results(&out), vec![0.1, 0.2, 0.4]);
    }

    #[test]
    fn keep_last_keeps_latest_row_in_its_position() {
        let out = deduplicate(table(), DuplicatesHandling::KeepLast).expect("dedup");
        assert_eq!(results(&out), vec![0.2, 0.4, 0.5]);
    }

    #[test]
    fn keep_none_drops_every_duplicated_key() {
        let out = deduplicate(table(), DuplicatesHandling::KeepNone).expect("dedup");
        assert_eq!(results(&out), vec![0.2, 0.4]);
    }

    #[test]
    fn same_key_different_framework_is_not_duplicate() {
        let t: ResultTable = vec![rec("t1", 0, "A", 0.1), rec("t1", 0, "B", 0.1)].into();
        assert!(duplicate_keys(&t).is_empty());
    }

    #[test]
    fn deduplication_is_idempotent() {
        for policy in [
            DuplicatesHandling::KeepFirst,
            DuplicatesHandling::KeepLast,
            DuplicatesHandling::KeepNone,
        ] {
            let once = deduplicate(table(), policy).expect("first pass");
            let twice = deduplicate(once.clone(), policy).expect("second pass");
            assert_eq!(once, twice, "{policy:?}");
            assert!(duplicate_keys(&twice).is_empty());
        }
    }
}
