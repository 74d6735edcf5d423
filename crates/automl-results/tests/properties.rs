//! Property tests for pipeline invariants.

use std::collections::HashSet;

use automl_results::{
    classify, deduplicate, derive_score, duplicate_keys, impute, normalize, partition,
    DuplicatesHandling, ExecutionRecord, ExpectedSpace, ImputationPolicy, NormalizationConfig,
    Orientation, ResultTable, ScoreInverse, ScoringRules, TaskMetadata,
};
use proptest::prelude::*;

const TASKS: &[&str] = &["t0", "t1", "t2"];
const FRAMEWORKS: &[&str] = &["A", "B", "C"];
const FOLDS: u32 = 4;

fn record() -> impl Strategy<Value = ExecutionRecord> {
    (
        0..TASKS.len(),
        0..FOLDS,
        0..FRAMEWORKS.len(),
        proptest::option::of(0.0f64..1.0),
    )
        .prop_map(|(t, fold, fw, result)| {
            let mut r = ExecutionRecord::new(TASKS[t], fold, FRAMEWORKS[fw], result)
                .with_metric("auc");
            r.score = result;
            r
        })
}

fn table() -> impl Strategy<Value = ResultTable> {
    prop::collection::vec(record(), 0..40).prop_map(ResultTable::from)
}

fn policy() -> impl Strategy<Value = DuplicatesHandling> {
    prop_oneof![
        Just(DuplicatesHandling::KeepFirst),
        Just(DuplicatesHandling::KeepLast),
        Just(DuplicatesHandling::KeepNone),
    ]
}

fn space() -> ExpectedSpace {
    ExpectedSpace::new(TASKS.iter().map(|t| t.to_string()), 0..FOLDS)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn deduplication_leaves_unique_keys_and_is_idempotent(t in table(), p in policy()) {
        let once = deduplicate(t, p).expect("non-failing policy");
        prop_assert!(duplicate_keys(&once).is_empty());
        let twice = deduplicate(once.clone(), p).expect("non-failing policy");
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn partitions_are_disjoint_and_cover_expected_space(t in table(), p in policy()) {
        let deduped = deduplicate(t, p).expect("non-failing policy");
        let frameworks = deduped.frameworks();
        let parts = partition(&classify(deduped, &space(), &[]));

        prop_assert_eq!(parts.total(), frameworks.len() * space().len());
        let mut seen = HashSet::new();
        for r in parts.done.iter().chain(&parts.failed).chain(&parts.missing) {
            prop_assert!(seen.insert(r.key()));
        }
        prop_assert!(parts.done.iter().all(|r| r.result.is_some()));
        prop_assert!(parts.failed.iter().all(|r| r.result.is_none()));
    }

    #[test]
    fn scores_preserve_or_reverse_result_order(a in 0.0f64..100.0, b in 0.0f64..100.0) {
        prop_assume!(a < b);
        prop_assert!(
            derive_score(a, Orientation::LowerIsBetter, ScoreInverse::Negate)
                > derive_score(b, Orientation::LowerIsBetter, ScoreInverse::Negate)
        );
        // reciprocal may round nearby values to the same score
        prop_assert!(
            derive_score(a, Orientation::LowerIsBetter, ScoreInverse::Reciprocal)
                >= derive_score(b, Orientation::LowerIsBetter, ScoreInverse::Reciprocal)
        );
        prop_assert!(
            derive_score(a, Orientation::HigherIsBetter, ScoreInverse::Negate)
                < derive_score(b, Orientation::HigherIsBetter, ScoreInverse::Negate)
        );
    }

    #[test]
    fn imputation_never_touches_present_results(t in table()) {
        let deduped = deduplicate(t, DuplicatesHandling::KeepFirst).expect("dedup");
        let mut classified = classify(deduped, &space(), &[]);
        impute(
            &mut classified,
            Some(&ImputationPolicy::worst_observed()),
            None,
            &TaskMetadata::new(),
            &ScoringRules::default(),
        );
        for r in classified.iter() {
            if r.result.is_some() {
                prop_assert_eq!(r.imp_result, r.result);
                prop_assert_eq!(r.imp_score, r.score);
            }
        }
    }

    #[test]
    fn normalized_scores_never_exceed_best(t in table()) {
        let mut deduped = deduplicate(t, DuplicatesHandling::KeepFirst).expect("dedup");
        normalize(&mut deduped, &NormalizationConfig::against("A"), None);
        for task in deduped.tasks() {
            let rows = deduped.for_task(&task);
            let best = rows.iter().filter_map(|r| r.score).fold(f64::NEG_INFINITY, f64::max);
            for r in rows.iter() {
                if let Some(n) = r.norm_score {
                    prop_assert!(n <= 1.0 + 1e-9);
                    if r.score == Some(best) {
                        prop_assert!((n - 1.0).abs() < 1e-9);
                    }
                }
            }
        }
    }
}
