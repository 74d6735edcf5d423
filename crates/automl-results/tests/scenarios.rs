//! End-to-end preparation scenarios over score files on disk.
//!
//! Each test writes small score files into a temp dir, prepares them through
//! the public pipeline and checks the derived columns.

use std::path::{Path, PathBuf};

use automl_results::{
    prepare_run, prepare_runs, BenchmarkConfig, DuplicatesHandling, ImputationPolicy,
    NormalizationConfig, PrepareOptions, PreparationWarning, RecordState, ResultsError,
    RunDefinition,
};

const HEADER: &str = "id,task,framework,constraint,fold,result,metric,mode,version,info";

struct Row<'a> {
    task: &'a str,
    fold: u32,
    framework: &'a str,
    result: &'a str,
    version: &'a str,
}

fn row<'a>(task: &'a str, fold: u32, framework: &'a str, result: &'a str) -> Row<'a> {
    Row {
        task,
        fold,
        framework,
        result,
        version: "1.0",
    }
}

fn write_scores(dir: &Path, name: &str, rows: &[Row<'_>]) -> PathBuf {
    let mut content = String::from(HEADER);
    content.push('\n');
    for r in rows {
        content.push_str(&format!(
            "openml.org/t/{task},{task},{fw},test,{fold},{result},auc,local,{version},\n",
            task = r.task,
            fw = r.framework,
            fold = r.fold,
            result = r.result,
            version = r.version,
        ));
    }
    let path = dir.join(name);
    std::fs::write(&path, content).expect("write score file");
    path
}

fn options(folds: u32) -> PrepareOptions {
    PrepareOptions {
        folds,
        ..PrepareOptions::default()
    }
}

#[test]
fn keep_last_keeps_later_loaded_record() {
    let dir = tempfile::tempdir().expect("tempdir");
    let first = write_scores(
        dir.path(),
        "A_task_t1.csv",
        &[Row {
            version: "first",
            ..row("t1", 0, "A", "0.9")
        }],
    );
    let second = write_scores(
        dir.path(),
        "A_task_t1_rerun.csv",
        &[Row {
            version: "second",
            ..row("t1", 0, "A", "0.9")
        }],
    );
    let run = RunDefinition::new("A").with_source(first).with_source(second);

    let mut opts = options(1);
    opts.duplicates_handling = DuplicatesHandling::KeepLast;
    let prepared = prepare_run(&run, &opts, None).expect("prepare");

    assert_eq!(prepared.done.len(), 1);
    assert_eq!(prepared.done.records()[0].version.as_deref(), Some("second"));
}

#[test]
fn duplicates_fail_by_default() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_scores(
        dir.path(),
        "A.csv",
        &[row("t1", 0, "A", "0.9"), row("t1", 0, "A", "0.8")],
    );
    let run = RunDefinition::new("A").with_source(path);

    let err = prepare_run(&run, &options(1), None).unwrap_err();
    assert!(matches!(err, ResultsError::DuplicateRecords { ref keys } if keys.len() == 1));
}

fn ten_folds<'a>(task: &'a str, fw: &'a str, result: &'a str) -> Vec<Row<'a>> {
    (0..10).map(|f| row(task, f, fw, result)).collect()
}

#[test]
fn fully_failed_task_is_not_imputed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let a = write_scores(dir.path(), "A.csv", &ten_folds("t2", "A", "0.8"));
    let mut b_rows = ten_folds("t2", "B", "nan");
    b_rows.extend(ten_folds("t1", "B", "0.7"));
    let b = write_scores(dir.path(), "B.csv", &b_rows);

    let runs = vec![
        RunDefinition::new("A").with_source(a).as_reference(),
        RunDefinition::new("B").with_source(b),
    ];
    let mut opts = options(10);
    opts.imputation = Some(ImputationPolicy::framework("A"));
    let results = prepare_runs(&runs, &opts).expect("prepare");

    let b = &results.runs[1].prepared;
    let t2: Vec<_> = b.results.iter().filter(|r| r.task == "t2").collect();
    assert_eq!(t2.len(), 10);
    assert!(t2.iter().all(|r| r.imp_result.is_none()));
    assert!(t2.iter().all(|r| r.state == Some(RecordState::Failed)));
}

#[test]
fn single_missing_fold_is_imputed_from_reference() {
    let dir = tempfile::tempdir().expect("tempdir");
    let a = write_scores(dir.path(), "A.csv", &ten_folds("t3", "A", "0.8"));
    let b_rows: Vec<Row<'_>> = (0..10)
        .filter(|&f| f != 3)
        .map(|f| row("t3", f, "B", "0.9"))
        .collect();
    let b = write_scores(dir.path(), "B.csv", &b_rows);

    let runs = vec![
        RunDefinition::new("A").with_source(a).as_reference(),
        RunDefinition::new("B").with_source(b),
    ];
    let mut opts = options(10);
    opts.imputation = Some(ImputationPolicy::framework("A"));
    let results = prepare_runs(&runs, &opts).expect("prepare");

    let b = &results.runs[1].prepared;
    assert_eq!(b.missing.len(), 1);
    for r in b.results.iter() {
        if r.fold == 3 {
            assert_eq!(r.state, Some(RecordState::Missing));
            assert_eq!(r.result, None);
            assert_eq!(r.imp_result, Some(0.8));
        } else {
            assert_eq!(r.imp_result, r.result);
            assert_eq!(r.result, Some(0.9));
        }
    }
}

#[test]
fn normalization_is_anchored_on_reference_mean_and_best() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cp = write_scores(
        dir.path(),
        "constantpredictor.csv",
        &[
            row("t4", 0, "constantpredictor", "0.4"),
            row("t4", 1, "constantpredictor", "0.6"),
        ],
    );
    let a = write_scores(
        dir.path(),
        "A.csv",
        &[row("t4", 0, "A", "0.95"), row("t4", 1, "A", "0.9")],
    );
    let b = write_scores(
        dir.path(),
        "B.csv",
        &[row("t4", 0, "B", "0.725"), row("t4", 1, "B", "0.6")],
    );

    let runs = vec![
        RunDefinition::new("constantpredictor")
            .with_source(cp)
            .as_reference(),
        RunDefinition::new("A").with_source(a),
        RunDefinition::new("B").with_source(b),
    ];
    let mut opts = options(2);
    opts.normalization = Some(NormalizationConfig::against("constantpredictor"));
    let results = prepare_runs(&runs, &opts).expect("prepare");

    let norm = |fw: &str, fold: u32| {
        results
            .combined
            .results
            .iter()
            .find(|r| r.framework == fw && r.fold == fold)
            .and_then(|r| r.norm_score)
            .expect("normalized")
    };
    assert!((norm("B", 0) - 0.5).abs() < 1e-9);
    assert!((norm("A", 0) - 1.0).abs() < 1e-9);
    let ref_mean = (norm("constantpredictor", 0) + norm("constantpredictor", 1)) / 2.0;
    assert!(ref_mean.abs() < 1e-9);
    assert!(results
        .combined
        .results
        .iter()
        .filter_map(|r| r.norm_score)
        .all(|n| n <= 1.0 + 1e-9));
}

#[test]
fn merged_view_spans_every_framework() {
    let dir = tempfile::tempdir().expect("tempdir");
    let a = write_scores(
        dir.path(),
        "A.csv",
        &[row("t1", 0, "A", "0.8"), row("t1", 1, "A", "0.7")],
    );
    let b = write_scores(
        dir.path(),
        "B.csv",
        &[row("t1", 0, "B", "0.6"), row("t1", 1, "B", "oops")],
    );
    let runs = vec![
        RunDefinition::new("A").with_source(a),
        RunDefinition::new("B").with_source(b),
    ];
    let results = prepare_runs(&runs, &options(2)).expect("prepare");

    assert_eq!(results.combined.results.len(), 4);
    assert_eq!(results.combined.failed.len(), 1);
    assert!(results
        .warnings()
        .iter()
        .any(|w| matches!(w, PreparationWarning::MalformedResult { raw, .. } if raw == "oops")));

    // only done rows feed the merged view, so the failed fold shows as missing
    assert_eq!(results.merged.done.len(), 3);
    assert_eq!(results.merged.missing.len(), 1);
    assert!(results.merged.failed.is_empty());
}

#[test]
fn run_without_rows_is_entirely_missing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let a = write_scores(
        dir.path(),
        "A.csv",
        &[row("t1", 0, "A", "0.8"), row("t2", 0, "A", "0.7")],
    );
    let runs = vec![
        RunDefinition::new("A").with_source(a),
        RunDefinition::new("ghost").with_source(dir.path().join("absent.csv")),
    ];
    let mut opts = options(1);
    opts.tasks = vec!["t1".to_string(), "t2".to_string()];
    let results = prepare_runs(&runs, &opts).expect("prepare");

    let ghost = &results.runs[1].prepared;
    assert_eq!(ghost.missing.len(), 2);
    assert!(ghost.missing.iter().all(|r| r.framework == "ghost"));
    assert_eq!(
        ghost.warnings,
        vec![PreparationWarning::EmptySource {
            run: "ghost".to_string()
        }]
    );
}

#[test]
fn imputation_borrows_from_a_run_not_marked_reference() {
    let dir = tempfile::tempdir().expect("tempdir");
    let a = write_scores(
        dir.path(),
        "A.csv",
        &[row("t1", 0, "A", "0.81"), row("t1", 1, "A", "0.8")],
    );
    let b = write_scores(dir.path(), "B.csv", &[row("t1", 0, "B", "0.7")]);
    let runs = vec![
        RunDefinition::new("A").with_source(a),
        RunDefinition::new("B").with_source(b),
    ];
    let mut opts = options(2);
    opts.imputation = Some(ImputationPolicy::framework("A"));
    let results = prepare_runs(&runs, &opts).expect("prepare");

    let b = &results.runs[1].prepared;
    let fold1 = b
        .results
        .iter()
        .find(|r| r.fold == 1)
        .expect("missing fold placeholder");
    assert_eq!(fold1.state, Some(RecordState::Missing));
    assert_eq!(fold1.imp_result, Some(0.8));
    assert!(b.warnings.is_empty());
}

#[test]
fn worst_observed_spans_every_framework() {
    let dir = tempfile::tempdir().expect("tempdir");
    let a = write_scores(
        dir.path(),
        "A.csv",
        &[row("t1", 0, "A", "0.9"), row("t1", 1, "A", "0.6")],
    );
    let b = write_scores(
        dir.path(),
        "B.csv",
        &[row("t1", 0, "B", "0.7"), row("t1", 1, "B", "0.5")],
    );
    let c = write_scores(dir.path(), "C.csv", &[row("t1", 0, "C", "0.8")]);
    let runs = vec![
        RunDefinition::new("A").with_source(a),
        RunDefinition::new("B").with_source(b),
        RunDefinition::new("C").with_source(c),
    ];
    let mut opts = options(2);
    opts.imputation = Some(ImputationPolicy::worst_observed());
    let results = prepare_runs(&runs, &opts).expect("prepare");

    let c_fold1 = results.runs[2]
        .prepared
        .results
        .iter()
        .find(|r| r.fold == 1)
        .expect("missing fold placeholder");
    assert_eq!(c_fold1.result, None);
    assert_eq!(c_fold1.imp_result, Some(0.5));
    assert_eq!(c_fold1.imp_score, Some(0.5));
}

#[test]
fn benchmark_config_drives_the_whole_preparation() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_scores(
        dir.path(),
        "constantpredictor.csv",
        &[row("t1", 0, "constantpredictor", "0.5")],
    );
    write_scores(
        dir.path(),
        "A.csv",
        &[row("t1", 0, "A", "0.9"), row("t1", 0, "A", "0.95")],
    );
    let config_path = dir.path().join("bench.toml");
    std::fs::write(
        &config_path,
        r#"
        folds = 1
        duplicates_handling = "keep_first"

        [normalization]
        zero = { framework = "constantpredictor" }

        [[runs]]
        name = "constantpredictor"
        sources = ["constantpredictor.csv"]
        ref = true

        [[runs]]
        name = "A"
        sources = ["A.csv"]
        "#,
    )
    .expect("write config");

    let config = BenchmarkConfig::from_file(&config_path).expect("config");
    let results = automl_results::prepare_benchmark(&config).expect("prepare");

    let a = results
        .combined
        .results
        .iter()
        .find(|r| r.framework == "A")
        .expect("A row");
    assert_eq!(a.result, Some(0.9));
    assert_eq!(a.norm_score, Some(1.0));
    assert_eq!(results.reference.len(), 1);
}
