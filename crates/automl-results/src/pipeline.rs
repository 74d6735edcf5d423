//! Preparation pipeline and multi-run driver.
//!
//! One run flows strictly forward:
//! load → exclusions → deduplicate → score → classify → impute → normalize.
//!
//! [`prepare_benchmark`] runs that pipeline for every configured run,
//! reference runs first, and builds the combined and merged views.

use tracing::debug;

use crate::aggregate::{done_rows, PreparedResults};
use crate::config::{BenchmarkConfig, Exclusions, DEFAULT_ERROR_MAX_LENGTH, DEFAULT_FOLDS};
use crate::dedup::{deduplicate, DuplicatesHandling};
use crate::domain::{
    MetadataConflict, PreparationWarning, Result, ResultTable, RunDefinition, TaskMetadata,
};
use crate::impute::{impute, ImputationPolicy};
use crate::loader::{load_run, load_task_metadata, metadata_from_records, LoadedRun};
use crate::metrics::METRICS;
use crate::normalize::{normalize, NormalizationConfig};
use crate::obs::{self, RunSpan};
use crate::score::{apply_scores, ScoringRules};
use crate::state::{classify, ExpectedSpace};

/// Everything a single preparation needs, threaded explicitly.
#[derive(Debug, Clone)]
pub struct PrepareOptions {
    pub folds: u32,
    /// Tasks every framework is expected to cover.
    pub tasks: Vec<String>,
    pub duplicates_handling: DuplicatesHandling,
    pub imputation: Option<ImputationPolicy>,
    pub normalization: Option<NormalizationConfig>,
    pub scoring: ScoringRules,
    pub exclusions: Exclusions,
    pub error_max_length: usize,
    /// Known task metadata; takes precedence over what rows imply.
    pub metadata: TaskMetadata,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self {
            folds: DEFAULT_FOLDS,
            tasks: Vec::new(),
            duplicates_handling: DuplicatesHandling::default(),
            imputation: None,
            normalization: None,
            scoring: ScoringRules::default(),
            exclusions: Exclusions::default(),
            error_max_length: DEFAULT_ERROR_MAX_LENGTH,
            metadata: TaskMetadata::new(),
        }
    }
}

impl PrepareOptions {
    /// Options described by a configuration, loading its task metadata file.
    pub fn from_config(config: &BenchmarkConfig) -> Result<Self> {
        let metadata = match &config.task_metadata {
            Some(path) => load_task_metadata(path)?,
            None => TaskMetadata::new(),
        };
        Ok(Self {
            folds: config.folds,
            tasks: config.tasks.clone(),
            duplicates_handling: config.duplicates_handling,
            imputation: config.imputation.clone(),
            normalization: config.normalization.clone(),
            scoring: config.scoring_rules(),
            exclusions: config.exclusions(),
            error_max_length: config.error_max_length,
            metadata,
        })
    }

    fn expected_space(&self, table: &ResultTable) -> ExpectedSpace {
        let declared = self
            .tasks
            .iter()
            .cloned()
            .chain(self.metadata.task_names().map(String::from));
        ExpectedSpace::covering(table, declared, self.folds)
    }
}

/// Prepare an already loaded table.
pub fn prepare(
    raw: ResultTable,
    options: &PrepareOptions,
    ref_results: Option<&ResultTable>,
) -> Result<PreparedResults> {
    prepare_loaded(
        LoadedRun {
            table: raw,
            warnings: Vec::new(),
        },
        &[],
        options,
        ref_results,
    )
}

/// Load and prepare one run. A run without any row is still expected to
/// cover the whole space, so it comes out entirely `missing`.
pub fn prepare_run(
    run: &RunDefinition,
    options: &PrepareOptions,
    ref_results: Option<&ResultTable>,
) -> Result<PreparedResults> {
    let staged = stage_run(run, options)?;
    Ok(finish_run(&run.name, staged, options, ref_results, ref_results))
}

fn prepare_loaded(
    loaded: LoadedRun,
    frameworks: &[String],
    options: &PrepareOptions,
    ref_results: Option<&ResultTable>,
) -> Result<PreparedResults> {
    let staged = stage(loaded, frameworks, options)?;
    Ok(finish(staged, options, ref_results, ref_results))
}

/// A run taken up to classification: deduplicated, scored and covering
/// its expected space, but not yet imputed.
struct Staged {
    table: ResultTable,
    metadata: TaskMetadata,
    warnings: Vec<PreparationWarning>,
}

fn stage_run(run: &RunDefinition, options: &PrepareOptions) -> Result<Staged> {
    let _span = RunSpan::enter(&run.name);
    let loaded = load_run(run, options.error_max_length)?;
    let expected = if loaded.table.is_empty() && options.exclusions.frameworks.allows(&run.name) {
        vec![run.name.clone()]
    } else {
        Vec::new()
    };
    stage(loaded, &expected, options)
}

fn stage(loaded: LoadedRun, frameworks: &[String], options: &PrepareOptions) -> Result<Staged> {
    let LoadedRun { mut table, warnings } = loaded;

    let before = table.len();
    table.retain(|r| r.has_key() && options.exclusions.keeps(r));
    if table.len() < before {
        debug!(removed = before - table.len(), "rows excluded");
    }

    let mut table = deduplicate(table, options.duplicates_handling)?;

    let mut metadata = options.metadata.clone();
    for task in metadata_from_records(&table).tasks() {
        metadata.observe(task.clone());
    }

    apply_scores(&mut table, &metadata, &options.scoring);

    let space = options.expected_space(&table);
    let table = classify(table, &space, frameworks);
    Ok(Staged {
        table,
        metadata,
        warnings,
    })
}

/// Impute, then normalize when asked. `imputation_pool` holds the rows
/// imputation may borrow from besides the table's own.
fn finish(
    staged: Staged,
    options: &PrepareOptions,
    imputation_pool: Option<&ResultTable>,
    ref_results: Option<&ResultTable>,
) -> PreparedResults {
    let Staged {
        mut table,
        metadata,
        mut warnings,
    } = staged;

    warnings.extend(impute(
        &mut table,
        options.imputation.as_ref(),
        imputation_pool,
        &metadata,
        &options.scoring,
    ));
    if let Some(normalization) = &options.normalization {
        warnings.extend(normalize(&mut table, normalization, ref_results));
    }

    PreparedResults::new(table, metadata, warnings)
}

fn finish_run(
    name: &str,
    staged: Staged,
    options: &PrepareOptions,
    imputation_pool: Option<&ResultTable>,
    ref_results: Option<&ResultTable>,
) -> PreparedResults {
    let _span = RunSpan::enter(name);
    let prepared = finish(staged, options, imputation_pool, ref_results);
    obs::emit_run_prepared(
        name,
        prepared.results.len(),
        prepared.done.len(),
        prepared.failed.len(),
        prepared.missing.len(),
    );
    prepared
}

/// One prepared run of a benchmark.
#[derive(Debug, Clone)]
pub struct RunResults {
    pub name: String,
    pub reference: bool,
    pub prepared: PreparedResults,
}

/// Output of [`prepare_benchmark`].
#[derive(Debug, Clone)]
pub struct BenchmarkResults {
    /// Per-run results in configuration order.
    pub runs: Vec<RunResults>,
    /// Concatenated results of the reference runs.
    pub reference: ResultTable,
    /// All runs merged, normalized across frameworks when enabled.
    pub combined: PreparedResults,
    /// Preparation re-run over every run's `done` rows.
    pub merged: PreparedResults,
    /// Metadata fields overwritten while merging runs.
    pub metadata_conflicts: Vec<MetadataConflict>,
}

impl BenchmarkResults {
    pub fn warnings(&self) -> &[PreparationWarning] {
        &self.combined.warnings
    }
}

/// Prepare every run of a configuration.
pub fn prepare_benchmark(config: &BenchmarkConfig) -> Result<BenchmarkResults> {
    let options = PrepareOptions::from_config(config)?;
    prepare_runs(&config.runs, &options)
}

/// Prepare `runs` with shared options.
///
/// Every run is first taken up to classification. Imputation then borrows
/// from the classified rows of all runs, so the imputation framework need
/// not be a reference run and `worst_observed` spans every framework.
/// Reference runs are finished first; their results serve as normalization
/// reference. Normalization only happens on the combined table, where the
/// best observed score spans every run.
pub fn prepare_runs(runs: &[RunDefinition], options: &PrepareOptions) -> Result<BenchmarkResults> {
    let run_options = PrepareOptions {
        normalization: None,
        ..options.clone()
    };

    let mut staged: Vec<Option<Staged>> = Vec::with_capacity(runs.len());
    for run in runs {
        staged.push(Some(stage_run(run, &run_options)?));
    }

    let mut pool = ResultTable::new();
    for s in staged.iter().flatten() {
        pool.extend(s.table.iter().cloned());
    }
    let pool = (!pool.is_empty()).then_some(pool);

    let mut prepared: Vec<Option<PreparedResults>> = vec![None; runs.len()];
    let mut reference = ResultTable::new();
    let order = runs
        .iter()
        .enumerate()
        .filter(|(_, r)| r.reference)
        .chain(runs.iter().enumerate().filter(|(_, r)| !r.reference));
    for (idx, run) in order {
        let Some(s) = staged[idx].take() else {
            continue;
        };
        let p = finish_run(&run.name, s, &run_options, pool.as_ref(), None);
        if run.reference {
            reference.extend(p.results.iter().cloned());
        }
        prepared[idx] = Some(p);
    }

    let ref_results = (!reference.is_empty()).then_some(&reference);
    let runs: Vec<RunResults> = runs
        .iter()
        .zip(prepared)
        .filter_map(|(run, p)| {
            p.map(|prepared| RunResults {
                name: run.name.clone(),
                reference: run.reference,
                prepared,
            })
        })
        .collect();

    let mut combined = PreparedResults::default();
    let mut metadata_conflicts = Vec::new();
    for run in &runs {
        metadata_conflicts.extend(combined.merge(run.prepared.clone()));
    }
    if let Some(normalization) = &options.normalization {
        let warnings = normalize(&mut combined.results, normalization, ref_results);
        combined.warnings.extend(warnings);
        combined.refresh_partitions();
    }

    let merged = prepare_loaded(
        LoadedRun {
            table: done_rows(runs.iter().map(|r| &r.prepared)),
            warnings: Vec::new(),
        },
        &combined.frameworks(),
        &run_options,
        ref_results,
    )?;

    METRICS.flush();
    Ok(BenchmarkResults {
        runs,
        reference,
        combined,
        merged,
        metadata_conflicts,
    })
}
