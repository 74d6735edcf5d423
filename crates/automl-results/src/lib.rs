//! AutoML benchmark results preparation.
//!
//! Turns raw per-fold result files of several frameworks into one cleaned,
//! deduplicated, scored, imputed and normalized view:
//!
//! load → deduplicate → score → classify → impute → normalize → aggregate
//!
//! Re-exports the pipeline entry points and the core types.

pub mod aggregate;
pub mod config;
pub mod dedup;
pub mod domain;
pub mod impute;
pub mod loader;
pub mod metrics;
pub mod normalize;
pub mod obs;
pub mod pipeline;
pub mod reporting;
pub mod score;
pub mod scoreboard;
pub mod state;
pub mod telemetry;

pub use aggregate::{done_rows, merge_all, PreparedResults};

pub use config::{
    BenchmarkConfig, Exclusions, FilterCondition, FrameworkSelection, RowFilter, RowPredicate,
};

pub use dedup::{deduplicate, duplicate_keys, DuplicatesHandling};

pub use domain::{
    orientation_of, ExecutionRecord, MetadataConflict, Metric, Orientation, PreparationWarning,
    ProblemType, RecordKey, RecordState, ReferencePurpose, Result, ResultTable, ResultsError,
    RunDefinition, Task, TaskMetadata,
};

pub use impute::{impute, ImputationPolicy, ImputationStrategy};

pub use loader::{load_run, load_task_metadata, read_records, LoadedRun};

pub use metrics::METRICS;

pub use normalize::{normalize, NormalizationConfig, OneAnchor, Statistic, ZeroAnchor};

pub use obs::{
    emit_duplicates_resolved, emit_empty_source, emit_imputation_applied, emit_metadata_conflict,
    emit_missing_reference, emit_normalization_applied, emit_run_prepared, emit_sources_loaded,
    emit_states_classified, RunSpan,
};

pub use pipeline::{
    prepare, prepare_benchmark, prepare_run, prepare_runs, BenchmarkResults, PrepareOptions,
    RunResults,
};

pub use score::{apply_scores, derive_score, ScoreInverse, ScoringRules};

pub use scoreboard::{infer_runs, ScoreFile};

pub use state::{classify, partition, ExpectedSpace, StatePartition};
