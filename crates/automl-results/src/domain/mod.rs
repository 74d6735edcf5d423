//! Domain models for benchmark results.
//!
//! Canonical definitions for the core entities:
//! - `Task` / `TaskMetadata`: benchmark problems keyed by task name
//! - `ExecutionRecord` / `ResultTable`: one row per task/fold/framework execution
//! - `RunDefinition`: a named framework configuration and its result files
//! - `Metric` / `Orientation`: metric catalogue used for score derivation

pub mod error;
pub mod metric;
pub mod record;
pub mod run;
pub mod task;

pub use error::{PreparationWarning, ReferencePurpose, Result, ResultsError};
pub use metric::{orientation_of, Metric, Orientation};
pub use record::{ExecutionRecord, RecordKey, RecordState, ResultTable};
pub use run::RunDefinition;
pub use task::{MetadataConflict, ProblemType, Task, TaskMetadata};
