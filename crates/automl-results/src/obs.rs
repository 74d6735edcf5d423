//! Structured observability hooks for the preparation pipeline.
//!
//! This module provides:
//! - Run-scoped tracing spans via the `RunSpan` RAII guard
//! - Emission functions for each pipeline stage: loading, deduplication,
//!   state classification, imputation, normalization and merging
//!
//! Stage events are emitted at `info!` level; data-sparsity conditions that
//! degrade output (empty sources, missing anchors, metadata overwrites) at
//! `warn!`.

use tracing::{info, warn};

use crate::dedup::DuplicatesHandling;
use crate::domain::ReferencePurpose;

/// RAII guard that enters a run-scoped tracing span while a run is prepared.
///
/// # Example
///
/// ```ignore
/// let _span = RunSpan::enter("autogluon");
/// // every event below is tagged with run = "autogluon"
/// ```
pub struct RunSpan {
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    /// Create and enter a span tagged with the run name.
    pub fn enter(run: &str) -> Self {
        let span = tracing::info_span!("automl.run", run = %run);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: the sources of a run were read.
///
/// ```ignore
/// emit_sources_loaded("autogluon", 2, 40);
/// // logs: event=sources.loaded run=autogluon sources=2 rows=40
/// ```
pub fn emit_sources_loaded(run: &str, sources: usize, rows: usize) {
    info!(event = "sources.loaded", run = %run, sources = sources, rows = rows);
}

/// Emit event: a run resolved to no source files (warning level).
pub fn emit_empty_source(run: &str) {
    warn!(event = "sources.empty", run = %run, "run has no result sources");
}

/// Emit event: duplicated keys were resolved.
pub fn emit_duplicates_resolved(policy: DuplicatesHandling, keys: usize, dropped: usize) {
    info!(
        event = "duplicates.resolved",
        policy = ?policy,
        keys = keys,
        dropped = dropped,
    );
}

pub fn emit_states_classified(done: usize, failed: usize, missing: usize) {
    info!(
        event = "states.classified",
        done = done,
        failed = failed,
        missing = missing,
    );
}

/// Emit event: imputation finished. `skipped` counts (task, framework)
/// combinations left empty because they had no successful fold.
pub fn emit_imputation_applied(source: &str, imputed: usize, skipped: usize) {
    info!(
        event = "imputation.applied",
        source = %source,
        imputed = imputed,
        skipped = skipped,
    );
}

/// Emit event: a reference value needed for imputation or normalization
/// was unavailable (warning level).
pub fn emit_missing_reference(
    task: &str,
    framework: &str,
    fold: Option<u32>,
    purpose: ReferencePurpose,
) {
    warn!(
        event = "reference.missing",
        task = %task,
        framework = %framework,
        fold = ?fold,
        purpose = %purpose,
    );
}

pub fn emit_normalization_applied(zero_framework: &str, normalized: usize, unnormalized: usize) {
    info!(
        event = "normalization.applied",
        zero_framework = %zero_framework,
        normalized_tasks = normalized,
        unnormalized_tasks = unnormalized,
    );
}

/// Emit event: a run went through the whole pipeline.
pub fn emit_run_prepared(run: &str, rows: usize, done: usize, failed: usize, missing: usize) {
    info!(
        event = "run.prepared",
        run = %run,
        rows = rows,
        done = done,
        failed = failed,
        missing = missing,
    );
}

/// Emit event: merging overwrote a task metadata field (warning level).
pub fn emit_metadata_conflict(task: &str, field: &str) {
    warn!(
        event = "metadata.conflict",
        task = %task,
        field = %field,
        "task metadata overwritten by later run"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_span_create() {
        let _span = RunSpan::enter("test-run");
    }
}
