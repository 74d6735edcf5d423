//! Global atomic counters for preparation runs.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (once per prepared benchmark).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters, no allocations and no locking.
pub struct Metrics {
    rows_loaded: AtomicU64,
    duplicates_dropped: AtomicU64,
    folds_imputed: AtomicU64,
    tasks_unnormalized: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            rows_loaded: AtomicU64::new(0),
            duplicates_dropped: AtomicU64::new(0),
            folds_imputed: AtomicU64::new(0),
            tasks_unnormalized: AtomicU64::new(0),
        }
    }

    pub fn add_rows_loaded(&self, n: u64) {
        self.rows_loaded.fetch_add(n, Ordering::Relaxed);
        tracing::trace!(metric = "rows_loaded", n, "counter incremented");
    }

    pub fn add_duplicates_dropped(&self, n: u64) {
        self.duplicates_dropped.fetch_add(n, Ordering::Relaxed);
        tracing::trace!(metric = "duplicates_dropped", n, "counter incremented");
    }

    pub fn add_folds_imputed(&self, n: u64) {
        self.folds_imputed.fetch_add(n, Ordering::Relaxed);
        tracing::trace!(metric = "folds_imputed", n, "counter incremented");
    }

    pub fn add_tasks_unnormalized(&self, n: u64) {
        self.tasks_unnormalized.fetch_add(n, Ordering::Relaxed);
        tracing::trace!(metric = "tasks_unnormalized", n, "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            rows_loaded = self.rows_loaded(),
            duplicates_dropped = self.duplicates_dropped(),
            folds_imputed = self.folds_imputed(),
            tasks_unnormalized = self.tasks_unnormalized(),
        );
    }

    pub fn rows_loaded(&self) -> u64 {
        self.rows_loaded.load(Ordering::Relaxed)
    }

    pub fn duplicates_dropped(&self) -> u64 {
        self.duplicates_dropped.load(Ordering::Relaxed)
    }

    pub fn folds_imputed(&self) -> u64 {
        self.folds_imputed.load(Ordering::Relaxed)
    }

    pub fn tasks_unnormalized(&self) -> u64 {
        self.tasks_unnormalized.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.rows_loaded.store(0, Ordering::Relaxed);
        self.duplicates_dropped.store(0, Ordering::Relaxed);
        self.folds_imputed.store(0, Ordering::Relaxed);
        self.tasks_unnormalized.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let m = Metrics::new();
        m.add_rows_loaded(40);
        m.add_rows_loaded(2);
        assert_eq!(m.rows_loaded(), 42);

        m.add_duplicates_dropped(3);
        assert_eq!(m.duplicates_dropped(), 3);

        m.add_folds_imputed(1);
        m.add_tasks_unnormalized(0);
        assert_eq!(m.folds_imputed(), 1);
        assert_eq!(m.tasks_unnormalized(), 0);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.add_rows_loaded(5);
        m.add_duplicates_dropped(1);
        m.add_folds_imputed(2);
        m.add_tasks_unnormalized(3);
        m.reset();
        assert_eq!(m.rows_loaded(), 0);
        assert_eq!(m.duplicates_dropped(), 0);
        assert_eq!(m.folds_imputed(), 0);
        assert_eq!(m.tasks_unnormalized(), 0);
    }
}
