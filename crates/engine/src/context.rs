//! Shared state for one top-level operation.

use std::sync::Arc;

use gc_core::GcOptions;
use store_client::{MetricStore, PathStore};
use telemetry::{NoopProgress, ProgressSink, RunStats};

/// Store handles, options, counters and progress sink for one operation.
///
/// Store handles are shared read-only across worker tasks; `stats` is the
/// only mutable state that crosses task boundaries.
#[derive(Clone)]
pub struct GcContext {
    pub metric_store: Arc<dyn MetricStore>,
    pub path_store: Arc<dyn PathStore>,
    pub options: GcOptions,
    pub progress: Arc<dyn ProgressSink>,
    pub stats: Arc<RunStats>,
}

impl GcContext {
    pub fn new(
        metric_store: Arc<dyn MetricStore>,
        path_store: Arc<dyn PathStore>,
        options: GcOptions,
    ) -> Self {
        Self {
            metric_store,
            path_store,
            options,
            progress: Arc::new(NoopProgress),
            stats: Arc::new(RunStats::new()),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn tenant(&self) -> &str {
        &self.options.tenant
    }

    pub fn is_dry_run(&self) -> bool {
        self.options.is_dry_run()
    }

    /// Errors the stores counted on their own.
    pub fn store_errors(&self) -> u64 {
        self.metric_store.stats().errors + self.path_store.stats().errors
    }
}
