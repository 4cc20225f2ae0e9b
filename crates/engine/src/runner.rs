//! Bounded worker pool for work units.
//!
//! Units are dispatched in input order with at most `jobs` in flight. A unit
//! that fails or panics is logged and recorded under its own name, and
//! leaves a `None` in its result slot; the batch always runs to completion.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use gc_core::{Error, Result};
use telemetry::{ProgressSink, RunStats};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::context::GcContext;

/// Runs work units on a fixed-size pool of tokio tasks.
pub struct JobRunner {
    jobs: usize,
    stats: Arc<RunStats>,
    progress: Arc<dyn ProgressSink>,
}

impl JobRunner {
    pub fn new(jobs: usize, stats: Arc<RunStats>, progress: Arc<dyn ProgressSink>) -> Self {
        Self {
            jobs: jobs.max(1),
            stats,
            progress,
        }
    }

    pub fn from_context(ctx: &GcContext) -> Self {
        Self::new(ctx.options.jobs, ctx.stats.clone(), ctx.progress.clone())
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Processes every unit with `f` and returns the results in input order.
    ///
    /// `processed` is bumped when a unit is dispatched; `errors` once per
    /// failed unit. Every finished unit ticks the progress sink.
    pub async fn run<T, R, F, Fut>(&self, title: &str, units: Vec<T>, f: F) -> Vec<Option<R>>
    where
        T: fmt::Display + Clone + Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        let total = units.len();
        debug!(title = title, units = total, jobs = self.jobs, "Dispatching work units");
        self.progress.start(title, total as u64);

        let semaphore = Arc::new(Semaphore::new(self.jobs));
        let mut results: Vec<Option<R>> = (0..total).map(|_| None).collect();
        let mut tasks = JoinSet::new();

        for (index, unit) in units.into_iter().enumerate() {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            self.stats.processed.inc();

            let stats = self.stats.clone();
            let progress = self.progress.clone();
            let work = f(unit.clone());
            tasks.spawn(async move {
                // Run the unit on its own task so a panic surfaces here,
                // where the unit is still known.
                let outcome = match tokio::spawn(work).await {
                    Ok(outcome) => outcome,
                    Err(e) => Err(Error::task(e.to_string())),
                };
                drop(permit);
                progress.inc(1);

                match outcome {
                    Ok(value) => (index, Some(value)),
                    Err(e) => {
                        stats.record_failure(&unit);
                        error!(
                            unit = %unit,
                            error = %e,
                            store = e.is_store_error(),
                            "Work unit failed"
                        );
                        (index, None)
                    }
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, value)) => results[index] = value,
                Err(e) => {
                    self.stats.record_failure(format!("{} task", title));
                    self.progress.inc(1);
                    error!(title = title, error = %e, "Work unit task aborted");
                }
            }
        }

        self.progress.finish();
        results
    }
}
