//! Run statistics.
//!
//! Counters are bumped from worker tasks with relaxed atomics and read once
//! when the run finishes.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// A counter metric.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Processed/error counters for one top-level operation.
#[derive(Debug)]
pub struct RunStats {
    pub processed: Counter,
    pub errors: Counter,
    failed: Mutex<Vec<String>>,
    started: Instant,
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStats {
    pub fn new() -> Self {
        Self {
            processed: Counter::new(),
            errors: Counter::new(),
            failed: Mutex::new(Vec::new()),
            started: Instant::now(),
        }
    }

    /// Counts one error against `what` and remembers it for the report.
    pub fn record_failure(&self, what: impl fmt::Display) {
        self.errors.inc();
        self.failed.lock().push(what.to_string());
    }

    /// Everything passed to [`RunStats::record_failure`], in order.
    pub fn failed(&self) -> Vec<String> {
        self.failed.lock().clone()
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Final numbers, with errors reported by the stores added in.
    pub fn report(&self, external_errors: u64) -> StatsReport {
        StatsReport {
            processed: self.processed.get(),
            errors: self.errors.get() + external_errors,
            duration: self.elapsed(),
        }
    }
}

/// Snapshot of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsReport {
    pub processed: u64,
    pub errors: u64,
    pub duration: Duration,
}

/// Render a duration like `1h 2m 3.456s`.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = (total % 60) as f64 + f64::from(duration.subsec_millis()) / 1000.0;

    if hours > 0 {
        format!("{}h {}m {:.3}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {:.3}s", minutes, secs)
    } else {
        format!("{:.3}s", secs)
    }
}
