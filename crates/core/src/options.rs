//! Per-operation options.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::retention::{ObsolescenceWindow, RollupPeriod, DEFAULT_THRESHOLD_SECS};
use crate::unit::TimeRange;

/// Tenant used when none is given.
pub const DEFAULT_TENANT: &str = "NONE";

/// Everything one top-level operation needs to know about its run.
///
/// Created fresh for every operation and passed explicitly to the
/// components that need it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcOptions {
    #[serde(default = "default_tenant")]
    pub tenant: String,
    /// Path patterns to resolve
    pub paths: Vec<String>,
    /// Requested tiers; the first one is the probing tier for obsolescence
    #[serde(default)]
    pub rollups: Vec<RollupPeriod>,
    /// Worker pool size
    #[serde(default = "default_jobs")]
    pub jobs: usize,
    pub from: Option<i64>,
    pub to: Option<i64>,
    #[serde(default)]
    pub exclude_paths: Vec<String>,
    #[serde(default)]
    pub sort: bool,
    /// Obsolescence threshold in seconds
    #[serde(default = "default_threshold")]
    pub threshold: u64,
    /// When false, nothing is deleted (dry mode)
    #[serde(default)]
    pub run: bool,
    /// Reference time in epoch seconds
    #[serde(default = "default_now")]
    pub now: i64,
}

fn default_tenant() -> String {
    DEFAULT_TENANT.to_string()
}

fn default_jobs() -> usize {
    1
}

fn default_threshold() -> u64 {
    DEFAULT_THRESHOLD_SECS
}

fn default_now() -> i64 {
    chrono::Utc::now().timestamp()
}

impl Default for GcOptions {
    fn default() -> Self {
        Self {
            tenant: default_tenant(),
            paths: Vec::new(),
            rollups: Vec::new(),
            jobs: default_jobs(),
            from: None,
            to: None,
            exclude_paths: Vec::new(),
            sort: false,
            threshold: default_threshold(),
            run: false,
            now: default_now(),
        }
    }
}

impl GcOptions {
    pub fn new(tenant: impl Into<String>, paths: Vec<String>) -> Self {
        Self {
            tenant: tenant.into(),
            paths,
            ..Self::default()
        }
    }

    pub fn with_rollups(mut self, rollups: Vec<RollupPeriod>) -> Self {
        self.rollups = rollups;
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn with_range(mut self, from: Option<i64>, to: Option<i64>) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    pub fn with_excludes(mut self, exclude_paths: Vec<String>) -> Self {
        self.exclude_paths = exclude_paths;
        self
    }

    pub fn with_sort(mut self, sort: bool) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_threshold(mut self, threshold: u64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_run(mut self, run: bool) -> Self {
        self.run = run;
        self
    }

    pub fn with_now(mut self, now: i64) -> Self {
        self.now = now;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        !self.run
    }

    pub fn time_range(&self) -> TimeRange {
        TimeRange::new(self.from, self.to)
    }

    pub fn window(&self) -> ObsolescenceWindow {
        ObsolescenceWindow::new(self.threshold, self.now)
    }

    /// Checks the options shared by every operation.
    pub fn validate(&self) -> Result<()> {
        if self.jobs == 0 {
            return Err(Error::invalid_options("jobs must be at least 1"));
        }
        if self.paths.is_empty() {
            return Err(Error::invalid_options("at least one path pattern is required"));
        }
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(Error::invalid_options(format!(
                    "from ({}) is after to ({})",
                    from, to
                )));
            }
        }
        Ok(())
    }

    /// Checks options for operations that work on series rather than paths.
    pub fn validate_with_rollups(&self) -> Result<()> {
        self.validate()?;
        if self.rollups.is_empty() {
            return Err(Error::invalid_rollup("at least one rollup is required"));
        }
        Ok(())
    }
}
