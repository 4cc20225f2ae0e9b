//! Work units, samples, and time windows.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::path::MetricPath;
use crate::retention::RollupPeriod;

/// One (path, rollup/period) target to fetch, delete, or inspect.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkUnit {
    pub path: MetricPath,
    pub rollup: RollupPeriod,
}

impl WorkUnit {
    pub fn new(path: MetricPath, rollup: RollupPeriod) -> Self {
        Self { path, rollup }
    }

    /// Cartesian product of paths and rollups, path-major, preserving both orders.
    pub fn product(paths: &[MetricPath], rollups: &[RollupPeriod]) -> Vec<WorkUnit> {
        paths
            .iter()
            .flat_map(|path| {
                rollups
                    .iter()
                    .map(move |rollup| WorkUnit::new(path.clone(), *rollup))
            })
            .collect()
    }
}

impl fmt::Display for WorkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (rollup: {}, period: {})",
            self.path, self.rollup.rollup, self.rollup.period
        )
    }
}

/// A single stored sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Epoch seconds
    pub time: i64,
    pub data: f64,
}

impl Sample {
    pub fn new(time: i64, data: f64) -> Self {
        Self { time, data }
    }
}

/// Optional `[from, to]` bound in epoch seconds (both ends inclusive).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: Option<i64>,
    pub to: Option<i64>,
}

impl TimeRange {
    pub fn new(from: Option<i64>, to: Option<i64>) -> Self {
        Self { from, to }
    }

    /// Unbounded on both sides.
    pub fn all() -> Self {
        Self::default()
    }

    /// Whether either end is set.
    ///
    /// A bounded range turns removal into point-level deletion.
    pub fn is_bounded(&self) -> bool {
        self.from.is_some() || self.to.is_some()
    }
}
