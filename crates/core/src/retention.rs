//! Retention tiers and the obsolescence window.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Default obsolescence threshold: 31 days.
pub const DEFAULT_THRESHOLD_SECS: u64 = 31 * 24 * 60 * 60;

/// A retention tier: sampling interval and retention duration, both in seconds.
///
/// Written on the command line as `rollup:period`, e.g. `60:5356800`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RollupPeriod {
    pub rollup: u32,
    pub period: u32,
}

impl RollupPeriod {
    pub fn new(rollup: u32, period: u32) -> Self {
        Self { rollup, period }
    }
}

impl fmt::Display for RollupPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.rollup, self.period)
    }
}

impl FromStr for RollupPeriod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (rollup, period) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| Error::invalid_rollup(format!("expected rollup:period, got '{}'", s)))?;

        let rollup: u32 = rollup
            .parse()
            .map_err(|_| Error::invalid_rollup(format!("bad rollup in '{}'", s)))?;
        let period: u32 = period
            .parse()
            .map_err(|_| Error::invalid_rollup(format!("bad period in '{}'", s)))?;

        if rollup == 0 || period == 0 {
            return Err(Error::invalid_rollup(format!(
                "rollup and period must be positive in '{}'",
                s
            )));
        }

        Ok(Self { rollup, period })
    }
}

/// Time window used to classify series as obsolete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObsolescenceWindow {
    /// Threshold in seconds
    pub threshold_secs: u64,
    /// Reference time (epoch seconds)
    pub now: i64,
}

impl ObsolescenceWindow {
    pub fn new(threshold_secs: u64, now: i64) -> Self {
        Self {
            threshold_secs,
            now,
        }
    }

    /// Earliest timestamp that still counts as fresh data.
    ///
    /// A series with no sample at or after this instant is obsolete.
    pub fn cutoff(&self) -> i64 {
        let threshold = i64::try_from(self.threshold_secs).unwrap_or(i64::MAX);
        self.now.saturating_sub(threshold)
    }

    /// Whether a sample taken at `time` keeps its series alive.
    pub fn is_fresh(&self, time: i64) -> bool {
        time >= self.cutoff()
    }
}
