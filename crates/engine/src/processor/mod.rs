//! Per-operation processing policies.
//!
//! A [`UnitProcessor`] handles one (path, rollup) series at a time and is
//! dispatched through the [`JobRunner`]. A [`PathProcessor`] handles one
//! path-store entry at a time in a plain sequential loop.

mod empty;
mod metrics;
mod obsolete;
mod paths;

pub use empty::EmptyPathPrune;
pub use metrics::{MetricList, MetricRemove};
pub use obsolete::{ObsoleteList, ObsoleteRemove};
pub use paths::{PathList, PathRemove, RemoveMode};

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use gc_core::{MetricPath, PathEntry, Result, TimeRange, WorkUnit};
use serde::Serialize;
use store_client::LookupQuery;
use tracing::debug;

use crate::context::GcContext;
use crate::runner::JobRunner;

/// What a processor reports once its phase is over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalStats {
    pub title: &'static str,
    /// Series, points or paths removed (or that would be, in dry mode)
    pub affected: u64,
    /// Errors counted by the stores during the phase
    pub external_errors: u64,
}

/// Metric-level work: resolves (path, rollup) units and processes each one.
#[async_trait]
pub trait UnitProcessor: Send + Sync {
    fn title(&self) -> &'static str;

    /// Whether patterns match only paths of their own depth.
    fn limit_depth(&self) -> bool {
        true
    }

    /// Leaf paths to work on, in discovery order.
    async fn resolve_paths(&self, ctx: &GcContext) -> Result<Vec<MetricPath>> {
        resolve_leaf_paths(ctx, self.limit_depth()).await
    }

    /// Units to dispatch. Every path paired with every requested rollup.
    async fn resolve_units(
        &self,
        ctx: &GcContext,
        _runner: &JobRunner,
        paths: &[MetricPath],
    ) -> Result<Vec<WorkUnit>> {
        Ok(WorkUnit::product(paths, &ctx.options.rollups))
    }

    /// Processes one series and returns the output lines it produced.
    async fn process_unit(&self, unit: &WorkUnit, range: TimeRange) -> Result<Vec<String>>;

    fn final_stats(&self, external_errors: u64) -> FinalStats;
}

/// Path-level work over already resolved path-store entries.
#[async_trait]
pub trait PathProcessor: Send + Sync {
    fn title(&self) -> &'static str;

    async fn process_path(&self, entry: &PathEntry) -> Result<Vec<String>>;

    fn final_stats(&self, external_errors: u64) -> FinalStats;
}

/// Runs `query` for every configured pattern and merges the results.
///
/// Entries keep discovery order; duplicates across patterns are dropped.
pub async fn lookup_entries(
    ctx: &GcContext,
    leafs_only: bool,
    limit_depth: bool,
    with_excludes: bool,
) -> Result<Vec<PathEntry>> {
    let excludes = if with_excludes {
        ctx.options.exclude_paths.clone()
    } else {
        Vec::new()
    };

    let mut seen = HashSet::new();
    let mut entries = Vec::new();
    for pattern in &ctx.options.paths {
        let query = LookupQuery::new(pattern.as_str())
            .leafs_only(leafs_only)
            .limit_depth(limit_depth)
            .excluding(excludes.clone());
        let found = ctx.path_store.lookup(ctx.tenant(), &query).await?;
        debug!(pattern = %pattern, matches = found.len(), "Resolved pattern");

        for entry in found {
            if seen.insert(entry.path.clone()) {
                entries.push(entry);
            }
        }
    }
    Ok(entries)
}

/// Leaf paths matching the configured patterns, minus exclusions.
pub async fn resolve_leaf_paths(ctx: &GcContext, limit_depth: bool) -> Result<Vec<MetricPath>> {
    let entries = lookup_entries(ctx, true, limit_depth, true).await?;
    Ok(entries.into_iter().map(|entry| entry.path).collect())
}

/// Every path under the configured patterns, keyed by path with its leaf
/// flag. Exclusions are not applied.
pub async fn collect_path_map(ctx: &GcContext) -> Result<BTreeMap<MetricPath, bool>> {
    let entries = lookup_entries(ctx, false, false, false).await?;
    Ok(entries
        .into_iter()
        .map(|entry| (entry.path, entry.leaf))
        .collect())
}
