use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use gc_core::{MetricPath, Result, TimeRange, WorkUnit};
use parking_lot::Mutex;
use store_client::MetricStore;
use telemetry::Counter;

use super::{FinalStats, MetricRemove, UnitProcessor};
use crate::context::GcContext;
use crate::runner::JobRunner;
use crate::scanner::ObsolescenceScanner;

/// Runs the scanner and remembers which paths it found obsolete.
struct ObsoleteScan {
    scanner: ObsolescenceScanner,
    found: Mutex<Vec<MetricPath>>,
}

impl ObsoleteScan {
    fn new(ctx: &GcContext, store: Arc<dyn MetricStore>) -> Self {
        Self {
            scanner: ObsolescenceScanner::new(store, ctx.tenant(), ctx.options.window()),
            found: Mutex::new(Vec::new()),
        }
    }

    async fn units(
        &self,
        ctx: &GcContext,
        runner: &JobRunner,
        paths: &[MetricPath],
    ) -> Vec<WorkUnit> {
        let result = self.scanner.scan(runner, paths, &ctx.options.rollups).await;
        *self.found.lock() = result.paths;
        result.units
    }

    fn paths(&self) -> Vec<MetricPath> {
        self.found.lock().clone()
    }
}

/// Deletes every tier of every obsolete series.
pub struct ObsoleteRemove {
    scan: ObsoleteScan,
    remove: MetricRemove,
    tiers: usize,
    /// Tiers removed so far, per path
    removed_tiers: Mutex<HashMap<MetricPath, usize>>,
}

impl ObsoleteRemove {
    pub fn new(ctx: &GcContext) -> Self {
        Self {
            scan: ObsoleteScan::new(ctx, ctx.metric_store.clone()),
            remove: MetricRemove::new(ctx),
            tiers: ctx.options.rollups.len(),
            removed_tiers: Mutex::new(HashMap::new()),
        }
    }

    /// Obsolete paths whose every tier was removed, in scan order.
    pub fn cleared_paths(&self) -> Vec<MetricPath> {
        let removed = self.removed_tiers.lock();
        self.scan
            .paths()
            .into_iter()
            .filter(|path| removed.get(path).copied().unwrap_or(0) == self.tiers)
            .collect()
    }
}

#[async_trait]
impl UnitProcessor for ObsoleteRemove {
    fn title(&self) -> &'static str {
        "Removing obsolete metrics"
    }

    fn limit_depth(&self) -> bool {
        false
    }

    async fn resolve_units(
        &self,
        ctx: &GcContext,
        runner: &JobRunner,
        paths: &[MetricPath],
    ) -> Result<Vec<WorkUnit>> {
        Ok(self.scan.units(ctx, runner, paths).await)
    }

    /// Obsolete series always go whole, whatever window was requested.
    async fn process_unit(&self, unit: &WorkUnit, _range: TimeRange) -> Result<Vec<String>> {
        let lines = self.remove.process_unit(unit, TimeRange::all()).await?;
        *self.removed_tiers.lock().entry(unit.path.clone()).or_insert(0) += 1;
        Ok(lines)
    }

    fn final_stats(&self, external_errors: u64) -> FinalStats {
        FinalStats {
            title: self.title(),
            ..self.remove.final_stats(external_errors)
        }
    }
}

/// Reports obsolete series without touching them.
pub struct ObsoleteList {
    scan: ObsoleteScan,
    listed: Counter,
}

impl ObsoleteList {
    pub fn new(ctx: &GcContext) -> Self {
        Self {
            scan: ObsoleteScan::new(ctx, ctx.metric_store.clone()),
            listed: Counter::new(),
        }
    }
}

#[async_trait]
impl UnitProcessor for ObsoleteList {
    fn title(&self) -> &'static str {
        "Listing obsolete metrics"
    }

    fn limit_depth(&self) -> bool {
        false
    }

    async fn resolve_units(
        &self,
        ctx: &GcContext,
        runner: &JobRunner,
        paths: &[MetricPath],
    ) -> Result<Vec<WorkUnit>> {
        Ok(self.scan.units(ctx, runner, paths).await)
    }

    async fn process_unit(&self, unit: &WorkUnit, _range: TimeRange) -> Result<Vec<String>> {
        self.listed.inc();
        Ok(vec![format!(
            "Path: {}, rollup: {}, period: {}",
            unit.path, unit.rollup.rollup, unit.rollup.period
        )])
    }

    fn final_stats(&self, external_errors: u64) -> FinalStats {
        FinalStats {
            title: self.title(),
            affected: self.listed.get(),
            external_errors,
        }
    }
}
