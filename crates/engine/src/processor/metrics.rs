use std::sync::Arc;

use async_trait::async_trait;
use gc_core::{Result, TimeRange, WorkUnit};
use store_client::{FetchQuery, MetricStore};
use telemetry::Counter;
use tracing::{debug, info};

use super::{FinalStats, UnitProcessor};
use crate::context::GcContext;

/// Deletes series, or only the points inside a time window.
pub struct MetricRemove {
    store: Arc<dyn MetricStore>,
    tenant: String,
    run: bool,
    removed: Counter,
}

impl MetricRemove {
    pub fn new(ctx: &GcContext) -> Self {
        Self {
            store: ctx.metric_store.clone(),
            tenant: ctx.tenant().to_string(),
            run: ctx.options.run,
            removed: Counter::new(),
        }
    }

    /// Bounded window: fetch first, then delete exactly the fetched times.
    async fn remove_points(&self, unit: &WorkUnit, range: TimeRange) -> Result<Vec<String>> {
        let samples = self
            .store
            .fetch(&self.tenant, unit.rollup, &unit.path, FetchQuery::range(range))
            .await?;
        if samples.is_empty() {
            debug!(unit = %unit, "No points in range");
            return Ok(Vec::new());
        }

        let times: Vec<i64> = samples.iter().map(|s| s.time).collect();
        if !self.run {
            info!(unit = %unit, points = times.len(), "Dry run, points kept");
            self.removed.inc_by(times.len() as u64);
            return Ok(vec![format!(
                "Would remove {} points from {}",
                times.len(),
                unit
            )]);
        }

        self.store
            .delete_times(&self.tenant, unit.rollup, &unit.path, &times)
            .await?;
        self.removed.inc_by(times.len() as u64);
        debug!(unit = %unit, points = times.len(), "Removed points");
        Ok(Vec::new())
    }

    /// No window: the whole series goes, without reading it.
    async fn remove_series(&self, unit: &WorkUnit) -> Result<Vec<String>> {
        if !self.run {
            info!(unit = %unit, "Dry run, series kept");
            self.removed.inc();
            return Ok(vec![format!("Would remove {}", unit)]);
        }

        self.store
            .delete(&self.tenant, unit.rollup, &unit.path)
            .await?;
        self.removed.inc();
        debug!(unit = %unit, "Removed series");
        Ok(Vec::new())
    }
}

#[async_trait]
impl UnitProcessor for MetricRemove {
    fn title(&self) -> &'static str {
        "Removing metrics"
    }

    async fn process_unit(&self, unit: &WorkUnit, range: TimeRange) -> Result<Vec<String>> {
        if range.is_bounded() {
            self.remove_points(unit, range).await
        } else {
            self.remove_series(unit).await
        }
    }

    fn final_stats(&self, external_errors: u64) -> FinalStats {
        FinalStats {
            title: self.title(),
            affected: self.removed.get(),
            external_errors,
        }
    }
}

/// Prints every sample of every matched series.
pub struct MetricList {
    store: Arc<dyn MetricStore>,
    tenant: String,
    listed: Counter,
}

impl MetricList {
    pub fn new(ctx: &GcContext) -> Self {
        Self {
            store: ctx.metric_store.clone(),
            tenant: ctx.tenant().to_string(),
            listed: Counter::new(),
        }
    }
}

#[async_trait]
impl UnitProcessor for MetricList {
    fn title(&self) -> &'static str {
        "Listing metrics"
    }

    async fn process_unit(&self, unit: &WorkUnit, range: TimeRange) -> Result<Vec<String>> {
        let samples = self
            .store
            .fetch(&self.tenant, unit.rollup, &unit.path, FetchQuery::range(range))
            .await?;
        self.listed.inc_by(samples.len() as u64);

        Ok(samples
            .iter()
            .map(|sample| {
                format!(
                    "Path: {}, rollup: {}, period: {}, time: {}, data: {}",
                    unit.path, unit.rollup.rollup, unit.rollup.period, sample.time, sample.data
                )
            })
            .collect())
    }

    fn final_stats(&self, external_errors: u64) -> FinalStats {
        FinalStats {
            title: self.title(),
            affected: self.listed.get(),
            external_errors,
        }
    }
}
