//! Obsolescence scanner.
//!
//! A path is obsolete when its finest tier holds no sample at or after
//! `now - threshold`. Finding that out costs one `LIMIT 1` probe per path.

use std::sync::Arc;

use gc_core::{MetricPath, ObsolescenceWindow, Result, RollupPeriod, WorkUnit};
use store_client::{FetchQuery, MetricStore};
use tracing::{debug, info};

use crate::runner::JobRunner;

/// Outcome of a scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanResult {
    /// Obsolete paths, in input order.
    pub paths: Vec<MetricPath>,
    /// Every obsolete path paired with every requested tier, path-major.
    pub units: Vec<WorkUnit>,
}

impl ScanResult {
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Classifies paths as obsolete or live by probing the metric store.
pub struct ObsolescenceScanner {
    metric_store: Arc<dyn MetricStore>,
    tenant: String,
    window: ObsolescenceWindow,
}

impl ObsolescenceScanner {
    pub fn new(
        metric_store: Arc<dyn MetricStore>,
        tenant: impl Into<String>,
        window: ObsolescenceWindow,
    ) -> Self {
        Self {
            metric_store,
            tenant: tenant.into(),
            window,
        }
    }

    pub fn window(&self) -> ObsolescenceWindow {
        self.window
    }

    /// Scans `paths` at `rollups[0]` and projects the obsolete ones across
    /// all of `rollups`.
    ///
    /// Probes run through `runner`. A failed probe is counted as an error
    /// there and the path stays live.
    pub async fn scan(
        &self,
        runner: &JobRunner,
        paths: &[MetricPath],
        rollups: &[RollupPeriod],
    ) -> ScanResult {
        let Some(&probe_rollup) = rollups.first() else {
            return ScanResult::default();
        };

        let cutoff = self.window.cutoff();
        debug!(
            paths = paths.len(),
            rollup = %probe_rollup,
            cutoff = cutoff,
            "Scanning for obsolete paths"
        );

        let units: Vec<WorkUnit> = paths
            .iter()
            .map(|path| WorkUnit::new(path.clone(), probe_rollup))
            .collect();

        let store = self.metric_store.clone();
        let tenant = self.tenant.clone();
        let window = self.window;
        let verdicts = runner
            .run("Scanning", units, move |unit: WorkUnit| {
                let store = store.clone();
                let tenant = tenant.clone();
                async move { probe(store.as_ref(), &tenant, &unit, window).await }
            })
            .await;

        let obsolete: Vec<MetricPath> = paths
            .iter()
            .zip(verdicts)
            .filter(|(_, verdict)| *verdict == Some(true))
            .map(|(path, _)| path.clone())
            .collect();

        info!(
            scanned = paths.len(),
            obsolete = obsolete.len(),
            "Obsolescence scan finished"
        );

        ScanResult {
            units: WorkUnit::product(&obsolete, rollups),
            paths: obsolete,
        }
    }
}

/// True when the series has nothing fresh inside `window`.
async fn probe(
    store: &dyn MetricStore,
    tenant: &str,
    unit: &WorkUnit,
    window: ObsolescenceWindow,
) -> Result<bool> {
    let samples = store
        .fetch(tenant, unit.rollup, &unit.path, FetchQuery::probe(window.cutoff()))
        .await?;
    Ok(!samples.iter().any(|sample| window.is_fresh(sample.time)))
}
