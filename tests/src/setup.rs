//! Common test setup functions.

use std::sync::Arc;

use engine::{execute, Command, GcContext, OperationReport};
use gc_core::{GcOptions, MetricPath, PathEntry, Result, RollupPeriod, Sample};
use store_client::{MetricStore, PathStore};

use crate::fixtures::{path, TENANT};
use crate::mocks::{InMemoryMetricStore, InMemoryPathStore};

/// Test context with both stores in memory.
///
/// Operations run through the same `execute` entry point the binary uses;
/// only the store implementations differ.
pub struct TestContext {
    pub metric_store: Arc<InMemoryMetricStore>,
    pub path_store: Arc<InMemoryPathStore>,
}

impl TestContext {
    pub fn new() -> Self {
        Self {
            metric_store: Arc::new(InMemoryMetricStore::new()),
            path_store: Arc::new(InMemoryPathStore::new()),
        }
    }

    /// Registers a leaf path and stores `samples` under every tier given.
    pub fn add_series(&self, name: &str, rollups: &[RollupPeriod], samples: &[Sample]) {
        let leaf = path(name);
        self.path_store.insert(TENANT, PathEntry::leaf(leaf.clone()));
        for rollup in rollups {
            self.metric_store.insert(TENANT, *rollup, &leaf, samples);
        }
    }

    /// Registers a leaf path with no samples at all.
    pub fn add_leaf(&self, name: &str) {
        self.path_store.insert(TENANT, PathEntry::leaf(path(name)));
    }

    /// Registers a branch path.
    pub fn add_branch(&self, name: &str) {
        self.path_store.insert(TENANT, PathEntry::branch(path(name)));
    }

    /// Registers `name` and all its ancestors as branches.
    pub fn add_branches(&self, name: &str) {
        let mut current: Option<MetricPath> = Some(path(name));
        while let Some(p) = current {
            if p.is_root() {
                break;
            }
            self.path_store.insert(TENANT, PathEntry::branch(p.clone()));
            current = p.parent();
        }
    }

    pub fn context(&self, options: GcOptions) -> GcContext {
        let metric_store: Arc<dyn MetricStore> = self.metric_store.clone();
        let path_store: Arc<dyn PathStore> = self.path_store.clone();
        GcContext::new(metric_store, path_store, options)
    }

    /// Runs one operation.
    pub async fn run(&self, command: Command, options: GcOptions) -> Result<OperationReport> {
        let ctx = self.context(options);
        execute(&ctx, command).await
    }

    /// Paths left in the path store.
    pub fn stored_paths(&self) -> Vec<String> {
        self.path_store.paths(TENANT)
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
