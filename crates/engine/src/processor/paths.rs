use std::sync::Arc;

use async_trait::async_trait;
use gc_core::{PathEntry, Result};
use store_client::PathStore;
use telemetry::Counter;
use tracing::{debug, info};

use super::{FinalStats, PathProcessor};
use crate::context::GcContext;

/// How [`PathRemove`] deletes from the path store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveMode {
    /// One exact delete per entry.
    Each,
    /// Nothing is deleted per entry. The caller deletes in bulk by pattern
    /// and reports what went through with [`PathRemove::confirm_removed`].
    Deferred,
}

/// Removes path-store entries.
pub struct PathRemove {
    store: Arc<dyn PathStore>,
    tenant: String,
    run: bool,
    mode: RemoveMode,
    removed: Counter,
}

impl PathRemove {
    pub fn new(ctx: &GcContext, mode: RemoveMode) -> Self {
        Self {
            store: ctx.path_store.clone(),
            tenant: ctx.tenant().to_string(),
            run: ctx.options.run,
            mode,
            removed: Counter::new(),
        }
    }

    /// Counts `n` entries removed by a bulk delete.
    pub fn confirm_removed(&self, n: u64) {
        self.removed.inc_by(n);
    }
}

#[async_trait]
impl PathProcessor for PathRemove {
    fn title(&self) -> &'static str {
        "Removing paths"
    }

    async fn process_path(&self, entry: &PathEntry) -> Result<Vec<String>> {
        if !self.run {
            info!(path = %entry.path, "Dry run, path kept");
            self.removed.inc();
            return Ok(vec![format!("Would remove path: {}", entry.path)]);
        }

        if self.mode == RemoveMode::Deferred {
            return Ok(Vec::new());
        }

        self.store.delete(&self.tenant, &entry.path).await?;
        self.removed.inc();
        debug!(path = %entry.path, "Removed path");
        Ok(Vec::new())
    }

    fn final_stats(&self, external_errors: u64) -> FinalStats {
        FinalStats {
            title: self.title(),
            affected: self.removed.get(),
            external_errors,
        }
    }
}

/// Prints each resolved path.
#[derive(Default)]
pub struct PathList {
    listed: Counter,
}

impl PathList {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PathProcessor for PathList {
    fn title(&self) -> &'static str {
        "Listing paths"
    }

    async fn process_path(&self, entry: &PathEntry) -> Result<Vec<String>> {
        self.listed.inc();
        Ok(vec![entry.path.to_string()])
    }

    fn final_stats(&self, external_errors: u64) -> FinalStats {
        FinalStats {
            title: self.title(),
            affected: self.listed.get(),
            external_errors,
        }
    }
}
