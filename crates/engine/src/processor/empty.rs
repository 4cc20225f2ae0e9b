use std::collections::HashSet;
use std::sync::Arc;

use gc_core::{MetricPath, PathTree, Result};
use telemetry::ProgressSink;
use tracing::debug;

use super::FinalStats;
use crate::walker::{TreeVisitor, WalkEntry};

/// Walk visitor that prunes branches left without children or leaves.
///
/// With a scope, only branches in it are pruned; everything else is treated
/// as structure that must stay.
pub struct EmptyPathPrune {
    scope: Option<HashSet<MetricPath>>,
    progress: Arc<dyn ProgressSink>,
    pruned: Vec<MetricPath>,
}

impl EmptyPathPrune {
    pub fn new(progress: Arc<dyn ProgressSink>) -> Self {
        Self {
            scope: None,
            progress,
            pruned: Vec::new(),
        }
    }

    pub fn with_scope(mut self, scope: HashSet<MetricPath>) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn title(&self) -> &'static str {
        "Finding empty paths"
    }

    /// Pruned branches in walk order: descendants before ancestors.
    pub fn pruned(&self) -> &[MetricPath] {
        &self.pruned
    }

    pub fn into_pruned(self) -> Vec<MetricPath> {
        self.pruned
    }

    pub fn final_stats(&self, external_errors: u64) -> FinalStats {
        FinalStats {
            title: self.title(),
            affected: self.pruned.len() as u64,
            external_errors,
        }
    }

    fn in_scope(&self, path: &MetricPath) -> bool {
        self.scope.as_ref().map_or(true, |scope| scope.contains(path))
    }
}

impl TreeVisitor for EmptyPathPrune {
    fn visit(&mut self, tree: &mut PathTree, entry: &WalkEntry) -> Result<()> {
        match entry {
            WalkEntry::Leaves { count, .. } => self.progress.inc(*count),
            WalkEntry::Branch(path) => {
                if !path.is_root() && self.in_scope(path) && tree.is_empty(path)? {
                    tree.prune(path)?;
                    debug!(path = %path, "Empty path");
                    self.pruned.push(path.clone());
                } else {
                    self.progress.inc(1);
                }
            }
        }
        Ok(())
    }
}
