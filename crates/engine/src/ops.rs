//! Top-level operations.
//!
//! Each operation resolves patterns through the path store, runs one or more
//! processor phases and returns an [`OperationReport`]. Both store handles
//! are shut down once the operation is over, whether it succeeded or not.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use gc_core::{Error, MetricPath, PathEntry, PathTree, Result};
use serde::Serialize;
use store_client::PathPattern;
use tracing::{error, info, warn};

use crate::context::GcContext;
use crate::processor::{
    collect_path_map, lookup_entries, EmptyPathPrune, FinalStats, MetricList, MetricRemove,
    ObsoleteList, ObsoleteRemove, PathList, PathProcessor, PathRemove, RemoveMode, UnitProcessor,
};
use crate::runner::JobRunner;
use crate::walker::walk;

/// Operations the collector can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Command {
    RemoveMetrics,
    ListMetrics,
    RemovePaths,
    ListPaths,
    RemoveObsoleteData,
    ListObsoleteData,
    ListEmptyPaths,
    RemoveEmptyPaths,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::RemoveMetrics => "remove-metrics",
            Command::ListMetrics => "list-metrics",
            Command::RemovePaths => "remove-paths",
            Command::ListPaths => "list-paths",
            Command::RemoveObsoleteData => "remove-obsolete-data",
            Command::ListObsoleteData => "list-obsolete-data",
            Command::ListEmptyPaths => "list-empty-paths",
            Command::RemoveEmptyPaths => "remove-empty-paths",
        }
    }

    /// Whether the command deletes anything when run for real.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Command::RemoveMetrics
                | Command::RemovePaths
                | Command::RemoveObsoleteData
                | Command::RemoveEmptyPaths
        )
    }

    /// Whether the command works on series and so needs rollups.
    pub fn needs_rollups(&self) -> bool {
        matches!(
            self,
            Command::RemoveMetrics
                | Command::ListMetrics
                | Command::RemoveObsoleteData
                | Command::ListObsoleteData
        )
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one operation.
#[derive(Debug, Clone, Serialize)]
pub struct OperationReport {
    pub title: &'static str,
    pub dry_run: bool,
    /// Units and paths attempted
    pub processed: u64,
    /// Unit errors plus errors counted by both stores
    pub errors: u64,
    /// Units, paths and patterns that failed, in the order they failed
    pub failed: Vec<String>,
    /// Sum of what every phase affected
    pub affected: u64,
    pub duration: Duration,
    pub phases: Vec<FinalStats>,
    /// Output lines, in order
    pub lines: Vec<String>,
}

#[derive(Default)]
struct Phases {
    phases: Vec<FinalStats>,
    lines: Vec<String>,
}

impl Phases {
    fn push(&mut self, stats: FinalStats, lines: Vec<String>) {
        self.phases.push(stats);
        self.lines.extend(lines);
    }
}

/// Pings both stores before any work starts.
///
/// When either one does not answer, both handles are shut down and the
/// operation must not be run.
pub async fn check_stores(ctx: &GcContext) -> Result<()> {
    let metric_up = ctx.metric_store.ping().await;
    let path_up = ctx.path_store.ping().await;
    if metric_up && path_up {
        return Ok(());
    }

    ctx.metric_store.shutdown().await;
    ctx.path_store.shutdown().await;

    let down = match (metric_up, path_up) {
        (false, false) => "metric store and path store",
        (false, true) => "metric store",
        _ => "path store",
    };
    Err(Error::unavailable(format!("{} not reachable", down)))
}

/// Runs `command` and shuts both stores down afterwards.
pub async fn execute(ctx: &GcContext, command: Command) -> Result<OperationReport> {
    let outcome = run_command(ctx, command).await;

    let external_errors = ctx.store_errors();
    ctx.metric_store.shutdown().await;
    ctx.path_store.shutdown().await;

    let phases = outcome.map_err(|e| {
        error!(command = %command, error = %e, "Operation failed");
        e
    })?;

    let stats = ctx.stats.report(external_errors);
    let report = OperationReport {
        title: title_of(command),
        dry_run: ctx.is_dry_run(),
        processed: stats.processed,
        errors: stats.errors,
        failed: ctx.stats.failed(),
        affected: phases.phases.iter().map(|p| p.affected).sum(),
        duration: stats.duration,
        phases: phases.phases,
        lines: phases.lines,
    };

    info!(
        command = %command,
        processed = report.processed,
        errors = report.errors,
        affected = report.affected,
        "Operation finished"
    );
    Ok(report)
}

fn title_of(command: Command) -> &'static str {
    match command {
        Command::RemoveMetrics => "Remove metrics",
        Command::ListMetrics => "List metrics",
        Command::RemovePaths => "Remove paths",
        Command::ListPaths => "List paths",
        Command::RemoveObsoleteData => "Remove obsolete data",
        Command::ListObsoleteData => "List obsolete data",
        Command::ListEmptyPaths => "List empty paths",
        Command::RemoveEmptyPaths => "Remove empty paths",
    }
}

async fn run_command(ctx: &GcContext, command: Command) -> Result<Phases> {
    if command.needs_rollups() {
        ctx.options.validate_with_rollups()?;
    } else {
        ctx.options.validate()?;
    }
    if command.is_mutating() && ctx.is_dry_run() {
        warn!(command = %command, "Dry run, nothing will be deleted");
    }

    let mut phases = Phases::default();
    match command {
        Command::RemoveMetrics => {
            let processor = Arc::new(MetricRemove::new(ctx));
            let lines = run_units(ctx, processor.clone()).await?;
            phases.push(processor.final_stats(ctx.store_errors()), lines);
        }
        Command::ListMetrics => {
            let processor = Arc::new(MetricList::new(ctx));
            let lines = run_units(ctx, processor.clone()).await?;
            phases.push(processor.final_stats(ctx.store_errors()), lines);
        }
        Command::RemovePaths => remove_paths(ctx, &mut phases).await?,
        Command::ListPaths => {
            let entries = resolve_path_entries(ctx).await?;
            let processor = PathList::new();
            let lines = run_paths(ctx, &processor, &entries).await;
            phases.push(processor.final_stats(ctx.store_errors()), lines);
        }
        Command::RemoveObsoleteData => remove_obsolete_data(ctx, &mut phases).await?,
        Command::ListObsoleteData => {
            let processor = Arc::new(ObsoleteList::new(ctx));
            let lines = run_units(ctx, processor.clone()).await?;
            phases.push(processor.final_stats(ctx.store_errors()), lines);
        }
        Command::ListEmptyPaths => {
            let (stats, empty) = find_empty_paths(ctx, &HashSet::new()).await?;
            let lines = empty.iter().map(|p| p.to_string()).collect();
            phases.push(stats, lines);
        }
        Command::RemoveEmptyPaths => {
            let (stats, empty) = find_empty_paths(ctx, &HashSet::new()).await?;
            phases.push(stats, Vec::new());
            remove_each(ctx, &empty, false, &mut phases).await;
        }
    }
    Ok(phases)
}

/// Resolves paths and units, then dispatches every unit through the runner.
async fn run_units<P>(ctx: &GcContext, processor: Arc<P>) -> Result<Vec<String>>
where
    P: UnitProcessor + 'static,
{
    let runner = JobRunner::from_context(ctx);

    let mut paths = processor.resolve_paths(ctx).await?;
    if ctx.options.sort {
        paths.sort();
    }
    let units = processor.resolve_units(ctx, &runner, &paths).await?;
    info!(
        title = processor.title(),
        paths = paths.len(),
        units = units.len(),
        "Processing units"
    );

    let range = ctx.options.time_range();
    let worker = processor.clone();
    let results = runner
        .run(processor.title(), units, move |unit| {
            let worker = worker.clone();
            async move { worker.process_unit(&unit, range).await }
        })
        .await;

    Ok(results.into_iter().flatten().flatten().collect())
}

/// Feeds entries one at a time through `processor`. Failures are counted
/// and logged; the loop always finishes.
async fn run_paths<P>(ctx: &GcContext, processor: &P, entries: &[PathEntry]) -> Vec<String>
where
    P: PathProcessor + ?Sized,
{
    ctx.progress.start(processor.title(), entries.len() as u64);

    let mut lines = Vec::new();
    for entry in entries {
        ctx.stats.processed.inc();
        match processor.process_path(entry).await {
            Ok(out) => lines.extend(out),
            Err(e) => {
                ctx.stats.record_failure(&entry.path);
                error!(path = %entry.path, error = %e, "Path failed");
            }
        }
        ctx.progress.inc(1);
    }

    ctx.progress.finish();
    if ctx.options.sort {
        lines.sort();
    }
    lines
}

/// Every entry under the configured patterns, minus exclusions.
async fn resolve_path_entries(ctx: &GcContext) -> Result<Vec<PathEntry>> {
    let mut entries = lookup_entries(ctx, false, false, true).await?;
    if ctx.options.sort {
        entries.sort_by(|a, b| a.path.cmp(&b.path));
    }
    Ok(entries)
}

async fn remove_paths(ctx: &GcContext, phases: &mut Phases) -> Result<()> {
    let entries = resolve_path_entries(ctx).await?;

    // Without exclusions whole patterns can go in one statement each.
    if ctx.options.exclude_paths.is_empty() {
        let processor = PathRemove::new(ctx, RemoveMode::Deferred);
        let lines = run_paths(ctx, &processor, &entries).await;

        if !ctx.is_dry_run() {
            // Entries only count as removed once a pattern covering them
            // was deleted.
            let mut pending: Vec<String> = entries.iter().map(|e| e.path.to_string()).collect();
            for pattern in &ctx.options.paths {
                let compiled = PathPattern::compile(pattern, false)?;
                match ctx
                    .path_store
                    .delete_query(ctx.tenant(), false, false, pattern)
                    .await
                {
                    Ok(()) => {
                        let before = pending.len();
                        pending.retain(|name| !compiled.is_match(name));
                        processor.confirm_removed((before - pending.len()) as u64);
                    }
                    Err(e) => {
                        ctx.stats.record_failure(pattern);
                        error!(pattern = %pattern, error = %e, "Pattern delete failed");
                    }
                }
            }
        }
        phases.push(processor.final_stats(ctx.store_errors()), lines);
    } else {
        let processor = PathRemove::new(ctx, RemoveMode::Each);
        let lines = run_paths(ctx, &processor, &entries).await;
        phases.push(processor.final_stats(ctx.store_errors()), lines);
    }
    Ok(())
}

async fn remove_obsolete_data(ctx: &GcContext, phases: &mut Phases) -> Result<()> {
    let processor = Arc::new(ObsoleteRemove::new(ctx));
    let lines = run_units(ctx, processor.clone()).await?;
    phases.push(processor.final_stats(ctx.store_errors()), lines);

    // Paths with any tier left behind stay indexed.
    let cleared = processor.cleared_paths();
    remove_each(ctx, &cleared, true, phases).await;

    let removed: HashSet<MetricPath> = cleared.into_iter().collect();
    let (stats, empty) = find_empty_paths(ctx, &removed).await?;
    phases.push(stats, Vec::new());
    remove_each(ctx, &empty, false, phases).await;
    Ok(())
}

/// Deletes each path individually from the path store.
async fn remove_each(ctx: &GcContext, paths: &[MetricPath], leaf: bool, phases: &mut Phases) {
    let entries: Vec<PathEntry> = paths
        .iter()
        .map(|path| PathEntry::new(path.clone(), leaf))
        .collect();
    let processor = PathRemove::new(ctx, RemoveMode::Each);
    let lines = run_paths(ctx, &processor, &entries).await;
    phases.push(processor.final_stats(ctx.store_errors()), lines);
}

/// Builds a tree of everything under the configured patterns, leaving out
/// `removed` leaves, and prunes the branches that end up empty.
///
/// Only branches the path store reported are candidates, and branches
/// matching an exclude pattern never are. The tree itself is built without
/// exclusions, so an excluded subtree keeps its ancestors alive.
async fn find_empty_paths(
    ctx: &GcContext,
    removed: &HashSet<MetricPath>,
) -> Result<(FinalStats, Vec<MetricPath>)> {
    let excludes = ctx
        .options
        .exclude_paths
        .iter()
        .map(|p| PathPattern::compile(p, false))
        .collect::<Result<Vec<_>>>()?;

    let mut collected: BTreeMap<MetricPath, bool> = collect_path_map(ctx).await?;
    collected.retain(|path, leaf| !(*leaf && removed.contains(path)));

    let mut tree = PathTree::new();
    let mut scope = HashSet::new();
    for (path, leaf) in &collected {
        tree.insert(path, *leaf)?;
        if !*leaf {
            let name = path.to_string();
            if !excludes.iter().any(|pattern| pattern.is_match(&name)) {
                scope.insert(path.clone());
            }
        }
    }

    let mut visitor = EmptyPathPrune::new(ctx.progress.clone()).with_scope(scope);
    ctx.progress.start(
        visitor.title(),
        tree.total_leaves() + tree.branch_count() as u64 + 1,
    );
    walk(&mut tree, &mut visitor)?;
    ctx.progress.finish();

    let stats = visitor.final_stats(ctx.store_errors());
    let mut empty = visitor.into_pruned();
    if ctx.options.sort {
        empty.sort();
    }

    info!(paths = collected.len(), empty = empty.len(), "Empty path scan finished");
    Ok((stats, empty))
}
