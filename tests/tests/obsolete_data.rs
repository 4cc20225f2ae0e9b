//! Obsolescence scanning and the `*-obsolete-data` operations.

use std::sync::Arc;

use engine::{Command, JobRunner, ObsolescenceScanner};
use gc_core::{ObsolescenceWindow, Sample};
use integration_tests::fixtures::{self, hourly, minutely, path, rollups, NOW, TENANT};
use integration_tests::mocks::{MetricCall, PathCall};
use integration_tests::setup::TestContext;
use store_client::{FetchQuery, MetricStore};
use telemetry::{NoopProgress, RunStats};

fn runner(jobs: usize) -> JobRunner {
    JobRunner::new(jobs, Arc::new(RunStats::new()), Arc::new(NoopProgress))
}

/// `servers.web1` is live; both series under `servers.web2` went quiet.
fn fleet() -> TestContext {
    let ctx = TestContext::new();
    ctx.add_branch("servers");
    ctx.add_branch("servers.web1");
    ctx.add_branch("servers.web2");
    ctx.add_series("servers.web1.cpu", &rollups(), &[Sample::new(NOW - 60, 1.0)]);
    ctx.add_series("servers.web2.cpu", &rollups(), &[Sample::new(NOW - 90_000, 1.0)]);
    ctx.add_series("servers.web2.mem", &rollups(), &[Sample::new(NOW - 90_000, 2.0)]);
    ctx
}

#[tokio::test]
async fn test_scanner_classifies_live_obsolete_and_undetermined() {
    let ctx = TestContext::new();
    ctx.metric_store
        .insert(TENANT, minutely(), &path("a.live"), &[Sample::new(NOW - 50, 1.0)]);
    ctx.metric_store
        .insert(TENANT, minutely(), &path("a.old"), &[Sample::new(NOW - 150, 1.0)]);
    ctx.metric_store
        .insert(TENANT, minutely(), &path("a.broken"), &[Sample::new(NOW - 150, 1.0)]);
    ctx.metric_store.fail_path(&path("a.broken"));

    let store: Arc<dyn MetricStore> = ctx.metric_store.clone();
    let scanner = ObsolescenceScanner::new(store, TENANT, ObsolescenceWindow::new(100, NOW));
    let runner = runner(2);

    let result = scanner
        .scan(
            &runner,
            &[path("a.live"), path("a.old"), path("a.broken")],
            &rollups(),
        )
        .await;

    assert_eq!(result.paths, vec![path("a.old")]);
    assert_eq!(result.units.len(), 2);
    assert_eq!(result.units[0].rollup, minutely());
    assert_eq!(result.units[1].rollup, hourly());
    assert_eq!(runner.stats().errors.get(), 1, "failed probe is counted");
    assert_eq!(runner.stats().processed.get(), 3);
}

#[tokio::test]
async fn test_scanner_probes_first_rollup_only() {
    let ctx = fleet();
    let store: Arc<dyn MetricStore> = ctx.metric_store.clone();
    let scanner = ObsolescenceScanner::new(store, TENANT, ObsolescenceWindow::new(3_600, NOW));

    scanner
        .scan(&runner(1), &[path("servers.web1.cpu")], &rollups())
        .await;

    assert_eq!(
        ctx.metric_store.calls(),
        vec![MetricCall::Fetch {
            path: path("servers.web1.cpu"),
            rollup: minutely(),
            query: FetchQuery::probe(NOW - 3_600),
        }]
    );
}

#[tokio::test]
async fn test_scanner_without_rollups_finds_nothing() {
    let ctx = fleet();
    let store: Arc<dyn MetricStore> = ctx.metric_store.clone();
    let scanner = ObsolescenceScanner::new(store, TENANT, ObsolescenceWindow::new(100, NOW));

    let result = scanner.scan(&runner(1), &[path("servers.web2.cpu")], &[]).await;

    assert!(result.is_empty());
    assert!(ctx.metric_store.calls().is_empty());
}

#[tokio::test]
async fn test_list_obsolete_data() {
    let ctx = fleet();

    let report = ctx
        .run(
            Command::ListObsoleteData,
            fixtures::options(&["servers"]).with_threshold(3_600),
        )
        .await
        .unwrap();

    assert_eq!(
        report.lines,
        vec![
            "Path: servers.web2.cpu, rollup: 60, period: 43200",
            "Path: servers.web2.cpu, rollup: 3600, period: 8760",
            "Path: servers.web2.mem, rollup: 60, period: 43200",
            "Path: servers.web2.mem, rollup: 3600, period: 8760",
        ]
    );
    assert!(ctx.metric_store.mutations().is_empty());
    assert!(ctx.path_store.mutations().is_empty());
}

#[tokio::test]
async fn test_remove_obsolete_data_cleans_series_paths_and_empty_branches() {
    let ctx = fleet();

    let report = ctx
        .run(
            Command::RemoveObsoleteData,
            fixtures::options(&["servers"])
                .with_threshold(3_600)
                .with_run(true),
        )
        .await
        .unwrap();

    for name in ["servers.web2.cpu", "servers.web2.mem"] {
        assert!(!ctx.metric_store.has_series(TENANT, minutely(), &path(name)));
        assert!(!ctx.metric_store.has_series(TENANT, hourly(), &path(name)));
    }
    assert!(ctx.metric_store.has_series(TENANT, hourly(), &path("servers.web1.cpu")));

    assert_eq!(
        ctx.path_store.mutations(),
        vec![
            PathCall::Delete(path("servers.web2.cpu")),
            PathCall::Delete(path("servers.web2.mem")),
            PathCall::Delete(path("servers.web2")),
        ]
    );
    assert_eq!(
        ctx.stored_paths(),
        vec!["servers", "servers.web1", "servers.web1.cpu"]
    );

    let affected: Vec<u64> = report.phases.iter().map(|p| p.affected).collect();
    assert_eq!(affected, vec![4, 2, 1, 1]);
    assert_eq!(report.errors, 0);
}

#[tokio::test]
async fn test_remove_obsolete_data_ignores_time_window() {
    let ctx = fleet();

    ctx.run(
        Command::RemoveObsoleteData,
        fixtures::options(&["servers.web2"])
            .with_threshold(3_600)
            .with_range(Some(0), Some(10))
            .with_run(true),
    )
    .await
    .unwrap();

    let mutations = ctx.metric_store.mutations();
    assert_eq!(mutations.len(), 4);
    assert!(mutations
        .iter()
        .all(|call| matches!(call, MetricCall::Delete { .. })));
}

#[tokio::test]
async fn test_remove_obsolete_data_dry_run() {
    let ctx = fleet();

    let report = ctx
        .run(
            Command::RemoveObsoleteData,
            fixtures::options(&["servers"]).with_threshold(3_600),
        )
        .await
        .unwrap();

    assert!(report.dry_run);
    assert!(ctx.metric_store.mutations().is_empty());
    assert!(ctx.path_store.mutations().is_empty());
    assert!(ctx.metric_store.fetch_count() > 0, "probes still run");
    assert!(report
        .lines
        .contains(&"Would remove path: servers.web2.cpu".to_string()));
    assert!(report
        .lines
        .contains(&"Would remove path: servers.web2".to_string()));
    assert_eq!(ctx.stored_paths().len(), 6);
}

#[tokio::test]
async fn test_failed_probe_keeps_the_path() {
    let ctx = fleet();
    ctx.metric_store.fail_path(&path("servers.web2.mem"));

    let report = ctx
        .run(
            Command::RemoveObsoleteData,
            fixtures::options(&["servers"])
                .with_threshold(3_600)
                .with_run(true),
        )
        .await
        .unwrap();

    assert_eq!(report.errors, 1);
    assert!(ctx.stored_paths().contains(&"servers.web2.mem".to_string()));
    assert!(ctx.stored_paths().contains(&"servers.web2".to_string()));
    assert!(!ctx.stored_paths().contains(&"servers.web2.cpu".to_string()));
}

#[tokio::test]
async fn test_failed_series_delete_keeps_the_path_indexed() {
    let ctx = fleet();
    ctx.metric_store.fail_deletes(&path("servers.web2.mem"));

    let report = ctx
        .run(
            Command::RemoveObsoleteData,
            fixtures::options(&["servers"])
                .with_threshold(3_600)
                .with_run(true),
        )
        .await
        .unwrap();

    assert_eq!(report.errors, 2, "one error per tier left behind");
    assert!(report
        .failed
        .contains(&"servers.web2.mem (rollup: 60, period: 43200)".to_string()));
    assert!(ctx.metric_store.has_series(TENANT, minutely(), &path("servers.web2.mem")));
    assert!(!ctx.metric_store.has_series(TENANT, minutely(), &path("servers.web2.cpu")));

    assert_eq!(
        ctx.path_store.mutations(),
        vec![PathCall::Delete(path("servers.web2.cpu"))]
    );
    assert!(ctx.stored_paths().contains(&"servers.web2.mem".to_string()));
    assert!(ctx.stored_paths().contains(&"servers.web2".to_string()));
}
