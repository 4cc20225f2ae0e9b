//! End-to-end tests for `remove-metrics` and `list-metrics`.
//!
//! Operations run through `engine::execute` against the in-memory stores,
//! which record every call so tests can check exactly what was sent.

use engine::Command;
use integration_tests::fixtures::{self, hourly, minutely, path, rollups, series, TENANT};
use integration_tests::mocks::MetricCall;
use integration_tests::setup::TestContext;

fn seeded() -> TestContext {
    let ctx = TestContext::new();
    ctx.add_series("a.b.c", &rollups(), &series(1_000, 5));
    ctx.add_series("a.b.d", &rollups(), &series(1_000, 5));
    ctx
}

#[tokio::test]
async fn test_remove_without_window_deletes_whole_series() {
    let ctx = seeded();
    let options = fixtures::options(&["a.b.*"]).with_run(true);

    let report = ctx.run(Command::RemoveMetrics, options).await.unwrap();

    assert_eq!(ctx.metric_store.fetch_count(), 0, "whole-series removal never fetches");
    assert_eq!(
        ctx.metric_store.mutations(),
        vec![
            MetricCall::Delete { path: path("a.b.c"), rollup: minutely() },
            MetricCall::Delete { path: path("a.b.c"), rollup: hourly() },
            MetricCall::Delete { path: path("a.b.d"), rollup: minutely() },
            MetricCall::Delete { path: path("a.b.d"), rollup: hourly() },
        ]
    );
    assert!(!ctx.metric_store.has_series(TENANT, minutely(), &path("a.b.c")));
    assert_eq!(report.processed, 4);
    assert_eq!(report.errors, 0);
    assert_eq!(report.affected, 4);
    assert!(!report.dry_run);
}

#[tokio::test]
async fn test_remove_with_window_deletes_fetched_points_only() {
    let ctx = seeded();
    let options = fixtures::options(&["a.b.c"])
        .with_rollups(vec![minutely()])
        .with_range(Some(1_060), Some(1_180))
        .with_run(true);

    let report = ctx.run(Command::RemoveMetrics, options).await.unwrap();

    assert_eq!(
        ctx.metric_store.mutations(),
        vec![MetricCall::DeleteTimes {
            path: path("a.b.c"),
            rollup: minutely(),
            times: vec![1_060, 1_120, 1_180],
        }]
    );
    let left: Vec<i64> = ctx
        .metric_store
        .samples(TENANT, minutely(), &path("a.b.c"))
        .iter()
        .map(|s| s.time)
        .collect();
    assert_eq!(left, vec![1_000, 1_240]);
    assert_eq!(report.affected, 3);
}

#[tokio::test]
async fn test_remove_with_window_and_no_points_deletes_nothing() {
    let ctx = seeded();
    let options = fixtures::options(&["a.b.c"])
        .with_range(Some(5_000), None)
        .with_run(true);

    let report = ctx.run(Command::RemoveMetrics, options).await.unwrap();

    assert_eq!(ctx.metric_store.fetch_count(), 2);
    assert!(ctx.metric_store.mutations().is_empty());
    assert_eq!(report.errors, 0);
}

#[tokio::test]
async fn test_dry_run_never_mutates() {
    let ctx = seeded();

    let whole = ctx
        .run(Command::RemoveMetrics, fixtures::options(&["a.b.*"]))
        .await
        .unwrap();
    assert!(whole.dry_run);
    assert_eq!(whole.lines.len(), 4);
    assert!(whole.lines[0].starts_with("Would remove a.b.c"));

    let ctx = seeded();
    let points = ctx
        .run(
            Command::RemoveMetrics,
            fixtures::options(&["a.b.*"]).with_range(Some(1_000), Some(1_060)),
        )
        .await
        .unwrap();

    assert!(ctx.metric_store.mutations().is_empty());
    assert!(ctx.path_store.mutations().is_empty());
    assert_eq!(ctx.metric_store.fetch_count(), 4, "reads still happen in dry mode");
    assert_eq!(points.processed, 4);
    assert!(points.lines[0].starts_with("Would remove 2 points from a.b.c"));
    assert_eq!(
        ctx.metric_store.samples(TENANT, minutely(), &path("a.b.c")).len(),
        5
    );
}

#[tokio::test]
async fn test_list_metrics_emits_one_line_per_sample() {
    let ctx = TestContext::new();
    ctx.add_series("a.x", &[minutely()], &series(100, 2));

    let report = ctx
        .run(
            Command::ListMetrics,
            fixtures::options(&["a.x"]).with_rollups(vec![minutely()]),
        )
        .await
        .unwrap();

    assert_eq!(
        report.lines,
        vec![
            "Path: a.x, rollup: 60, period: 43200, time: 100, data: 0",
            "Path: a.x, rollup: 60, period: 43200, time: 160, data: 1",
        ]
    );
    assert!(ctx.metric_store.mutations().is_empty());
}

#[tokio::test]
async fn test_list_metrics_keeps_unit_order_with_parallel_jobs() {
    let names: Vec<String> = (0..20).map(|i| format!("m.s{:02}", i)).collect();

    for jobs in [1, 2, 8] {
        let ctx = TestContext::new();
        for name in &names {
            ctx.add_series(name, &rollups(), &series(0, 1));
        }

        let report = ctx
            .run(Command::ListMetrics, fixtures::options(&["m.*"]).with_jobs(jobs))
            .await
            .unwrap();

        let expected: Vec<String> = names
            .iter()
            .flat_map(|name| {
                rollups().into_iter().map(move |r| {
                    format!(
                        "Path: {}, rollup: {}, period: {}, time: 0, data: 0",
                        name, r.rollup, r.period
                    )
                })
            })
            .collect();
        assert_eq!(report.lines, expected, "jobs = {}", jobs);
        assert_eq!(report.processed, 40);
    }
}

#[tokio::test]
async fn test_unit_failure_does_not_abort_the_run() {
    let ctx = TestContext::new();
    for name in ["a.x", "a.y", "a.z"] {
        ctx.add_series(name, &rollups(), &series(0, 3));
    }
    ctx.metric_store.fail_path(&path("a.y"));

    let report = ctx
        .run(
            Command::RemoveMetrics,
            fixtures::options(&["a.*"]).with_jobs(2).with_run(true),
        )
        .await
        .unwrap();

    assert_eq!(report.processed, 6);
    assert_eq!(report.errors, 2, "one error per failed tier of a.y");
    assert!(!ctx.metric_store.has_series(TENANT, minutely(), &path("a.x")));
    assert!(!ctx.metric_store.has_series(TENANT, hourly(), &path("a.z")));
    assert!(ctx.metric_store.has_series(TENANT, minutely(), &path("a.y")));
}

#[tokio::test]
async fn test_store_errors_are_added_to_the_report() {
    let ctx = seeded();
    ctx.metric_store.add_store_errors(2);
    ctx.path_store.add_store_errors(1);

    let report = ctx
        .run(Command::ListMetrics, fixtures::options(&["a.b.c"]))
        .await
        .unwrap();

    assert_eq!(report.errors, 3);
}

#[tokio::test]
async fn test_stores_are_shut_down_once_even_on_failure() {
    let ctx = seeded();
    ctx.path_store.fail_lookups();

    let result = ctx
        .run(Command::RemoveMetrics, fixtures::options(&["a.*"]).with_run(true))
        .await;

    assert!(result.is_err());
    assert_eq!(ctx.metric_store.shutdown_count(), 1);
    assert_eq!(ctx.path_store.shutdown_count(), 1);
    assert!(ctx.metric_store.mutations().is_empty());
}

#[tokio::test]
async fn test_metric_commands_require_rollups() {
    let ctx = seeded();
    let err = ctx
        .run(
            Command::ListMetrics,
            fixtures::options(&["a.*"]).with_rollups(vec![]),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, gc_core::Error::InvalidRollup(_)));
}
