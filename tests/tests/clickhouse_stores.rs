//! ClickHouse store backends against a real server.
//!
//! Requires Docker for the ClickHouse testcontainer, or
//! `METRIC_GC_TEST_CLICKHOUSE_URL` pointing at a running server.
//! Run with `cargo test -p integration-tests --test clickhouse_stores -- --ignored`.

use gc_core::{MetricPath, RollupPeriod, Sample};
use integration_tests::containers::ClickHouseServer;
use store_client::{
    health, ClickHouseMetricStore, ClickHousePathStore, FetchQuery, LookupQuery, MetricStore,
    PathStore,
};

struct Stores {
    _server: ClickHouseServer,
    metric: ClickHouseMetricStore,
    path: ClickHousePathStore,
}

async fn stores() -> Stores {
    let server = ClickHouseServer::start().await;
    let (metric, path) = server.stores().await;
    Stores {
        _server: server,
        metric,
        path,
    }
}

fn path(s: &str) -> MetricPath {
    MetricPath::parse(s).unwrap()
}

async fn insert_sample(
    store: &ClickHouseMetricStore,
    tenant: &str,
    rollup: RollupPeriod,
    name: &str,
    sample: Sample,
) {
    let sql = format!(
        "INSERT INTO {} (tenant, rollup, period, path, time, data) VALUES (?, ?, ?, ?, ?, ?)",
        store.client().table()
    );
    store
        .client()
        .inner()
        .query(&sql)
        .bind(tenant)
        .bind(rollup.rollup)
        .bind(rollup.period)
        .bind(name)
        .bind(sample.time)
        .bind(sample.data)
        .execute()
        .await
        .expect("Failed to insert sample");
}

async fn insert_path(store: &ClickHousePathStore, tenant: &str, name: &str, leaf: bool) {
    let sql = format!(
        "INSERT INTO {} (tenant, path, leaf) VALUES (?, ?, ?)",
        store.client().table()
    );
    store
        .client()
        .inner()
        .query(&sql)
        .bind(tenant)
        .bind(name)
        .bind(leaf)
        .execute()
        .await
        .expect("Failed to insert path");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_health_check() {
    let stores = stores().await;

    assert!(health::check_connection(stores.metric.client()).await);
    assert!(health::check_connection(stores.path.client()).await);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_fetch_respects_bounds_and_limit() {
    let stores = stores().await;
    let tenant = "fetch-tenant";
    let rollup = RollupPeriod::new(60, 43_200);

    for (i, time) in [100, 160, 220, 280].into_iter().enumerate() {
        let sample = Sample::new(time, i as f64);
        insert_sample(&stores.metric, tenant, rollup, "a.b.c", sample).await;
    }
    insert_sample(&stores.metric, "other", rollup, "a.b.c", Sample::new(100, 9.0)).await;

    let all = stores
        .metric
        .fetch(tenant, rollup, &path("a.b.c"), FetchQuery::default())
        .await
        .unwrap();
    let times: Vec<i64> = all.iter().map(|s| s.time).collect();
    assert_eq!(times, vec![100, 160, 220, 280]);

    let windowed = stores
        .metric
        .fetch(
            tenant,
            rollup,
            &path("a.b.c"),
            FetchQuery {
                from: Some(160),
                to: Some(220),
                limit: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(windowed, vec![Sample::new(160, 1.0), Sample::new(220, 2.0)]);

    let probe = stores
        .metric
        .fetch(tenant, rollup, &path("a.b.c"), FetchQuery::probe(200))
        .await
        .unwrap();
    assert_eq!(probe, vec![Sample::new(220, 2.0)]);

    let other_tier = stores
        .metric
        .fetch(
            tenant,
            RollupPeriod::new(3_600, 8_760),
            &path("a.b.c"),
            FetchQuery::default(),
        )
        .await
        .unwrap();
    assert!(other_tier.is_empty());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_lookup_scopes() {
    let stores = stores().await;
    let tenant = "lookup-tenant";

    insert_path(&stores.path, tenant, "a", false).await;
    insert_path(&stores.path, tenant, "a.b", false).await;
    insert_path(&stores.path, tenant, "a.b.c", true).await;
    insert_path(&stores.path, tenant, "a.d", true).await;
    insert_path(&stores.path, tenant, "ab", true).await;
    insert_path(&stores.path, "other", "a.x", true).await;

    let names = |entries: Vec<gc_core::PathEntry>| -> Vec<String> {
        entries.iter().map(|e| e.path.to_string()).collect()
    };

    let subtree = stores
        .path
        .lookup(tenant, &LookupQuery::new("a"))
        .await
        .unwrap();
    assert_eq!(names(subtree), vec!["a", "a.b", "a.b.c", "a.d"]);

    let leaves = stores
        .path
        .lookup(tenant, &LookupQuery::new("a.*").leafs_only(true).limit_depth(true))
        .await
        .unwrap();
    assert_eq!(names(leaves), vec!["a.d"]);

    let excluded = stores
        .path
        .lookup(tenant, &LookupQuery::new("a").excluding(vec!["a.b".to_string()]))
        .await
        .unwrap();
    assert_eq!(names(excluded), vec!["a", "a.d"]);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_calls_after_shutdown_fail() {
    let stores = stores().await;

    stores.metric.shutdown().await;
    stores.path.shutdown().await;

    let err = stores
        .metric
        .fetch("t", RollupPeriod::new(60, 10), &path("a"), FetchQuery::default())
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), Some("MSTORE_003"));

    let err = stores
        .path
        .lookup("t", &LookupQuery::new("a"))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), Some("PSTORE_003"));
    assert_eq!(stores.metric.stats().errors, 0);
}
