//! Metric store: time-series samples keyed by tenant, rollup, period and path.

use async_trait::async_trait;
use clickhouse::Row;
use gc_core::error::MetricStoreErrorCode;
use gc_core::{Error, MetricPath, Result, RollupPeriod, Sample, TimeRange};
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::client::ClickHouseClient;
use crate::config::ClickHouseConfig;
use crate::health;
use crate::StoreStats;

/// Bounds for a fetch. Both ends are inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchQuery {
    pub from: Option<i64>,
    pub to: Option<i64>,
    pub limit: Option<u64>,
}

impl FetchQuery {
    /// Every sample inside `range`.
    pub fn range(range: TimeRange) -> Self {
        Self {
            from: range.from,
            to: range.to,
            limit: None,
        }
    }

    /// Cheap existence check: at most one sample at or after `from`.
    pub fn probe(from: i64) -> Self {
        Self {
            from: Some(from),
            to: None,
            limit: Some(1),
        }
    }
}

/// Operations the engine needs from the metric store.
///
/// Implementations are shared across worker tasks and must handle their own
/// connection pooling.
#[async_trait]
pub trait MetricStore: Send + Sync {
    /// Samples of one series in time order.
    async fn fetch(
        &self,
        tenant: &str,
        rollup: RollupPeriod,
        path: &MetricPath,
        query: FetchQuery,
    ) -> Result<Vec<Sample>>;

    /// Deletes only the samples at the given timestamps.
    async fn delete_times(
        &self,
        tenant: &str,
        rollup: RollupPeriod,
        path: &MetricPath,
        times: &[i64],
    ) -> Result<()>;

    /// Deletes the whole series.
    async fn delete(&self, tenant: &str, rollup: RollupPeriod, path: &MetricPath) -> Result<()>;

    /// Whether the backend answers at all.
    async fn ping(&self) -> bool;

    /// Errors counted by the store itself since creation.
    fn stats(&self) -> StoreStats;

    /// Releases the handle. Calls after shutdown fail.
    async fn shutdown(&self);
}

#[derive(Debug, Clone, Row, Deserialize)]
struct SampleRow {
    time: i64,
    data: f64,
}

/// ClickHouse-backed metric store.
pub struct ClickHouseMetricStore {
    client: ClickHouseClient,
}

impl ClickHouseMetricStore {
    pub fn new(config: ClickHouseConfig) -> Self {
        Self {
            client: ClickHouseClient::new(config),
        }
    }

    pub fn client(&self) -> &ClickHouseClient {
        &self.client
    }

    fn ensure_open(&self) -> Result<()> {
        if self.client.is_closed() {
            return Err(Error::metric_store(
                MetricStoreErrorCode::Closed,
                "metric store handle is shut down",
            ));
        }
        Ok(())
    }

    fn failure(
        &self,
        code: MetricStoreErrorCode,
        op: &str,
        path: &MetricPath,
        rollup: RollupPeriod,
        e: clickhouse::error::Error,
    ) -> Error {
        self.client.record_error();
        error!(
            op = op,
            path = %path,
            rollup = rollup.rollup,
            period = rollup.period,
            error = %e,
            "Metric store query failed"
        );
        Error::metric_store(code, format!("{} {} ({}): {}", op, path, rollup, e))
    }
}

/// Builds the fetch statement; placeholders are bound in the same order.
fn fetch_sql(table: &str, query: &FetchQuery) -> String {
    let mut sql = format!(
        "SELECT time, data FROM {} WHERE tenant = ? AND rollup = ? AND period = ? AND path = ?",
        table
    );
    if query.from.is_some() {
        sql.push_str(" AND time >= ?");
    }
    if query.to.is_some() {
        sql.push_str(" AND time <= ?");
    }
    sql.push_str(" ORDER BY time");
    if query.limit.is_some() {
        sql.push_str(" LIMIT ?");
    }
    sql
}

#[async_trait]
impl MetricStore for ClickHouseMetricStore {
    async fn fetch(
        &self,
        tenant: &str,
        rollup: RollupPeriod,
        path: &MetricPath,
        query: FetchQuery,
    ) -> Result<Vec<Sample>> {
        self.ensure_open()?;

        let sql = fetch_sql(&self.client.table(), &query);
        let mut q = self
            .client
            .inner()
            .query(&sql)
            .bind(tenant)
            .bind(rollup.rollup)
            .bind(rollup.period)
            .bind(path.to_string());
        if let Some(from) = query.from {
            q = q.bind(from);
        }
        if let Some(to) = query.to {
            q = q.bind(to);
        }
        if let Some(limit) = query.limit {
            q = q.bind(limit);
        }

        let rows: Vec<SampleRow> = q
            .fetch_all()
            .await
            .map_err(|e| self.failure(MetricStoreErrorCode::FetchFailed, "fetch", path, rollup, e))?;

        debug!(path = %path, rollup = %rollup, samples = rows.len(), "Fetched samples");
        Ok(rows.into_iter().map(|r| Sample::new(r.time, r.data)).collect())
    }

    async fn delete_times(
        &self,
        tenant: &str,
        rollup: RollupPeriod,
        path: &MetricPath,
        times: &[i64],
    ) -> Result<()> {
        self.ensure_open()?;
        if times.is_empty() {
            return Ok(());
        }

        let sql = format!(
            "ALTER TABLE {} DELETE WHERE tenant = ? AND rollup = ? AND period = ? AND path = ? AND has(?, time)",
            self.client.table()
        );
        self.client
            .inner()
            .query(&sql)
            .bind(tenant)
            .bind(rollup.rollup)
            .bind(rollup.period)
            .bind(path.to_string())
            .bind(times.to_vec())
            .execute()
            .await
            .map_err(|e| {
                self.failure(MetricStoreErrorCode::DeleteFailed, "delete_times", path, rollup, e)
            })?;

        debug!(path = %path, rollup = %rollup, points = times.len(), "Deleted points");
        Ok(())
    }

    async fn delete(&self, tenant: &str, rollup: RollupPeriod, path: &MetricPath) -> Result<()> {
        self.ensure_open()?;

        let sql = format!(
            "ALTER TABLE {} DELETE WHERE tenant = ? AND rollup = ? AND period = ? AND path = ?",
            self.client.table()
        );
        self.client
            .inner()
            .query(&sql)
            .bind(tenant)
            .bind(rollup.rollup)
            .bind(rollup.period)
            .bind(path.to_string())
            .execute()
            .await
            .map_err(|e| self.failure(MetricStoreErrorCode::DeleteFailed, "delete", path, rollup, e))?;

        debug!(path = %path, rollup = %rollup, "Deleted series");
        Ok(())
    }

    async fn ping(&self) -> bool {
        health::check_connection(&self.client).await
    }

    fn stats(&self) -> StoreStats {
        StoreStats {
            errors: self.client.error_count(),
        }
    }

    async fn shutdown(&self) {
        if self.client.close() {
            info!(
                errors = self.client.error_count(),
                "Metric store shut down"
            );
        }
    }
}
