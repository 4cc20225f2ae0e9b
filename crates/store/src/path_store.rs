//! Path store: searchable index of dotted metric names.

use async_trait::async_trait;
use clickhouse::Row;
use gc_core::error::PathStoreErrorCode;
use gc_core::{Error, MetricPath, PathEntry, Result};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::client::ClickHouseClient;
use crate::config::ClickHouseConfig;
use crate::health;
use crate::pattern::PathPattern;
use crate::StoreStats;

/// A pattern lookup against the path index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupQuery {
    pub pattern: String,
    /// Only entries naming actual series
    pub leafs_only: bool,
    /// Only entries at the pattern's own depth
    pub limit_depth: bool,
    /// Matches of any of these patterns are dropped
    pub exclude: Vec<String>,
}

impl LookupQuery {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            ..Self::default()
        }
    }

    pub fn leafs_only(mut self, leafs_only: bool) -> Self {
        self.leafs_only = leafs_only;
        self
    }

    pub fn limit_depth(mut self, limit_depth: bool) -> Self {
        self.limit_depth = limit_depth;
        self
    }

    pub fn excluding(mut self, exclude: Vec<String>) -> Self {
        self.exclude = exclude;
        self
    }

    /// Compiled include pattern.
    pub fn compile(&self) -> Result<PathPattern> {
        PathPattern::compile(&self.pattern, self.limit_depth)
    }

    /// Compiled exclusion patterns. Exclusions always cover descendants.
    pub fn compile_excludes(&self) -> Result<Vec<PathPattern>> {
        self.exclude
            .iter()
            .map(|p| PathPattern::compile(p, false))
            .collect()
    }
}

/// Operations the engine needs from the path index.
#[async_trait]
pub trait PathStore: Send + Sync {
    /// Entries matching `query`, ordered by path.
    async fn lookup(&self, tenant: &str, query: &LookupQuery) -> Result<Vec<PathEntry>>;

    /// Removes one exact entry.
    async fn delete(&self, tenant: &str, path: &MetricPath) -> Result<()>;

    /// Removes every entry matching the pattern.
    async fn delete_query(
        &self,
        tenant: &str,
        leafs_only: bool,
        limit_depth: bool,
        pattern: &str,
    ) -> Result<()>;

    /// Whether the backend answers at all.
    async fn ping(&self) -> bool;

    /// Errors counted by the store itself since creation.
    fn stats(&self) -> StoreStats;

    /// Releases the handle. Calls after shutdown fail.
    async fn shutdown(&self);
}

#[derive(Debug, Clone, Row, Deserialize)]
struct PathRow {
    path: String,
    leaf: bool,
}

/// ClickHouse-backed path index.
pub struct ClickHousePathStore {
    client: ClickHouseClient,
}

impl ClickHousePathStore {
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
            return Err(Error::path_store(
                PathStoreErrorCode::Closed,
                "path store handle is shut down",
            ));
        }
        Ok(())
    }

    fn failure(
        &self,
        code: PathStoreErrorCode,
        op: &str,
        target: &str,
        e: clickhouse::error::Error,
    ) -> Error {
        self.client.record_error();
        error!(op = op, target = target, error = %e, "Path store query failed");
        Error::path_store(code, format!("{} {}: {}", op, target, e))
    }
}

/// WHERE clause shared by lookup and pattern deletion.
///
/// Placeholders: tenant, include regex, then one regex per exclusion.
fn match_clause(leafs_only: bool, excludes: usize) -> String {
    let mut clause = String::from("tenant = ? AND match(path, ?)");
    if leafs_only {
        clause.push_str(" AND leaf = 1");
    }
    for _ in 0..excludes {
        clause.push_str(" AND NOT match(path, ?)");
    }
    clause
}

#[async_trait]
impl PathStore for ClickHousePathStore {
    async fn lookup(&self, tenant: &str, query: &LookupQuery) -> Result<Vec<PathEntry>> {
        self.ensure_open()?;

        let pattern = query.compile()?;
        let excludes = query.compile_excludes()?;

        let sql = format!(
            "SELECT path, leaf FROM {} WHERE {} ORDER BY path",
            self.client.table(),
            match_clause(query.leafs_only, excludes.len())
        );
        let mut q = self
            .client
            .inner()
            .query(&sql)
            .bind(tenant)
            .bind(pattern.as_regex());
        for exclude in &excludes {
            q = q.bind(exclude.as_regex());
        }

        let rows: Vec<PathRow> = q.fetch_all().await.map_err(|e| {
            self.failure(PathStoreErrorCode::LookupFailed, "lookup", &query.pattern, e)
        })?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            match MetricPath::parse(&row.path) {
                Ok(path) => entries.push(PathEntry::new(path, row.leaf)),
                Err(e) => warn!(path = %row.path, error = %e, "Skipping malformed path entry"),
            }
        }

        debug!(pattern = %query.pattern, matches = entries.len(), "Path lookup");
        Ok(entries)
    }

    async fn delete(&self, tenant: &str, path: &MetricPath) -> Result<()> {
        self.ensure_open()?;

        let target = path.to_string();
        let sql = format!(
            "ALTER TABLE {} DELETE WHERE tenant = ? AND path = ?",
            self.client.table()
        );
        self.client
            .inner()
            .query(&sql)
            .bind(tenant)
            .bind(target.as_str())
            .execute()
            .await
            .map_err(|e| self.failure(PathStoreErrorCode::DeleteFailed, "delete", &target, e))?;

        debug!(path = %target, "Deleted path");
        Ok(())
    }

    async fn delete_query(
        &self,
        tenant: &str,
        leafs_only: bool,
        limit_depth: bool,
        pattern: &str,
    ) -> Result<()> {
        self.ensure_open()?;

        let compiled = PathPattern::compile(pattern, limit_depth)?;
        let sql = format!(
            "ALTER TABLE {} DELETE WHERE {}",
            self.client.table(),
            match_clause(leafs_only, 0)
        );
        self.client
            .inner()
            .query(&sql)
            .bind(tenant)
            .bind(compiled.as_regex())
            .execute()
            .await
            .map_err(|e| {
                self.failure(PathStoreErrorCode::DeleteFailed, "delete_query", pattern, e)
            })?;

        debug!(pattern = pattern, "Deleted paths by pattern");
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
            info!(errors = self.client.error_count(), "Path store shut down");
        }
    }
}
