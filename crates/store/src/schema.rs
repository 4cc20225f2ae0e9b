//! ClickHouse table schemas.
//!
//! Both tables are keyed by tenant first so every statement the engine issues
//! hits one tenant's key range.

use crate::client::ClickHouseClient;
use crate::config::StoresConfig;
use gc_core::Result;

/// DDL for the sample table.
///
/// One row per sample; a series is identified by (tenant, rollup, period, path).
pub fn create_metrics_table(table: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {} (
    tenant LowCardinality(String),
    rollup UInt32,
    period UInt32,
    path String,
    time Int64,
    data Float64
)
ENGINE = MergeTree()
ORDER BY (tenant, rollup, period, path, time)
SETTINGS index_granularity = 8192
"#,
        table
    )
}

/// DDL for the path index.
pub fn create_paths_table(table: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {} (
    tenant LowCardinality(String),
    path String,
    leaf Bool
)
ENGINE = ReplacingMergeTree()
ORDER BY (tenant, path)
"#,
        table
    )
}

/// DDL for the database.
pub fn create_database(database: &str) -> String {
    format!("CREATE DATABASE IF NOT EXISTS {}", database)
}

/// Statements creating the metric store's database and table.
pub fn metric_store_tables(config: &StoresConfig) -> Vec<String> {
    vec![
        create_database(&config.metric_store.database),
        create_metrics_table(&config.metric_store.qualified_table()),
    ]
}

/// Statements creating the path store's database and table.
pub fn path_store_tables(config: &StoresConfig) -> Vec<String> {
    vec![
        create_database(&config.path_store.database),
        create_paths_table(&config.path_store.qualified_table()),
    ]
}

/// Run DDL statements against a store.
pub async fn init_schema(client: &ClickHouseClient, statements: &[String]) -> Result<()> {
    for sql in statements {
        client
            .inner()
            .query(sql)
            .execute()
            .await
            .map_err(|e| gc_core::Error::internal(format!("Schema init error: {}", e)))?;
    }
    Ok(())
}
