//! Store configuration.

use serde::{Deserialize, Serialize};

/// Connection settings for one ClickHouse-backed store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickHouseConfig {
    /// ClickHouse HTTP URL
    pub url: String,
    /// Database name
    #[serde(default = "default_database")]
    pub database: String,
    /// Username (optional)
    pub username: Option<String>,
    /// Password (optional)
    pub password: Option<String>,
    /// Table holding this store's rows
    pub table: String,
}

fn default_database() -> String {
    "metrics".to_string()
}

fn default_url() -> String {
    "http://localhost:8123".to_string()
}

impl ClickHouseConfig {
    /// Defaults for the metric (sample) store.
    pub fn metric_store() -> Self {
        Self {
            url: default_url(),
            database: default_database(),
            username: None,
            password: None,
            table: "metrics".to_string(),
        }
    }

    /// Defaults for the path index.
    pub fn path_store() -> Self {
        Self {
            table: "metric_paths".to_string(),
            ..Self::metric_store()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Fully qualified table name.
    pub fn qualified_table(&self) -> String {
        format!("{}.{}", self.database, self.table)
    }
}

/// Configuration for both stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoresConfig {
    #[serde(default = "ClickHouseConfig::metric_store")]
    pub metric_store: ClickHouseConfig,
    #[serde(default = "ClickHouseConfig::path_store")]
    pub path_store: ClickHouseConfig,
}

impl Default for StoresConfig {
    fn default() -> Self {
        Self {
            metric_store: ClickHouseConfig::metric_store(),
            path_store: ClickHouseConfig::path_store(),
        }
    }
}
