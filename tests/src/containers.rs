//! A ClickHouse server for the store backend tests.
//!
//! `METRIC_GC_TEST_CLICKHOUSE_URL` selects an already running server;
//! otherwise a throwaway container is started and kept alive with the handle.

use std::env;
use std::time::{Duration, Instant};

use store_client::schema::{init_schema, metric_store_tables, path_store_tables};
use store_client::{
    health, ClickHouseClient, ClickHouseConfig, ClickHouseMetricStore, ClickHousePathStore,
    StoresConfig,
};
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};

const IMAGE: &str = "clickhouse/clickhouse-server";
const TAG: &str = "24.3";
const DATABASE: &str = "metrics";
const READY_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection details for the server under test.
pub struct ClickHouseServer {
    _container: Option<ContainerAsync<GenericImage>>,
    url: String,
    database: String,
    username: Option<String>,
    password: Option<String>,
}

impl ClickHouseServer {
    pub async fn start() -> Self {
        let server = match external() {
            Some(server) => server,
            None => {
                let container = GenericImage::new(IMAGE, TAG)
                    .with_wait_for(WaitFor::seconds(5))
                    .with_exposed_port(8123.tcp())
                    .with_env_var("CLICKHOUSE_DB", DATABASE)
                    .with_env_var("CLICKHOUSE_DEFAULT_ACCESS_MANAGEMENT", "1")
                    .start()
                    .await
                    .expect("Failed to start ClickHouse");
                let port = container
                    .get_host_port_ipv4(8123)
                    .await
                    .expect("ClickHouse HTTP port not mapped");

                Self {
                    _container: Some(container),
                    url: format!("http://127.0.0.1:{}", port),
                    database: DATABASE.to_string(),
                    username: Some("default".to_string()),
                    password: None,
                }
            }
        };

        server.wait_ready().await;
        server
    }

    /// Store settings with both tables on this server.
    pub fn stores_config(&self) -> StoresConfig {
        let on_server = |base: ClickHouseConfig| ClickHouseConfig {
            url: self.url.clone(),
            database: self.database.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            ..base
        };
        StoresConfig {
            metric_store: on_server(ClickHouseConfig::metric_store()),
            path_store: on_server(ClickHouseConfig::path_store()),
        }
    }

    /// Both backends, with their tables created.
    pub async fn stores(&self) -> (ClickHouseMetricStore, ClickHousePathStore) {
        let config = self.stores_config();
        let metric = ClickHouseMetricStore::new(config.metric_store.clone());
        let path = ClickHousePathStore::new(config.path_store.clone());

        init_schema(metric.client(), &metric_store_tables(&config))
            .await
            .expect("Failed to create metric table");
        init_schema(path.client(), &path_store_tables(&config))
            .await
            .expect("Failed to create path table");

        (metric, path)
    }

    async fn wait_ready(&self) {
        let client = ClickHouseClient::new(self.stores_config().metric_store);
        let start = Instant::now();

        while start.elapsed() < READY_TIMEOUT {
            if health::check_connection(&client).await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        panic!("ClickHouse at {} not ready after {:?}", self.url, READY_TIMEOUT);
    }
}

fn external() -> Option<ClickHouseServer> {
    let url = env::var("METRIC_GC_TEST_CLICKHOUSE_URL")
        .ok()
        .filter(|v| !v.trim().is_empty())?;

    Some(ClickHouseServer {
        _container: None,
        url,
        database: env::var("METRIC_GC_TEST_CLICKHOUSE_DB").unwrap_or_else(|_| DATABASE.to_string()),
        username: env::var("METRIC_GC_TEST_CLICKHOUSE_USER").ok(),
        password: env::var("METRIC_GC_TEST_CLICKHOUSE_PASSWORD").ok(),
    })
}
