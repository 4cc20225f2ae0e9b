//! ClickHouse client wrapper.

use crate::config::ClickHouseConfig;
use clickhouse::Client;
use std::sync::atomic::{AtomicBool, Ordering};
use telemetry::Counter;
use tracing::info;

/// ClickHouse client wrapper that tracks its own failures.
pub struct ClickHouseClient {
    inner: Client,
    config: ClickHouseConfig,
    errors: Counter,
    closed: AtomicBool,
}

impl ClickHouseClient {
    /// Creates a new ClickHouse client.
    pub fn new(config: ClickHouseConfig) -> Self {
        let mut client = Client::default()
            .with_url(&config.url)
            .with_database(&config.database);

        if let Some(ref user) = config.username {
            client = client.with_user(user);
        }

        if let Some(ref pass) = config.password {
            client = client.with_password(pass);
        }

        info!(
            url = %config.url,
            database = %config.database,
            table = %config.table,
            "Created ClickHouse client"
        );

        Self {
            inner: client,
            config,
            errors: Counter::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Returns the inner clickhouse client.
    pub fn inner(&self) -> &Client {
        &self.inner
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClickHouseConfig {
        &self.config
    }

    /// `database.table` for this store.
    pub fn table(&self) -> String {
        self.config.qualified_table()
    }

    pub fn record_error(&self) {
        self.errors.inc();
    }

    pub fn error_count(&self) -> u64 {
        self.errors.get()
    }

    /// Marks the handle closed. Returns false if it already was.
    pub fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
