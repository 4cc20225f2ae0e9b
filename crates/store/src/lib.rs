//! Metric and path store clients for the metric garbage collector.
//!
//! The engine only talks to the [`MetricStore`] and [`PathStore`] traits;
//! the ClickHouse implementations here are the production backends.

pub mod client;
pub mod config;
pub mod health;
pub mod metric_store;
pub mod path_store;
pub mod pattern;
pub mod schema;

pub use client::*;
pub use config::*;
pub use metric_store::*;
pub use path_store::*;
pub use pattern::PathPattern;

/// Store-side counters, cumulative since the handle was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub errors: u64,
}
