//! Unified error types for the metric garbage collector.
//!
//! Store errors carry a short code so log lines can be grepped per backend:
//! - MSTORE_001-003: Metric store errors
//! - PSTORE_001-003: Path store errors

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Metric store error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricStoreErrorCode {
    /// MSTORE_001: Fetch failed
    FetchFailed,
    /// MSTORE_002: Delete failed
    DeleteFailed,
    /// MSTORE_003: Handle already shut down
    Closed,
}

impl MetricStoreErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::FetchFailed => "MSTORE_001",
            Self::DeleteFailed => "MSTORE_002",
            Self::Closed => "MSTORE_003",
        }
    }
}

/// Path store error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStoreErrorCode {
    /// PSTORE_001: Lookup failed
    LookupFailed,
    /// PSTORE_002: Delete failed
    DeleteFailed,
    /// PSTORE_003: Handle already shut down
    Closed,
}

impl PathStoreErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::LookupFailed => "PSTORE_001",
            Self::DeleteFailed => "PSTORE_002",
            Self::Closed => "PSTORE_003",
        }
    }
}

/// Unified error type for the metric garbage collector.
#[derive(Debug, Error)]
pub enum Error {
    /// Metric store error with code.
    #[error("[{code}] {message}")]
    MetricStore { code: &'static str, message: String },

    /// Path store error with code.
    #[error("[{code}] {message}")]
    PathStore { code: &'static str, message: String },

    #[error("path not found in tree: {0}")]
    PathNotFound(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid rollup: {0}")]
    InvalidRollup(String),

    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("invalid options: {0}")]
    InvalidOptions(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("task failed: {0}")]
    Task(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a metric store error.
    pub fn metric_store(code: MetricStoreErrorCode, msg: impl Into<String>) -> Self {
        Self::MetricStore {
            code: code.code(),
            message: msg.into(),
        }
    }

    /// Create a path store error.
    pub fn path_store(code: PathStoreErrorCode, msg: impl Into<String>) -> Self {
        Self::PathStore {
            code: code.code(),
            message: msg.into(),
        }
    }

    pub fn path_not_found(path: impl Into<String>) -> Self {
        Self::PathNotFound(path.into())
    }

    pub fn invalid_path(msg: impl Into<String>) -> Self {
        Self::InvalidPath(msg.into())
    }

    pub fn invalid_rollup(msg: impl Into<String>) -> Self {
        Self::InvalidRollup(msg.into())
    }

    pub fn invalid_pattern(msg: impl Into<String>) -> Self {
        Self::InvalidPattern(msg.into())
    }

    pub fn invalid_options(msg: impl Into<String>) -> Self {
        Self::InvalidOptions(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn task(msg: impl Into<String>) -> Self {
        Self::Task(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Get the error code if this is a coded store error.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::MetricStore { code, .. } => Some(code),
            Self::PathStore { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Whether this error originated in one of the backing stores.
    pub fn is_store_error(&self) -> bool {
        matches!(self, Self::MetricStore { .. } | Self::PathStore { .. })
    }
}
