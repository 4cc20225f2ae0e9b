//! Maintenance engine for the metric store.
//!
//! Resolves path patterns, fans work out over a bounded worker pool, finds
//! obsolete series and prunes path-index branches left empty.

pub mod context;
pub mod ops;
pub mod processor;
pub mod runner;
pub mod scanner;
pub mod walker;

pub use context::GcContext;
pub use ops::{check_stores, execute, Command, OperationReport};
pub use processor::{FinalStats, PathProcessor, UnitProcessor};
pub use runner::JobRunner;
pub use scanner::{ObsolescenceScanner, ScanResult};
pub use walker::{walk, TreeVisitor, WalkEntry};
