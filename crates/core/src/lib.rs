//! Core types, path tree, and options for the metric garbage collector.

pub mod error;
pub mod options;
pub mod path;
pub mod retention;
pub mod tree;
pub mod unit;

pub use error::{Error, Result};
pub use options::*;
pub use path::*;
pub use retention::*;
pub use tree::PathTree;
pub use unit::*;
