//! Tracing, run statistics, and progress reporting.
//!
//! Every operation gets a fresh [`RunStats`] and reports progress through an
//! injected [`ProgressSink`]; nothing here is global except the tracing
//! subscriber.

pub mod progress;
pub mod stats;
pub mod tracing_setup;

pub use progress::*;
pub use stats::*;
pub use tracing_setup::*;
