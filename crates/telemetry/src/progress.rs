//! Progress sinks.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Receives progress ticks from the orchestrator and the tree walker.
pub trait ProgressSink: Send + Sync {
    /// Announce a new phase with `len` expected ticks.
    fn start(&self, title: &str, len: u64);

    /// Advance by `n` ticks.
    fn inc(&self, n: u64);

    /// The current phase is done.
    fn finish(&self);
}

/// Sink that discards everything. Used for programmatic runs and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn start(&self, _title: &str, _len: u64) {}

    fn inc(&self, _n: u64) {}

    fn finish(&self) {}
}

/// Terminal progress bar on stderr.
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr());
        bar.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{msg:>24} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Self { bar }
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for BarProgress {
    fn start(&self, title: &str, len: u64) {
        self.bar.reset();
        self.bar.set_length(len);
        self.bar.set_message(title.to_string());
    }

    fn inc(&self, n: u64) {
        self.bar.inc(n);
    }

    fn finish(&self) {
        self.bar.finish();
    }
}
