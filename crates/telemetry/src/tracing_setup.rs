//! Log output for the command line.
//!
//! Everything goes to stderr so listings on stdout stay clean. `RUST_LOG`
//! wins over the verbosity flags when set.

use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    /// One JSON object per line, fields flattened.
    Json,
}

/// Logging knobs taken from the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSettings {
    /// Number of `-v` flags.
    pub verbosity: u8,
    pub format: LogFormat,
}

impl LogSettings {
    /// Filter used when `RUST_LOG` is absent. Quiet by default so progress
    /// bars are not torn by log lines.
    pub fn directive(&self) -> &'static str {
        match self.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

/// Install the global subscriber. Call once, after argument parsing.
pub fn init_tracing(settings: &LogSettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.directive()));

    let registry = tracing_subscriber::registry().with(filter);
    match settings.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(settings.verbosity > 1),
            )
            .init(),
    }
}
