//! Tracing setup for the sweeper CLI.
//!
//! Logs go to stderr so stdout stays reserved for reports. Every run gets a
//! correlation id that is attached to the root span.

use std::io;
pub use tracing::Level;
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TracingFormat {
    /// Multi-line human-readable format
    Pretty,
    /// Single-line format, suited to CI logs
    Compact,
    /// Structured JSON, one object per line
    Json,
}

/// Log level options for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    /// Everything, including per-request traces
    Trace,
    /// Debug and above
    Debug,
    /// Info and above (default)
    Info,
    /// Warnings and above
    Warn,
    /// Errors only
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

/// Tracing configuration.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Output format.
    pub format: TracingFormat,
    /// Level used when `RUST_LOG` is not set.
    pub level: Level,
    /// Explicit filter directive, overriding both `RUST_LOG` and `level`.
    pub filter: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            format: TracingFormat::Pretty,
            level: Level::INFO,
            filter: None,
        }
    }
}

static CORRELATION_ID: std::sync::OnceLock<Uuid> = std::sync::OnceLock::new();

/// Correlation id of the current run.
pub fn correlation_id() -> Uuid {
    *CORRELATION_ID.get_or_init(Uuid::new_v4)
}

/// Filter directive for a level: our crates at `level`, octocrab quieter.
#[must_use]
pub fn default_directive(level: Level) -> String {
    let level = level.as_str().to_lowercase();
    format!("sweeper={level},sweeper_core={level},sweeper_github={level},octocrab=warn")
}

/// Install the global subscriber.
///
/// # Errors
///
/// Returns an error if the filter directive is invalid.
pub fn init_tracing(config: TracingConfig) -> miette::Result<()> {
    let env_filter = if let Some(filter) = config.filter {
        EnvFilter::try_new(filter)
    } else {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(default_directive(config.level)))
    }
    .map_err(|e| miette::miette!("Failed to create tracing filter: {e}"))?;

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.format {
        TracingFormat::Pretty => {
            let layer = tracing_subscriber::fmt::layer()
                .pretty()
                .with_writer(io::stderr)
                .with_target(false);

            registry.with(layer).init();
        }
        TracingFormat::Compact => {
            let layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(io::stderr)
                .with_target(false)
                .with_thread_ids(false);

            registry.with(layer).init();
        }
        TracingFormat::Json => {
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(io::stderr)
                .with_current_span(true)
                .with_span_list(true);

            registry.with(layer).init();
        }
    }

    tracing::debug!(
        correlation_id = %correlation_id(),
        version = env!("CARGO_PKG_VERSION"),
        format = ?config.format,
        "Tracing initialized"
    );

    Ok(())
}

/// Root span for a command, carrying the correlation id.
#[must_use]
pub fn command_span(command: &str) -> tracing::Span {
    tracing::info_span!(
        "sweeper",
        command,
        correlation_id = %correlation_id(),
    )
}
