use crate::tracing::{LogLevel, TracingFormat};
use clap::{Args, Parser, Subcommand};
use miette::{Diagnostic, Report};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::path::PathBuf;
use sweeper_core::config::{Config, OwnerKind};
use thiserror::Error;

/// Exit codes for the CLI application
pub const EXIT_OK: i32 = 0;
/// Configuration error exit code (nothing was listed or deleted)
pub const EXIT_CONFIG: i32 = 2;
/// The remote store could not be listed
pub const EXIT_REMOTE: i32 = 3;
/// The run completed but some deletions failed
pub const EXIT_PARTIAL: i32 = 4;

/// CLI-specific error types with exit code mapping
#[derive(Error, Debug, Clone, Diagnostic)]
pub enum CliError {
    /// Missing or invalid configuration (exit code 2)
    #[error("Configuration error: {message}")]
    #[diagnostic(code(sweeper::cli::config))]
    Config {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// The remote store could not be listed (exit code 3)
    #[error("Remote error: {message}")]
    #[diagnostic(code(sweeper::cli::remote))]
    Remote {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// Some deletions failed (exit code 4)
    #[error("Partial cleanup: {message}")]
    #[diagnostic(code(sweeper::cli::partial))]
    Partial {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
}

impl CliError {
    /// Create a new configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    /// Create a new remote error
    #[must_use]
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
            help: None,
        }
    }

    /// Create a partial-failure error for `failed` deletions
    #[must_use]
    pub fn partial(failed: usize) -> Self {
        Self::Partial {
            message: format!("{failed} operation(s) failed"),
            help: Some("The failures are listed in the report; rerun to retry them".to_string()),
        }
    }
}

impl From<sweeper_core::Error> for CliError {
    fn from(err: sweeper_core::Error) -> Self {
        match err {
            sweeper_core::Error::Configuration { message, help } => Self::Config { message, help },
            sweeper_core::Error::TomlParse { .. } | sweeper_core::Error::Io { .. } => {
                Self::config(err.to_string())
            }
            sweeper_core::Error::Remote { .. } => Self::Remote {
                message: err.to_string(),
                help: Some("Check that the token has actions:write and packages:delete scopes".to_string()),
            },
            _ => Self::remote(err.to_string()),
        }
    }
}

/// Map CLI error to appropriate exit code
#[must_use]
pub const fn exit_code_for(err: &CliError) -> i32 {
    match err {
        CliError::Config { .. } => EXIT_CONFIG,
        CliError::Remote { .. } => EXIT_REMOTE,
        CliError::Partial { .. } => EXIT_PARTIAL,
    }
}

/// Render an error.
///
/// In JSON mode configuration and remote errors become an error envelope on
/// stdout. A partial failure already printed its report envelope, so it is
/// always rendered on stderr.
#[allow(clippy::print_stdout, clippy::print_stderr)]
pub fn render_error(err: &CliError, json_mode: bool) {
    if json_mode && !matches!(err, CliError::Partial { .. }) {
        let error_envelope = ErrorEnvelope::new(serde_json::json!({
            "code": match err {
                CliError::Config { .. } => "config",
                CliError::Remote { .. } => "remote",
                CliError::Partial { .. } => "partial",
            },
            "message": err.to_string()
        }));

        match serde_json::to_string(&error_envelope) {
            Ok(json) => println!("{json}"),
            Err(_) => eprintln!("Error serializing error response"),
        }
    } else {
        let report = Report::new(err.clone());
        eprintln!("{report:?}");
        let _ = io::stderr().flush();
    }
}

/// Success response envelope for JSON output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkEnvelope<T> {
    /// `ok`, or `partial` when some deletions failed
    pub status: &'static str,
    /// The actual data payload
    pub data: T,
}

impl<T> OkEnvelope<T> {
    /// Create a new success envelope
    #[must_use]
    pub const fn new(data: T) -> Self {
        Self { status: "ok", data }
    }

    /// Create an envelope for a run with failures
    #[must_use]
    pub const fn partial(data: T) -> Self {
        Self {
            status: "partial",
            data,
        }
    }
}

/// Error response envelope for JSON output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope<E> {
    /// Status indicator - always "error" for failures
    pub status: &'static str,
    /// The error details
    pub error: E,
}

impl<E> ErrorEnvelope<E> {
    /// Create a new error envelope
    #[must_use]
    pub const fn new(error: E) -> Self {
        Self {
            status: "error",
            error,
        }
    }
}

/// Prune stale GitHub Actions caches and container image versions.
#[derive(Parser, Debug)]
#[command(name = "sweeper")]
#[command(about = "Prune stale GitHub Actions caches and container image versions")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to ./sweeper.toml when present).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Repository as owner/repo (overrides GITHUB_REPOSITORY).
    #[arg(long, global = true, value_name = "OWNER/REPO")]
    pub repo: Option<String>,

    /// Logging verbosity level (RUST_LOG takes precedence).
    #[arg(short = 'L', long, global = true, value_enum, default_value_t = LogLevel::Info)]
    pub level: LogLevel,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = TracingFormat::Pretty)]
    pub log_format: TracingFormat,

    /// Emit the report as a JSON envelope on stdout.
    #[arg(long, global = true)]
    pub json: bool,

    /// Append a markdown summary to this file.
    #[arg(long, global = true, env = "GITHUB_STEP_SUMMARY", value_name = "PATH")]
    pub summary_file: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Delete idle, expired and duplicate Actions caches.
    Cache(CacheArgs),
    /// Delete stale container image versions.
    Registry(RegistryArgs),
    /// Print the resolved configuration.
    ShowConfig,
    /// Print the version.
    Version,
}

impl Commands {
    /// Name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Cache(_) => "cache",
            Self::Registry(_) => "registry",
            Self::ShowConfig => "show-config",
            Self::Version => "version",
        }
    }

    /// Overlay command flags on the configuration.
    pub fn apply(&self, config: &mut Config) {
        match self {
            Self::Cache(args) => args.apply(config),
            Self::Registry(args) => args.apply(config),
            Self::ShowConfig | Self::Version => {}
        }
    }
}

/// Flags shared by the pruning commands.
#[derive(Args, Debug, Clone, Default)]
pub struct ExecutionArgs {
    /// Report what would be deleted without deleting anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Maximum concurrent API calls.
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,
}

impl ExecutionArgs {
    fn apply(&self, config: &mut Config) {
        if self.dry_run {
            config.execution.dry_run = true;
        }
        if let Some(concurrency) = self.concurrency {
            config.execution.concurrency = concurrency;
        }
    }
}

/// `sweeper cache` flags.
#[derive(Args, Debug, Clone, Default)]
pub struct CacheArgs {
    /// Delete caches not accessed for this many days.
    #[arg(long, value_name = "DAYS")]
    pub idle_days: Option<u32>,

    /// Delete caches created this many days ago.
    #[arg(long, value_name = "DAYS")]
    pub max_age_days: Option<u32>,

    #[command(flatten)]
    pub execution: ExecutionArgs,
}

impl CacheArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(days) = self.idle_days {
            config.cache.idle_days = days;
        }
        if let Some(days) = self.max_age_days {
            config.cache.max_age_days = days;
        }
        self.execution.apply(config);
    }
}

/// `sweeper registry` flags.
#[derive(Args, Debug, Clone, Default)]
pub struct RegistryArgs {
    /// Only process this package (repeatable).
    #[arg(long = "package", value_name = "NAME")]
    pub packages: Vec<String>,

    /// Prefix marking pre-merge test tags.
    #[arg(long, value_name = "PREFIX")]
    pub testing_prefix: Option<String>,

    /// Allow a package to lose every version.
    #[arg(long)]
    pub no_keep_last: bool,

    /// The owner is an organization rather than a user.
    #[arg(long)]
    pub org: bool,

    #[command(flatten)]
    pub execution: ExecutionArgs,
}

impl RegistryArgs {
    fn apply(&self, config: &mut Config) {
        if !self.packages.is_empty() {
            config.registry.packages.clone_from(&self.packages);
        }
        if let Some(prefix) = &self.testing_prefix {
            config.registry.testing_prefix.clone_from(prefix);
        }
        if self.no_keep_last {
            config.registry.keep_last_version = false;
        }
        if self.org {
            config.github.owner_kind = OwnerKind::Org;
        }
        self.execution.apply(config);
    }
}
