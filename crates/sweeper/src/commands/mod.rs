//! Command implementations.

pub mod cache;
pub mod registry;
pub mod show_config;
pub mod version;

use crate::cli::{Cli, CliError, Commands, OkEnvelope};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use sweeper_core::config::Config;
use sweeper_core::report::{RunOutcome, Summarize, render_markdown, render_text};

/// Resolve the configuration: defaults, file, environment, then flags.
///
/// # Errors
///
/// Returns a configuration error when the file cannot be read or parsed.
pub fn resolve_config(cli: &Cli) -> Result<Config, CliError> {
    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_env();
    if let Some(repo) = &cli.repo {
        config.github.repository = Some(repo.clone());
    }
    cli.command.apply(&mut config);
    Ok(config)
}

/// Where and how results are written.
#[derive(Debug, Clone, Default)]
pub struct Output {
    /// Emit JSON envelopes instead of text.
    pub json: bool,
    /// Markdown summary destination.
    pub summary_file: Option<PathBuf>,
}

impl Output {
    /// Build from the global flags.
    #[must_use]
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            json: cli.json,
            summary_file: cli.summary_file.clone(),
        }
    }

    /// Print a run report and append the markdown summary.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Partial`] when the report contains failures.
    #[allow(clippy::print_stdout)]
    pub fn report<R>(&self, report: &R, outcome: RunOutcome) -> Result<(), CliError>
    where
        R: Summarize + Serialize,
    {
        if self.json {
            let envelope = match outcome {
                RunOutcome::Clean => OkEnvelope::new(report),
                RunOutcome::Partial => OkEnvelope::partial(report),
            };
            let json = serde_json::to_string(&envelope)
                .map_err(|e| CliError::remote(format!("Failed to serialize report: {e}")))?;
            println!("{json}");
        } else {
            print!("{}", render_text(report));
        }

        if let Some(path) = &self.summary_file {
            append_summary(path, &render_markdown(report));
        }

        match outcome {
            RunOutcome::Clean => Ok(()),
            RunOutcome::Partial => Err(CliError::partial(report.summary().failed)),
        }
    }
}

/// Append to the step summary. Failing to do so only warns.
fn append_summary(path: &Path, markdown: &str) {
    let result = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut file| writeln!(file, "{markdown}"));

    match result {
        Ok(()) => tracing::debug!(path = %path.display(), "Wrote step summary"),
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Could not write step summary"),
    }
}

/// Dispatch a parsed command line.
///
/// # Errors
///
/// Returns the command's error, already mapped to an exit-code category.
pub async fn execute(cli: Cli) -> Result<(), CliError> {
    let output = Output::from_cli(&cli);

    if matches!(cli.command, Commands::Version) {
        return version::execute(&output);
    }

    let config = resolve_config(&cli)?;
    match cli.command {
        Commands::Cache(_) => cache::execute(&config, &output).await,
        Commands::Registry(_) => registry::execute(&config, &output).await,
        Commands::ShowConfig => show_config::execute(&config, &output),
        Commands::Version => version::execute(&output),
    }
}
