//! `sweeper show-config`

use super::Output;
use crate::cli::{CliError, OkEnvelope};
use serde::Serialize;
use sweeper_core::config::{Config, Credentials};

/// The resolved configuration plus whether a token is available.
#[derive(Debug, Serialize)]
pub struct ResolvedConfig<'a> {
    /// Effective configuration.
    #[serde(flatten)]
    pub config: &'a Config,
    /// `set` or `unset`; the token itself is never shown.
    pub token: &'static str,
}

impl<'a> ResolvedConfig<'a> {
    /// Describe `config` with the token status from the environment.
    #[must_use]
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            token: if Credentials::present_in_env() {
                "set"
            } else {
                "unset"
            },
        }
    }

    /// YAML rendering.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> Result<String, CliError> {
        serde_yaml::to_string(self)
            .map_err(|e| CliError::config(format!("Failed to render configuration: {e}")))
    }
}

/// Print the resolved configuration.
///
/// # Errors
///
/// Returns an error if the configuration cannot be serialized.
#[allow(clippy::print_stdout)]
pub fn execute(config: &Config, output: &Output) -> Result<(), CliError> {
    let resolved = ResolvedConfig::new(config);
    if output.json {
        let json = serde_json::to_string(&OkEnvelope::new(&resolved))
            .map_err(|e| CliError::config(format!("Failed to render configuration: {e}")))?;
        println!("{json}");
    } else {
        print!("{}", resolved.to_yaml()?);
    }
    Ok(())
}
