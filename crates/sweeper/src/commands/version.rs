//! `sweeper version`

use super::Output;
use crate::cli::{CliError, OkEnvelope};
use serde::Serialize;

/// Version information.
#[derive(Debug, Serialize)]
pub struct VersionInfo {
    /// Binary name.
    pub name: &'static str,
    /// Crate version.
    pub version: &'static str,
}

impl VersionInfo {
    /// Information about the running binary.
    #[must_use]
    pub const fn current() -> Self {
        Self {
            name: "sweeper",
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

impl std::fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

/// Print the version.
///
/// # Errors
///
/// Never fails in practice; serialization errors are reported as remote errors.
#[allow(clippy::print_stdout)]
pub fn execute(output: &Output) -> Result<(), CliError> {
    let info = VersionInfo::current();
    if output.json {
        let json = serde_json::to_string(&OkEnvelope::new(&info))
            .map_err(|e| CliError::remote(format!("Failed to serialize version: {e}")))?;
        println!("{json}");
    } else {
        println!("{info}");
    }
    Ok(())
}
