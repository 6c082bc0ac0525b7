//! Layered configuration.
//!
//! Precedence, lowest first: built-in defaults, the TOML file, environment
//! variables, command-line flags (applied by the binary). The API token is
//! only ever read from the environment and never serialised.

use crate::cache::{CachePolicy, DEFAULT_IDLE_DAYS, DEFAULT_MAX_AGE_DAYS};
use crate::prune::ExecutionOptions;
use crate::registry::{DEFAULT_TESTING_PREFIX, RegistryPolicy};
use crate::{Error, Result};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// File read when `--config` is not given and the file exists.
pub const DEFAULT_CONFIG_FILE: &str = "sweeper.toml";

/// Environment variables holding the API token, in lookup order.
pub const TOKEN_ENV_VARS: [&str; 2] = ["GITHUB_TOKEN", "GH_TOKEN"];

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Where the stores live.
    pub github: GitHubSettings,
    /// Cache retention thresholds.
    pub cache: CacheSettings,
    /// Registry retention knobs.
    pub registry: RegistrySettings,
    /// How verdicts are executed.
    pub execution: ExecutionSettings,
}

/// Repository and API location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GitHubSettings {
    /// `owner/repo`.
    pub repository: Option<String>,
    /// API base URL for GitHub Enterprise.
    pub api_url: Option<String>,
    /// Whether the owner is a user or an organization (package endpoints differ).
    pub owner_kind: OwnerKind,
}

/// Kind of account owning the container packages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerKind {
    /// Personal account (`/users/{owner}/packages`).
    #[default]
    User,
    /// Organization (`/orgs/{owner}/packages`).
    Org,
}

impl fmt::Display for OwnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::Org => f.write_str("org"),
        }
    }
}

/// Cache retention thresholds in whole days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSettings {
    /// Delete entries not accessed for this many days.
    pub idle_days: u32,
    /// Delete entries created this many days ago.
    pub max_age_days: u32,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            idle_days: DEFAULT_IDLE_DAYS,
            max_age_days: DEFAULT_MAX_AGE_DAYS,
        }
    }
}

impl CacheSettings {
    /// Policy for the cache engine.
    #[must_use]
    pub fn policy(&self) -> CachePolicy {
        CachePolicy::from_days(self.idle_days, self.max_age_days)
    }
}

/// Registry retention knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistrySettings {
    /// Prefix marking transient pre-merge tags.
    pub testing_prefix: String,
    /// Keep the newest version when every version would be deleted.
    pub keep_last_version: bool,
    /// Registry package type to list.
    pub package_type: String,
    /// Restrict the run to these package names. Empty means every package.
    pub packages: Vec<String>,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            testing_prefix: DEFAULT_TESTING_PREFIX.to_string(),
            keep_last_version: true,
            package_type: "container".to_string(),
            packages: Vec::new(),
        }
    }
}

impl RegistrySettings {
    /// Policy for the registry engine.
    #[must_use]
    pub fn policy(&self) -> RegistryPolicy {
        RegistryPolicy {
            testing_prefix: self.testing_prefix.clone(),
            keep_last_version: self.keep_last_version,
        }
    }
}

/// Execution knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutionSettings {
    /// Compute verdicts but delete nothing.
    pub dry_run: bool,
    /// Maximum in-flight remote calls.
    pub concurrency: usize,
    /// Pause before the single retry of a transient failure.
    pub retry_delay_ms: u64,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            dry_run: false,
            concurrency: 4,
            retry_delay_ms: 500,
        }
    }
}

impl ExecutionSettings {
    /// Options for the runners.
    #[must_use]
    pub fn options(&self) -> ExecutionOptions {
        ExecutionOptions {
            dry_run: self.dry_run,
            concurrency: self.concurrency,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

impl Config {
    /// Parse a TOML document. `origin` is only used in error messages.
    ///
    /// # Errors
    ///
    /// Returns `Error::TomlParse` for malformed TOML or unknown keys.
    pub fn parse(contents: &str, origin: &Path) -> Result<Self> {
        toml::from_str(contents).map_err(|source| Error::TomlParse {
            source,
            path: origin.to_path_buf(),
        })
    }

    /// Load the configuration file.
    ///
    /// An explicit path must exist. Without one, [`DEFAULT_CONFIG_FILE`] is
    /// read from the working directory if present, otherwise defaults apply.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    tracing::debug!("No {DEFAULT_CONFIG_FILE} found, using defaults");
                    return Ok(Self::default());
                }
                default
            }
        };

        tracing::debug!(path = %path.display(), "Loading configuration file");
        let contents = std::fs::read_to_string(path).map_err(|e| Error::io(e, path))?;
        Self::parse(&contents, path)
    }

    /// Overlay values from the environment (`GITHUB_REPOSITORY`, `GITHUB_API_URL`).
    pub fn apply_env(&mut self) {
        if let Some(repository) = non_empty_env("GITHUB_REPOSITORY") {
            self.github.repository = Some(repository);
        }
        if let Some(api_url) = non_empty_env("GITHUB_API_URL") {
            self.github.api_url = Some(api_url);
        }
    }

    /// The configured repository.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when unset or not `owner/repo`.
    pub fn repository(&self) -> Result<Repository> {
        let raw = self.github.repository.as_deref().ok_or_else(|| {
            Error::configuration_with_help(
                "No repository configured",
                "Set GITHUB_REPOSITORY=owner/repo, pass --repo, or add [github] repository to sweeper.toml",
            )
        })?;
        raw.parse()
    }

    /// Check every setting the runners rely on.
    ///
    /// # Errors
    ///
    /// Returns the first configuration error found.
    pub fn validate(&self) -> Result<()> {
        self.repository()?;

        if self.cache.idle_days == 0 || self.cache.max_age_days == 0 {
            return Err(Error::configuration(
                "cache thresholds must be at least one day",
            ));
        }
        if self.registry.testing_prefix.is_empty() {
            return Err(Error::configuration(
                "registry.testing_prefix must not be empty",
            ));
        }
        if self.registry.package_type.is_empty() {
            return Err(Error::configuration(
                "registry.package_type must not be empty",
            ));
        }
        if self.execution.concurrency == 0 {
            return Err(Error::configuration(
                "execution.concurrency must be at least 1",
            ));
        }
        Ok(())
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// `owner/repo` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Repository {
    /// Account owning the repository (and its packages).
    pub owner: String,
    /// Repository name.
    pub name: String,
}

impl FromStr for Repository {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.trim().split('/').collect();
        match parts.as_slice() {
            [owner, name] if !owner.is_empty() && !name.is_empty() => Ok(Self {
                owner: (*owner).to_string(),
                name: (*name).to_string(),
            }),
            _ => Err(Error::configuration_with_help(
                format!("Invalid repository '{s}'"),
                "Expected the form owner/repo",
            )),
        }
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// API credentials.
#[derive(Clone)]
pub struct Credentials {
    token: SecretString,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl Credentials {
    /// Wrap an explicit token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::from(token.into()),
        }
    }

    /// Read the token from `GITHUB_TOKEN`, falling back to `GH_TOKEN`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when neither variable is set.
    pub fn from_env() -> Result<Self> {
        TOKEN_ENV_VARS
            .iter()
            .find_map(|name| non_empty_env(name))
            .map(Self::new)
            .ok_or_else(|| {
                Error::configuration_with_help(
                    "GITHUB_TOKEN is not set or empty",
                    "Export GITHUB_TOKEN (or GH_TOKEN) with actions:write and packages:delete scopes",
                )
            })
    }

    /// Whether a token can be found in the environment.
    #[must_use]
    pub fn present_in_env() -> bool {
        TOKEN_ENV_VARS.iter().any(|name| non_empty_env(name).is_some())
    }

    /// The secret token.
    #[must_use]
    pub const fn token(&self) -> &SecretString {
        &self.token
    }
}
