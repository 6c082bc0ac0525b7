//! Error taxonomy shared by the engines, runners and gateways.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for sweeper operations.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Missing or invalid configuration. Fatal: raised before any remote call.
    #[error("Configuration error: {message}")]
    #[diagnostic(code(sweeper::config))]
    Configuration {
        /// What is wrong.
        message: String,
        /// How to fix it.
        #[help]
        help: Option<String>,
    },

    /// The remote resource does not exist (already deleted, unknown ref, ...).
    #[error("Not found: {resource}")]
    #[diagnostic(code(sweeper::not_found))]
    NotFound {
        /// Description of the missing resource.
        resource: String,
    },

    /// Network failure, rate limit or 5xx from the remote store. Retryable once.
    #[error("Transient remote failure during {operation}: {message}")]
    #[diagnostic(code(sweeper::remote::transient))]
    TransientRemote {
        /// Gateway operation that failed.
        operation: String,
        /// Underlying error text.
        message: String,
    },

    /// Remote failure that retrying will not fix (401, 403, 422, ...).
    #[error("Remote failure during {operation}: {message}")]
    #[diagnostic(code(sweeper::remote))]
    Remote {
        /// Gateway operation that failed.
        operation: String,
        /// Underlying error text.
        message: String,
    },

    /// The ref oracle could not decide whether a ref exists.
    #[error("Could not determine whether ref '{ref_name}' exists: {message}")]
    #[diagnostic(code(sweeper::oracle::ambiguous))]
    OracleAmbiguous {
        /// Ref that was queried.
        ref_name: String,
        /// Underlying error text.
        message: String,
    },

    /// Local I/O failure (reading a config file, writing a summary).
    #[error("I/O error on {}: {source}", path.display())]
    #[diagnostic(code(sweeper::io))]
    Io {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
        /// Path being accessed.
        path: PathBuf,
    },

    /// The configuration file is not valid TOML for the expected schema.
    #[error("Invalid configuration file {}: {source}", path.display())]
    #[diagnostic(
        code(sweeper::config::parse),
        help("Check the file against the documented [github], [cache], [registry] and [execution] sections")
    )]
    TomlParse {
        /// The parse error.
        #[source]
        source: toml::de::Error,
        /// File that failed to parse.
        path: PathBuf,
    },
}

impl Error {
    /// Create a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            help: None,
        }
    }

    /// Create a configuration error with help text.
    #[must_use]
    pub fn configuration_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create a not-found error.
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create a transient remote error.
    #[must_use]
    pub fn transient(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransientRemote {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a non-retryable remote error.
    #[must_use]
    pub fn remote(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create an ambiguous-oracle error.
    #[must_use]
    pub fn oracle_ambiguous(ref_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::OracleAmbiguous {
            ref_name: ref_name.into(),
            message: message.into(),
        }
    }

    /// Create an I/O error bound to a path.
    #[must_use]
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io {
            source,
            path: path.into(),
        }
    }

    /// Whether a single retry may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::TransientRemote { .. })
    }

    /// Whether the resource is already gone.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether the error must abort the run.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration { .. } | Self::TomlParse { .. })
    }
}

/// Result type alias for sweeper operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(Error::transient("delete", "502").is_transient());
        assert!(!Error::remote("delete", "403").is_transient());
        assert!(Error::not_found("cache 7").is_not_found());
        assert!(Error::configuration("no token").is_fatal());
        assert!(!Error::oracle_ambiguous("main", "timeout").is_fatal());
    }

    #[test]
    fn test_display_includes_context() {
        let err = Error::transient("list caches", "connection reset");
        assert_eq!(
            err.to_string(),
            "Transient remote failure during list caches: connection reset"
        );

        let err = Error::oracle_ambiguous("feature", "rate limited");
        assert!(err.to_string().contains("'feature'"));
    }

    #[test]
    fn test_configuration_with_help() {
        let err = Error::configuration_with_help("GITHUB_TOKEN is not set", "export GITHUB_TOKEN");
        if let Error::Configuration { message, help } = err {
            assert_eq!(message, "GITHUB_TOKEN is not set");
            assert_eq!(help.as_deref(), Some("export GITHUB_TOKEN"));
        } else {
            panic!("expected configuration error");
        }
    }
}
