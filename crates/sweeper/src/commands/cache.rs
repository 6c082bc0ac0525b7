//! `sweeper cache`

use super::Output;
use crate::cli::CliError;
use chrono::Utc;
use sweeper_core::config::{Config, Credentials};
use sweeper_core::prune::CachePruner;
use sweeper_github::{ActionsCacheStore, GitHubClient};

/// Prune the repository's Actions caches.
///
/// # Errors
///
/// Configuration errors before any API call, a remote error when the caches
/// cannot be listed, or a partial error when some deletions failed.
pub async fn execute(config: &Config, output: &Output) -> Result<(), CliError> {
    config.validate()?;
    let repository = config.repository()?;
    let credentials = Credentials::from_env()?;
    let client = GitHubClient::new(&credentials, config.github.api_url.as_deref())?;

    tracing::info!(
        repository = %repository,
        idle_days = config.cache.idle_days,
        max_age_days = config.cache.max_age_days,
        "Cleaning Actions caches"
    );

    let pruner = CachePruner::new(
        ActionsCacheStore::new(client, repository.clone()),
        config.cache.policy(),
        config.execution.options(),
        repository.to_string(),
    );
    let report = pruner.run(Utc::now()).await?;

    output.report(&report, report.outcome())
}
