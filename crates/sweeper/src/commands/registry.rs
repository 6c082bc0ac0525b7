//! `sweeper registry`

use super::Output;
use crate::cli::CliError;
use sweeper_core::config::{Config, Credentials};
use sweeper_core::prune::RegistryPruner;
use sweeper_github::{ContainerPackageStore, GitHubClient, GitHubRefOracle};

/// Prune container image versions of every package owned by the repository owner.
///
/// # Errors
///
/// Configuration errors before any API call, a remote error when the packages
/// cannot be listed, or a partial error when some packages or deletions failed.
pub async fn execute(config: &Config, output: &Output) -> Result<(), CliError> {
    config.validate()?;
    let repository = config.repository()?;
    let credentials = Credentials::from_env()?;
    let client = GitHubClient::new(&credentials, config.github.api_url.as_deref())?;

    tracing::info!(
        owner = %repository.owner,
        owner_kind = %config.github.owner_kind,
        testing_prefix = %config.registry.testing_prefix,
        keep_last_version = config.registry.keep_last_version,
        "Cleaning container images"
    );

    let store = ContainerPackageStore::new(
        client.clone(),
        repository.owner.clone(),
        config.github.owner_kind,
    )
    .with_package_type(config.registry.package_type.clone());
    let oracle = GitHubRefOracle::new(client, repository.clone());

    let pruner = RegistryPruner::new(
        store,
        oracle,
        config.registry.policy(),
        config.execution.options(),
        repository.owner.clone(),
    )
    .with_packages(config.registry.packages.clone());
    let report = pruner.run().await?;

    output.report(&report, report.outcome())
}
