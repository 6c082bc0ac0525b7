//! Branch and pull-request existence checks.

use crate::client::{GitHubClient, encode_path_segment};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use sweeper_core::config::Repository;
use sweeper_core::gateway::RefOracle;
use sweeper_core::{Error, Result};
use tracing::debug;

/// Answers whether a branch or pull request of one repository still exists.
///
/// Definitive answers are memoised for the lifetime of the oracle.
pub struct GitHubRefOracle {
    client: GitHubClient,
    repository: Repository,
    known: Mutex<HashMap<String, bool>>,
}

impl GitHubRefOracle {
    /// Create an oracle for `repository`.
    #[must_use]
    pub fn new(client: GitHubClient, repository: Repository) -> Self {
        Self {
            client,
            repository,
            known: Mutex::new(HashMap::new()),
        }
    }

    fn remembered(&self, name: &str) -> Option<bool> {
        self.known
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .copied()
    }

    fn remember(&self, name: &str, exists: bool) {
        self.known
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), exists);
    }

    fn branch_route(&self, name: &str) -> String {
        let branch: Vec<String> = name.split('/').map(encode_path_segment).collect();
        format!(
            "/repos/{}/{}/branches/{}",
            self.repository.owner,
            self.repository.name,
            branch.join("/")
        )
    }

    fn pull_request_route(&self, number: u64) -> String {
        format!(
            "/repos/{}/{}/pulls/{number}",
            self.repository.owner, self.repository.name
        )
    }

    async fn branch_exists(&self, name: &str) -> Result<bool> {
        self.client
            .exists("branch lookup", &self.branch_route(name))
            .await
    }

    async fn pull_request_exists(&self, number: u64) -> Result<bool> {
        self.client
            .exists("pull request lookup", &self.pull_request_route(number))
            .await
    }

    /// Branch first, then pull request when the name is a number.
    async fn resolve(&self, name: &str) -> Result<bool> {
        let branch_error = match self.branch_exists(name).await {
            Ok(true) => return Ok(true),
            Ok(false) => None,
            Err(e) => Some(e),
        };

        if let Ok(number) = name.parse::<u64>() {
            match self.pull_request_exists(number).await {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(e) => return Err(Error::oracle_ambiguous(name, e.to_string())),
            }
        }

        match branch_error {
            Some(e) => Err(Error::oracle_ambiguous(name, e.to_string())),
            None => Ok(false),
        }
    }
}

#[async_trait]
impl RefOracle for GitHubRefOracle {
    async fn ref_exists(&self, name: &str) -> Result<bool> {
        if let Some(exists) = self.remembered(name) {
            return Ok(exists);
        }

        let exists = self.resolve(name).await?;
        debug!(ref_name = name, exists, "Resolved ref");
        self.remember(name, exists);
        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sweeper_core::config::Credentials;

    #[tokio::test]
    async fn test_memoised_answers_skip_the_network() {
        let client = GitHubClient::new(&Credentials::new("t"), Some("http://127.0.0.1:9")).unwrap();
        let oracle = GitHubRefOracle::new(client, "acme/widgets".parse().unwrap());
        oracle.remember("main", true);
        oracle.remember("1234", false);

        assert!(oracle.ref_exists("main").await.unwrap());
        assert!(!oracle.ref_exists("1234").await.unwrap());
    }

    #[tokio::test]
    async fn test_routes() {
        let client = GitHubClient::new(&Credentials::new("t"), None).unwrap();
        let oracle = GitHubRefOracle::new(client, "acme/widgets".parse().unwrap());
        assert_eq!(oracle.branch_route("main"), "/repos/acme/widgets/branches/main");
        assert_eq!(
            oracle.branch_route("release/v1 rc"),
            "/repos/acme/widgets/branches/release/v1%20rc"
        );
        assert_eq!(oracle.pull_request_route(42), "/repos/acme/widgets/pulls/42");
    }
}
