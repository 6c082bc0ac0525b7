//! GitHub Actions cache store.

use crate::client::{GitHubClient, PER_PAGE, PageQuery};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sweeper_core::Result;
use sweeper_core::cache::CacheEntry;
use sweeper_core::config::Repository;
use sweeper_core::gateway::CacheStore;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct CacheListPage {
    #[serde(default)]
    total_count: u64,
    #[serde(default)]
    actions_caches: Vec<ActionsCache>,
}

#[derive(Debug, Deserialize)]
struct ActionsCache {
    id: u64,
    #[serde(rename = "ref", default)]
    git_ref: String,
    key: String,
    #[serde(default)]
    version: String,
    last_accessed_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    size_in_bytes: u64,
}

impl From<ActionsCache> for CacheEntry {
    fn from(cache: ActionsCache) -> Self {
        Self {
            id: cache.id,
            ref_name: cache.git_ref,
            key: cache.key,
            version: cache.version,
            created_at: cache.created_at,
            last_accessed_at: cache.last_accessed_at,
            size_bytes: cache.size_in_bytes,
        }
    }
}

/// Actions caches of one repository.
#[derive(Clone)]
pub struct ActionsCacheStore {
    client: GitHubClient,
    repository: Repository,
}

impl ActionsCacheStore {
    /// Create a store for `repository`.
    #[must_use]
    pub const fn new(client: GitHubClient, repository: Repository) -> Self {
        Self { client, repository }
    }

    fn list_route(&self) -> String {
        format!(
            "/repos/{}/{}/actions/caches",
            self.repository.owner, self.repository.name
        )
    }

    fn delete_route(&self, id: u64) -> String {
        format!("{}/{id}", self.list_route())
    }
}

#[async_trait]
impl CacheStore for ActionsCacheStore {
    async fn list_cache_entries(&self) -> Result<Vec<CacheEntry>> {
        let route = self.list_route();
        let mut entries = Vec::new();
        let mut page = 1;

        loop {
            let body: CacheListPage = self
                .client
                .get_json("list caches", &route, &PageQuery::new(page))
                .await?;
            let fetched = body.actions_caches.len();
            debug!(
                page,
                fetched,
                total = body.total_count,
                "Fetched cache page"
            );
            entries.extend(body.actions_caches.into_iter().map(CacheEntry::from));

            if fetched < PER_PAGE as usize {
                break;
            }
            page += 1;
        }

        Ok(entries)
    }

    async fn delete_cache_entry(&self, id: u64) -> Result<()> {
        self.client
            .delete("delete cache", &self.delete_route(id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"{
        "total_count": 2,
        "actions_caches": [
            {
                "id": 505,
                "ref": "refs/heads/main",
                "key": "Linux-node-958aff96db2d75d67787d1e634ae70b659de937b",
                "version": "73885106f58cc52a7df9ec4d4a5622a5614813162cb516c759a30af6bf56e6f0",
                "last_accessed_at": "2019-01-24T22:45:36.000Z",
                "created_at": "2019-01-24T22:45:36.000Z",
                "size_in_bytes": 1024
            },
            {
                "id": 506,
                "ref": "refs/pull/42/merge",
                "key": "Linux-node-85fb8d8b4ad4b2ad3a1b3b0f2ca1e1de05f1e1ac",
                "version": "b7a8f29fbcb6fe2a9b2e23d2a7fb8c6a2ad1b0e0c3b2b6a9e0d1f2a3b4c5d6e7",
                "last_accessed_at": "2019-01-25T10:00:00Z",
                "created_at": "2019-01-24T23:00:00Z",
                "size_in_bytes": 2048
            }
        ]
    }"#;

    #[test]
    fn test_parse_cache_page() {
        let page: CacheListPage = serde_json::from_str(PAGE).unwrap();
        assert_eq!(page.total_count, 2);

        let entries: Vec<CacheEntry> = page.actions_caches.into_iter().map(CacheEntry::from).collect();
        assert_eq!(entries[0].id, 505);
        assert_eq!(entries[0].ref_name, "refs/heads/main");
        assert_eq!(entries[1].key, "Linux-node-85fb8d8b4ad4b2ad3a1b3b0f2ca1e1de05f1e1ac");
        assert_eq!(entries[1].size_bytes, 2048);
        assert!(entries[1].last_accessed_at > entries[1].created_at);
    }

    #[test]
    fn test_parse_empty_page() {
        let page: CacheListPage = serde_json::from_str(r#"{"total_count": 0}"#).unwrap();
        assert!(page.actions_caches.is_empty());
    }

    #[tokio::test]
    async fn test_routes() {
        let client = GitHubClient::new(&sweeper_core::config::Credentials::new("t"), None).unwrap();
        let store = ActionsCacheStore::new(client, "acme/widgets".parse().unwrap());
        assert_eq!(store.list_route(), "/repos/acme/widgets/actions/caches");
        assert_eq!(store.delete_route(7), "/repos/acme/widgets/actions/caches/7");
    }
}
