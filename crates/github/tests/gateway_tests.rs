//! Tests for the GitHub gateways that need no GitHub account.

use sweeper_core::config::{Credentials, OwnerKind};
use sweeper_core::gateway::{CacheStore, PackageStore, RefOracle};
use sweeper_core::registry::Package;
use sweeper_github::{
    ActionsCacheStore, ContainerPackageStore, GitHubClient, GitHubRefOracle, encode_path_segment,
    map_status,
};

/// Nothing listens on the discard port, so every call fails at the transport.
const UNREACHABLE: &str = "http://127.0.0.1:9";

fn unreachable_client() -> GitHubClient {
    GitHubClient::new(&Credentials::new("ghp_test"), Some(UNREACHABLE)).unwrap()
}

mod status_mapping {
    use super::*;

    /// Deleting something that is already gone must not be an error
    /// the runners treat as a failure.
    #[test]
    fn test_not_found_is_distinguishable() {
        let err = map_status("delete cache", "cache 1", 404, "Not Found");
        assert!(err.is_not_found());
        assert!(!err.is_transient());
    }

    #[test]
    fn test_retryable_statuses() {
        for status in [408, 429, 500, 502, 503, 504] {
            assert!(
                map_status("list caches", "caches", status, "").is_transient(),
                "{status}"
            );
        }
    }

    #[test]
    fn test_permanent_statuses() {
        for status in [400, 401, 403, 409, 422] {
            let err = map_status("list caches", "caches", status, "");
            assert!(!err.is_transient(), "{status}");
            assert!(!err.is_not_found(), "{status}");
        }
    }

    #[test]
    fn test_package_names_are_encoded() {
        assert_eq!(encode_path_segment("org/image"), "org%2Fimage");
    }
}

mod transport_failures {
    use super::*;

    #[tokio::test]
    async fn test_cache_listing_failure_is_transient() {
        let store = ActionsCacheStore::new(unreachable_client(), "acme/widgets".parse().unwrap());
        let err = store.list_cache_entries().await.unwrap_err();
        assert!(err.is_transient(), "{err}");
    }

    #[tokio::test]
    async fn test_version_delete_failure_is_transient() {
        let store = ContainerPackageStore::new(unreachable_client(), "acme", OwnerKind::Org);
        let err = store
            .delete_version(&Package::container("widgets"), 1)
            .await
            .unwrap_err();
        assert!(err.is_transient(), "{err}");
    }

    /// An unreachable API is neither "exists" nor "gone".
    #[tokio::test]
    async fn test_oracle_reports_ambiguity() {
        let oracle = GitHubRefOracle::new(unreachable_client(), "acme/widgets".parse().unwrap());
        let err = oracle.ref_exists("1234").await.unwrap_err();
        assert!(matches!(err, sweeper_core::Error::OracleAmbiguous { .. }));
    }
}
