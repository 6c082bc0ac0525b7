//! Gateway behaviour against a local HTTP server speaking the GitHub REST API.

use serde_json::{Value, json};
use sweeper_core::Error;
use sweeper_core::config::{Credentials, OwnerKind};
use sweeper_core::gateway::{CacheStore, PackageStore, RefOracle};
use sweeper_core::registry::Package;
use sweeper_github::{ActionsCacheStore, ContainerPackageStore, GitHubClient, GitHubRefOracle, PER_PAGE};
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> GitHubClient {
    GitHubClient::new(&Credentials::new("ghp_test"), Some(&server.uri())).unwrap()
}

fn not_found() -> ResponseTemplate {
    ResponseTemplate::new(404).set_body_json(json!({
        "message": "Not Found",
        "documentation_url": "https://docs.github.com/rest"
    }))
}

fn forbidden() -> ResponseTemplate {
    ResponseTemplate::new(403).set_body_json(json!({
        "message": "Resource not accessible by integration",
        "documentation_url": "https://docs.github.com/rest"
    }))
}

fn ok(body: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

mod ref_oracle {
    use super::*;

    fn oracle(server: &MockServer) -> GitHubRefOracle {
        GitHubRefOracle::new(client(server), "acme/widgets".parse().unwrap())
    }

    async fn no_pull_request_lookups(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path_regex(r"^/repos/acme/widgets/pulls/"))
            .respond_with(not_found())
            .expect(0)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_existing_branch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/branches/main"))
            .respond_with(ok(json!({"name": "main"})))
            .expect(1)
            .mount(&server)
            .await;
        no_pull_request_lookups(&server).await;

        assert!(oracle(&server).ref_exists("main").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_branch_with_non_numeric_name_skips_pull_requests() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/branches/feature"))
            .respond_with(not_found())
            .expect(1)
            .mount(&server)
            .await;
        no_pull_request_lookups(&server).await;

        assert!(!oracle(&server).ref_exists("feature").await.unwrap());
    }

    #[tokio::test]
    async fn test_numeric_name_falls_back_to_open_pull_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/branches/1234"))
            .respond_with(not_found())
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/pulls/1234"))
            .respond_with(ok(json!({"number": 1234, "state": "open"})))
            .expect(1)
            .mount(&server)
            .await;

        assert!(oracle(&server).ref_exists("1234").await.unwrap());
    }

    #[tokio::test]
    async fn test_numeric_name_gone_everywhere() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/branches/1234"))
            .respond_with(not_found())
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/pulls/1234"))
            .respond_with(not_found())
            .expect(1)
            .mount(&server)
            .await;

        assert!(!oracle(&server).ref_exists("1234").await.unwrap());
    }

    #[tokio::test]
    async fn test_pull_request_failure_is_ambiguous() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/branches/77"))
            .respond_with(not_found())
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/pulls/77"))
            .respond_with(forbidden())
            .mount(&server)
            .await;

        let err = oracle(&server).ref_exists("77").await.unwrap_err();
        assert!(matches!(err, Error::OracleAmbiguous { .. }), "{err}");
    }

    #[tokio::test]
    async fn test_definitive_answers_are_memoised() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/branches/main"))
            .respond_with(ok(json!({"name": "main"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/branches/gone"))
            .respond_with(not_found())
            .expect(1)
            .mount(&server)
            .await;

        let oracle = oracle(&server);
        for _ in 0..3 {
            assert!(oracle.ref_exists("main").await.unwrap());
            assert!(!oracle.ref_exists("gone").await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_ambiguous_answers_are_asked_again() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/branches/feature"))
            .respond_with(forbidden())
            .expect(2)
            .mount(&server)
            .await;

        let oracle = oracle(&server);
        for _ in 0..2 {
            let err = oracle.ref_exists("feature").await.unwrap_err();
            assert!(matches!(err, Error::OracleAmbiguous { .. }), "{err}");
        }
    }
}

mod cache_store {
    use super::*;

    fn cache(id: u64) -> Value {
        json!({
            "id": id,
            "ref": "refs/heads/main",
            "key": format!("build-cache-{id}"),
            "version": format!("{id:064x}"),
            "last_accessed_at": "2026-03-01T10:00:00Z",
            "created_at": "2026-02-28T10:00:00Z",
            "size_in_bytes": 1024
        })
    }

    fn page(ids: std::ops::RangeInclusive<u64>) -> Value {
        json!({
            "total_count": 103,
            "actions_caches": ids.map(cache).collect::<Vec<_>>()
        })
    }

    #[tokio::test]
    async fn test_listing_follows_pages_until_a_short_one() {
        let server = MockServer::start().await;
        let route = "/repos/acme/widgets/actions/caches";
        Mock::given(method("GET"))
            .and(path(route))
            .and(query_param("per_page", PER_PAGE.to_string()))
            .and(query_param("page", "1"))
            .respond_with(ok(page(1..=100)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(route))
            .and(query_param("page", "2"))
            .respond_with(ok(page(101..=103)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(route))
            .and(query_param("page", "3"))
            .respond_with(ok(page(1..=0)))
            .expect(0)
            .mount(&server)
            .await;

        let store = ActionsCacheStore::new(client(&server), "acme/widgets".parse().unwrap());
        let entries = store.list_cache_entries().await.unwrap();

        assert_eq!(entries.len(), 103);
        assert_eq!(entries[0].id, 1);
        assert_eq!(entries[102].id, 103);
        assert_eq!(entries[102].key, "build-cache-103");
    }

    #[tokio::test]
    async fn test_deleting_a_vanished_cache_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/repos/acme/widgets/actions/caches/7"))
            .respond_with(not_found())
            .expect(1)
            .mount(&server)
            .await;

        let store = ActionsCacheStore::new(client(&server), "acme/widgets".parse().unwrap());
        let err = store.delete_cache_entry(7).await.unwrap_err();
        assert!(err.is_not_found(), "{err}");
    }

    #[tokio::test]
    async fn test_forbidden_delete_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/repos/acme/widgets/actions/caches/8"))
            .respond_with(forbidden())
            .expect(1)
            .mount(&server)
            .await;

        let store = ActionsCacheStore::new(client(&server), "acme/widgets".parse().unwrap());
        let err = store.delete_cache_entry(8).await.unwrap_err();
        assert!(!err.is_transient(), "{err}");
        assert!(err.to_string().contains("HTTP 403"), "{err}");
    }
}

mod package_store {
    use super::*;

    fn version(id: u64) -> Value {
        json!({
            "id": id,
            "name": format!("sha256:{id:064x}"),
            "created_at": "2026-03-01T10:00:00Z",
            "metadata": {
                "package_type": "container",
                "container": { "tags": [format!("main-{id}")] }
            }
        })
    }

    #[tokio::test]
    async fn test_packages_listed_with_type_filter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/orgs/acme/packages"))
            .and(query_param("package_type", "container"))
            .and(query_param("page", "1"))
            .respond_with(ok(json!([
                {"id": 1, "name": "widgets", "package_type": "container"},
                {"id": 2, "name": "builder", "package_type": "container"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let store = ContainerPackageStore::new(client(&server), "acme", OwnerKind::Org);
        let packages = store.list_packages().await.unwrap();
        let names: Vec<&str> = packages.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["widgets", "builder"]);
    }

    #[tokio::test]
    async fn test_full_page_then_empty_page() {
        let server = MockServer::start().await;
        let route = "/users/acme/packages/container/widgets/versions";
        Mock::given(method("GET"))
            .and(path(route))
            .and(query_param("page", "1"))
            .respond_with(ok(Value::Array((1..=100).map(version).collect())))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(route))
            .and(query_param("page", "2"))
            .respond_with(ok(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let store = ContainerPackageStore::new(client(&server), "acme", OwnerKind::User);
        let versions = store
            .list_versions(&Package::container("widgets"))
            .await
            .unwrap();

        assert_eq!(versions.len(), 100);
        assert_eq!(versions[99].tags, vec!["main-100"]);
    }

    #[tokio::test]
    async fn test_successful_delete() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/orgs/acme/packages/container/widgets/versions/9"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let store = ContainerPackageStore::new(client(&server), "acme", OwnerKind::Org);
        store
            .delete_version(&Package::container("widgets"), 9)
            .await
            .unwrap();
    }
}
