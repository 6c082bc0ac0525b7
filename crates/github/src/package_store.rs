//! GitHub Packages container store.

use crate::client::{GitHubClient, PER_PAGE, PageQuery, encode_path_segment};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sweeper_core::Result;
use sweeper_core::config::OwnerKind;
use sweeper_core::gateway::PackageStore;
use sweeper_core::registry::{ImageVersion, Package};
use tracing::debug;

#[derive(Debug, Deserialize)]
struct PackageDto {
    name: String,
    package_type: String,
}

#[derive(Debug, Deserialize)]
struct VersionDto {
    id: u64,
    name: String,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    metadata: Option<VersionMetadata>,
}

#[derive(Debug, Deserialize)]
struct VersionMetadata {
    #[serde(default)]
    container: Option<ContainerMetadata>,
}

#[derive(Debug, Deserialize)]
struct ContainerMetadata {
    #[serde(default)]
    tags: Vec<String>,
}

impl From<VersionDto> for ImageVersion {
    fn from(version: VersionDto) -> Self {
        let tags = version
            .metadata
            .and_then(|m| m.container)
            .map(|c| c.tags)
            .unwrap_or_default();
        Self {
            id: version.id,
            digest: version.name,
            tags,
            created_at: version.created_at,
        }
    }
}

/// Container packages owned by a user or organization.
#[derive(Clone)]
pub struct ContainerPackageStore {
    client: GitHubClient,
    owner: String,
    owner_kind: OwnerKind,
    package_type: String,
}

impl ContainerPackageStore {
    /// Create a store for the packages of `owner`.
    #[must_use]
    pub fn new(client: GitHubClient, owner: impl Into<String>, owner_kind: OwnerKind) -> Self {
        Self {
            client,
            owner: owner.into(),
            owner_kind,
            package_type: "container".to_string(),
        }
    }

    /// List packages of another type (defaults to `container`).
    #[must_use]
    pub fn with_package_type(mut self, package_type: impl Into<String>) -> Self {
        self.package_type = package_type.into();
        self
    }

    fn owner_route(&self) -> String {
        let scope = match self.owner_kind {
            OwnerKind::User => "users",
            OwnerKind::Org => "orgs",
        };
        format!("/{scope}/{}/packages", self.owner)
    }

    fn versions_route(&self, package: &Package) -> String {
        format!(
            "{}/{}/{}/versions",
            self.owner_route(),
            package.package_type,
            encode_path_segment(&package.name)
        )
    }

    fn version_route(&self, package: &Package, id: u64) -> String {
        format!("{}/{id}", self.versions_route(package))
    }
}

#[async_trait]
impl PackageStore for ContainerPackageStore {
    async fn list_packages(&self) -> Result<Vec<Package>> {
        let route = self.owner_route();
        let mut packages = Vec::new();
        let mut page = 1;

        loop {
            let query = PageQuery::new(page).with_package_type(&self.package_type);
            let body: Vec<PackageDto> = self.client.get_json("list packages", &route, &query).await?;
            let fetched = body.len();
            packages.extend(body.into_iter().map(|p| Package {
                name: p.name,
                package_type: p.package_type,
            }));

            if fetched < PER_PAGE as usize {
                break;
            }
            page += 1;
        }

        debug!(owner = %self.owner, count = packages.len(), "Listed packages");
        Ok(packages)
    }

    async fn list_versions(&self, package: &Package) -> Result<Vec<ImageVersion>> {
        let route = self.versions_route(package);
        let mut versions = Vec::new();
        let mut page = 1;

        loop {
            let body: Vec<VersionDto> = self
                .client
                .get_json("list package versions", &route, &PageQuery::new(page))
                .await?;
            let fetched = body.len();
            versions.extend(body.into_iter().map(ImageVersion::from));

            if fetched < PER_PAGE as usize {
                break;
            }
            page += 1;
        }

        debug!(package = %package.name, count = versions.len(), "Listed versions");
        Ok(versions)
    }

    async fn delete_version(&self, package: &Package, id: u64) -> Result<()> {
        self.client
            .delete("delete package version", &self.version_route(package, id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sweeper_core::config::Credentials;

    const VERSIONS: &str = r#"[
        {
            "id": 45763,
            "name": "sha256:08a44bab0bddaddd8837a8b381aebc2e4b933768b981685a9e088360af0d3dd9",
            "url": "https://api.github.com/users/octocat/packages/container/hello_docker/versions/45763",
            "created_at": "2020-09-11T21:56:40Z",
            "updated_at": "2021-02-05T21:32:32Z",
            "metadata": {
                "package_type": "container",
                "container": { "tags": ["latest", "main-abc123"] }
            }
        },
        {
            "id": 881,
            "name": "sha256:b3d3e366b55f9a54599220198b3db5da8f53592acbbb7dc7e4e9878762fc5344",
            "created_at": "2020-05-21T22:22:20Z",
            "metadata": {
                "package_type": "container",
                "container": { "tags": [] }
            }
        },
        {
            "id": 12,
            "name": "sha256:0000000000000000000000000000000000000000000000000000000000000000"
        }
    ]"#;

    fn store(kind: OwnerKind) -> ContainerPackageStore {
        let client = GitHubClient::new(&Credentials::new("t"), None).unwrap();
        ContainerPackageStore::new(client, "acme", kind)
    }

    #[test]
    fn test_parse_versions() {
        let dtos: Vec<VersionDto> = serde_json::from_str(VERSIONS).unwrap();
        let versions: Vec<ImageVersion> = dtos.into_iter().map(ImageVersion::from).collect();

        assert_eq!(versions[0].id, 45763);
        assert_eq!(versions[0].tags, vec!["latest", "main-abc123"]);
        assert!(versions[0].created_at.is_some());
        assert!(versions[1].is_untagged());
        assert!(versions[2].is_untagged());
        assert!(versions[2].created_at.is_none());
    }

    #[test]
    fn test_parse_packages() {
        let dtos: Vec<PackageDto> = serde_json::from_str(
            r#"[{"id": 1, "name": "widgets/builder", "package_type": "container", "visibility": "private"}]"#,
        )
        .unwrap();
        assert_eq!(dtos[0].name, "widgets/builder");
        assert_eq!(dtos[0].package_type, "container");
    }

    #[tokio::test]
    async fn test_user_routes() {
        let store = store(OwnerKind::User);
        let package = Package::container("widgets/builder");
        assert_eq!(store.owner_route(), "/users/acme/packages");
        assert_eq!(
            store.versions_route(&package),
            "/users/acme/packages/container/widgets%2Fbuilder/versions"
        );
        assert_eq!(
            store.version_route(&package, 9),
            "/users/acme/packages/container/widgets%2Fbuilder/versions/9"
        );
    }

    #[tokio::test]
    async fn test_org_routes() {
        let store = store(OwnerKind::Org);
        assert_eq!(store.owner_route(), "/orgs/acme/packages");
        assert_eq!(
            store.versions_route(&Package::container("widgets")),
            "/orgs/acme/packages/container/widgets/versions"
        );
    }
}
