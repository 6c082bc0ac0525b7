//! GitHub-backed gateways for sweeper.
//!
//! - [`ActionsCacheStore`] lists and deletes GitHub Actions caches
//! - [`ContainerPackageStore`] lists and deletes GHCR package versions
//! - [`GitHubRefOracle`] checks whether a branch or pull request exists

mod cache_store;
mod client;
mod oracle;
mod package_store;

pub use cache_store::ActionsCacheStore;
pub use client::{GitHubClient, PER_PAGE, encode_path_segment, map_error, map_status};
pub use oracle::GitHubRefOracle;
pub use package_store::ContainerPackageStore;
