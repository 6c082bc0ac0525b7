//! Interfaces to the remote stores and the ref-existence oracle.
//!
//! The engines never talk to the network. Runners fetch a snapshot through
//! these traits, evaluate it, then execute deletions through them.

use crate::Result;
use crate::cache::CacheEntry;
use crate::registry::{ImageVersion, Package};
use async_trait::async_trait;
use std::sync::Arc;

/// Remote build-cache store.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// List every cache entry of the repository.
    async fn list_cache_entries(&self) -> Result<Vec<CacheEntry>>;

    /// Delete one entry. An already-deleted id yields [`crate::Error::NotFound`].
    async fn delete_cache_entry(&self, id: u64) -> Result<()>;
}

/// Remote container registry.
#[async_trait]
pub trait PackageStore: Send + Sync {
    /// List the packages owned by the configured owner.
    async fn list_packages(&self) -> Result<Vec<Package>>;

    /// List every version of a package.
    async fn list_versions(&self, package: &Package) -> Result<Vec<ImageVersion>>;

    /// Delete one version (and with it all its tags).
    async fn delete_version(&self, package: &Package, id: u64) -> Result<()>;
}

/// Answers whether a branch or pull request still exists.
#[async_trait]
pub trait RefOracle: Send + Sync {
    /// `Ok(false)` when the ref is positively gone, `Err` when the answer is
    /// unknown (network failure, rate limit, ...).
    async fn ref_exists(&self, name: &str) -> Result<bool>;
}

#[async_trait]
impl<T: CacheStore + ?Sized> CacheStore for Arc<T> {
    async fn list_cache_entries(&self) -> Result<Vec<CacheEntry>> {
        (**self).list_cache_entries().await
    }

    async fn delete_cache_entry(&self, id: u64) -> Result<()> {
        (**self).delete_cache_entry(id).await
    }
}

#[async_trait]
impl<T: PackageStore + ?Sized> PackageStore for Arc<T> {
    async fn list_packages(&self) -> Result<Vec<Package>> {
        (**self).list_packages().await
    }

    async fn list_versions(&self, package: &Package) -> Result<Vec<ImageVersion>> {
        (**self).list_versions(package).await
    }

    async fn delete_version(&self, package: &Package, id: u64) -> Result<()> {
        (**self).delete_version(package, id).await
    }
}

#[async_trait]
impl<T: RefOracle + ?Sized> RefOracle for Arc<T> {
    async fn ref_exists(&self, name: &str) -> Result<bool> {
        (**self).ref_exists(name).await
    }
}
