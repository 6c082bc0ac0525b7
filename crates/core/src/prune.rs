//! Runners that fetch a snapshot, evaluate it and execute the verdicts.
//!
//! A failing deletion never stops the run: it is recorded as
//! [`Outcome::Failed`] and counted in the report.

use crate::cache::{self, CacheDecision, CachePolicy};
use crate::format::format_bytes;
use crate::gateway::{CacheStore, PackageStore, RefOracle};
use crate::registry::{self, Package, RegistryPolicy, VersionDecision};
use crate::report::{CacheReport, PackageReport, RegistryReport};
use crate::verdict::{Decision, Outcome, Verdict};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

/// How verdicts are executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOptions {
    /// Compute verdicts but delete nothing.
    pub dry_run: bool,
    /// Maximum in-flight remote calls.
    pub concurrency: usize,
    /// Pause before retrying a transient failure.
    pub retry_delay: Duration,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            concurrency: 4,
            retry_delay: Duration::from_millis(500),
        }
    }
}

impl ExecutionOptions {
    /// Set dry-run mode.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set the concurrency limit. Zero is treated as one.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Set the retry delay.
    #[must_use]
    pub const fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    fn limit(&self) -> usize {
        self.concurrency.max(1)
    }
}

/// Run a deletion, retrying a transient failure once.
///
/// A missing entity counts as deleted.
pub async fn delete_with_retry<F, Fut>(subject: &str, retry_delay: Duration, mut op: F) -> Outcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let first = match op().await {
        Ok(()) => return Outcome::Deleted,
        Err(e) => e,
    };

    let err = if first.is_transient() {
        tracing::debug!(subject, error = %first, "Transient failure, retrying once");
        tokio::time::sleep(retry_delay).await;
        match op().await {
            Ok(()) => return Outcome::Deleted,
            Err(e) => e,
        }
    } else {
        first
    };

    if err.is_not_found() {
        tracing::debug!(subject, "Already deleted");
        return Outcome::AlreadyGone;
    }

    tracing::warn!(subject, error = %err, "Deletion failed");
    Outcome::Failed(err.to_string())
}

/// Runs the cache retention engine against a [`CacheStore`].
pub struct CachePruner<S> {
    store: S,
    policy: CachePolicy,
    options: ExecutionOptions,
    scope: String,
}

impl<S: CacheStore> CachePruner<S> {
    /// Create a pruner. `scope` labels the report (usually `owner/repo`).
    pub fn new(store: S, policy: CachePolicy, options: ExecutionOptions, scope: impl Into<String>) -> Self {
        Self {
            store,
            policy,
            options,
            scope: scope.into(),
        }
    }

    /// List, evaluate and prune.
    ///
    /// # Errors
    ///
    /// Returns an error only when the cache entries cannot be listed.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<CacheReport> {
        let entries = self.store.list_cache_entries().await?;
        tracing::info!(
            scope = %self.scope,
            entries = entries.len(),
            dry_run = self.options.dry_run,
            "Evaluating cache entries"
        );

        let decisions = cache::evaluate(&entries, now, &self.policy);

        let mut executed: Vec<(usize, Decision)> = stream::iter(decisions.into_iter().enumerate())
            .map(|(index, decision)| async move { (index, self.execute(decision).await) })
            .buffer_unordered(self.options.limit())
            .collect()
            .await;
        executed.sort_by_key(|(index, _)| *index);

        let report = CacheReport::new(
            self.scope.clone(),
            self.options.dry_run,
            executed.into_iter().map(|(_, d)| d).collect(),
        );
        tracing::info!(
            deleted = report.summary.deleted,
            kept = report.summary.kept,
            failed = report.summary.failed,
            reclaimed = %format_bytes(report.summary.bytes_reclaimed),
            "Cache cleanup finished"
        );
        Ok(report)
    }

    async fn execute(&self, decision: CacheDecision) -> Decision {
        let size = format_bytes(decision.size_bytes);
        let outcome = match decision.verdict {
            Verdict::Keep(reason) => {
                tracing::info!(
                    key = %decision.key,
                    id = decision.id,
                    reason = %reason,
                    size = %size,
                    last_accessed = %decision.last_accessed_at,
                    "Keeping cache entry"
                );
                Outcome::Kept
            }
            Verdict::Delete(reason) => {
                tracing::warn!(
                    key = %decision.key,
                    id = decision.id,
                    reason = %reason,
                    size = %size,
                    last_accessed = %decision.last_accessed_at,
                    dry_run = self.options.dry_run,
                    "Deleting cache entry"
                );
                if self.options.dry_run {
                    Outcome::Skipped
                } else {
                    let subject = format!("cache {} ({})", decision.id, decision.key);
                    delete_with_retry(&subject, self.options.retry_delay, || {
                        self.store.delete_cache_entry(decision.id)
                    })
                    .await
                }
            }
        };

        Decision {
            id: decision.id,
            subject: decision.key,
            verdict: decision.verdict,
            outcome,
            size_bytes: Some(decision.size_bytes),
            classes: Vec::new(),
        }
    }
}

/// Runs the registry retention engine for every package of a [`PackageStore`].
pub struct RegistryPruner<S, O> {
    store: S,
    oracle: O,
    policy: RegistryPolicy,
    options: ExecutionOptions,
    allow_list: Vec<String>,
    scope: String,
}

impl<S: PackageStore, O: RefOracle> RegistryPruner<S, O> {
    /// Create a pruner. `scope` labels the report (usually the owner).
    pub fn new(
        store: S,
        oracle: O,
        policy: RegistryPolicy,
        options: ExecutionOptions,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            store,
            oracle,
            policy,
            options,
            allow_list: Vec::new(),
            scope: scope.into(),
        }
    }

    /// Restrict the run to the named packages. An empty list means all.
    #[must_use]
    pub fn with_packages(mut self, packages: Vec<String>) -> Self {
        self.allow_list = packages;
        self
    }

    /// List packages, then evaluate and prune each one independently.
    ///
    /// # Errors
    ///
    /// Returns an error only when the package list cannot be fetched.
    pub async fn run(&self) -> Result<RegistryReport> {
        let mut packages = self.store.list_packages().await?;

        if !self.allow_list.is_empty() {
            for wanted in &self.allow_list {
                if !packages.iter().any(|p| &p.name == wanted) {
                    tracing::warn!(package = %wanted, "Requested package not found");
                }
            }
            packages.retain(|p| self.allow_list.contains(&p.name));
        }

        tracing::info!(
            scope = %self.scope,
            packages = packages.len(),
            dry_run = self.options.dry_run,
            "Evaluating registry packages"
        );

        let sections: Vec<PackageReport> = stream::iter(packages)
            .map(|package| async move { self.process_package(package).await })
            .buffer_unordered(self.options.limit())
            .collect()
            .await;

        let report = RegistryReport::new(self.scope.clone(), self.options.dry_run, sections);
        tracing::info!(
            deleted = report.summary.deleted,
            kept = report.summary.kept,
            failed = report.summary.failed,
            ambiguous_refs = report.ambiguous_refs(),
            "Registry cleanup finished"
        );
        Ok(report)
    }

    async fn process_package(&self, package: Package) -> PackageReport {
        let versions = match self.store.list_versions(&package).await {
            Ok(versions) => versions,
            Err(e) => {
                tracing::warn!(package = %package.name, error = %e, "Could not list versions");
                return PackageReport::listing_failed(package.name, e.to_string());
            }
        };

        let (known, ambiguous) = self
            .resolve_refs(registry::required_refs(&versions, &self.policy.testing_prefix))
            .await;

        let decisions = registry::evaluate_package(
            &versions,
            |name| known.get(name).copied().unwrap_or(false),
            &self.policy,
        );

        let mut executed: Vec<(usize, Decision)> = stream::iter(decisions.into_iter().enumerate())
            .map(|(index, decision)| {
                let package = &package;
                async move { (index, self.execute(package, decision).await) }
            })
            .buffer_unordered(self.options.limit())
            .collect()
            .await;
        executed.sort_by_key(|(index, _)| *index);

        PackageReport::new(
            package.name,
            executed.into_iter().map(|(_, d)| d).collect(),
            ambiguous,
        )
    }

    /// Ask the oracle about every ref once. Ambiguous answers count as gone.
    async fn resolve_refs(
        &self,
        refs: impl IntoIterator<Item = String>,
    ) -> (BTreeMap<String, bool>, usize) {
        let answers: Vec<(String, Result<bool>)> = stream::iter(refs)
            .map(|name| async move {
                let answer = self.oracle.ref_exists(&name).await;
                (name, answer)
            })
            .buffer_unordered(self.options.limit())
            .collect()
            .await;

        let mut ambiguous = 0;
        let known: BTreeMap<String, bool> = answers
            .into_iter()
            .map(|(name, answer)| {
                let exists = match answer {
                    Ok(exists) => exists,
                    Err(Error::NotFound { .. }) => false,
                    Err(e) => {
                        tracing::warn!(
                            ref_name = %name,
                            error = %e,
                            "Ref existence unknown, treating as deleted"
                        );
                        ambiguous += 1;
                        false
                    }
                };
                (name, exists)
            })
            .collect();

        (known, ambiguous)
    }

    async fn execute(&self, package: &Package, decision: VersionDecision) -> Decision {
        let subject = format!("{}@{}", package.name, decision.digest);
        let tags = decision.tags.join(",");
        let classes = decision
            .classes
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let outcome = match decision.verdict {
            Verdict::Keep(reason) => {
                tracing::info!(
                    package = %package.name,
                    id = decision.id,
                    tags = %tags,
                    classes = %classes,
                    reason = %reason,
                    "Keeping image version"
                );
                Outcome::Kept
            }
            Verdict::Delete(reason) => {
                tracing::warn!(
                    package = %package.name,
                    id = decision.id,
                    tags = %tags,
                    classes = %classes,
                    reason = %reason,
                    dry_run = self.options.dry_run,
                    "Deleting image version"
                );
                if self.options.dry_run {
                    Outcome::Skipped
                } else {
                    delete_with_retry(&subject, self.options.retry_delay, || {
                        self.store.delete_version(package, decision.id)
                    })
                    .await
                }
            }
        };

        Decision {
            id: decision.id,
            subject,
            verdict: decision.verdict,
            outcome,
            size_bytes: None,
            classes: decision.classes,
        }
    }
}
