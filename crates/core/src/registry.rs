//! Registry tag retention engine.
//!
//! Decides which container image versions of a single package can be
//! deleted. Three policies run in a fixed order over the same snapshot:
//!
//! 1. testing tags are pruned once anything else (or another testing tag)
//!    can keep the image reachable;
//! 2. tags whose branch or pull request no longer exists are pruned, unless
//!    that would remove the last non-testing reference;
//! 3. untagged versions are pruned, keeping one if nothing is tagged.
//!
//! Decisions merge monotonically: once a policy deletes a version no later
//! policy keeps it. An optional final guard keeps the newest version when
//! the composition of the three policies would otherwise empty the package.

use crate::verdict::{DeleteReason, KeepReason, Verdict};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Reserved prefix of tags produced by pre-merge test builds.
pub const DEFAULT_TESTING_PREFIX: &str = "testing-";

/// A package in the container registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Package {
    /// Package name (may contain `/`).
    pub name: String,
    /// Registry package type, `container` for images.
    pub package_type: String,
}

impl Package {
    /// Create a container package.
    #[must_use]
    pub fn container(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            package_type: "container".to_string(),
        }
    }
}

/// One image version (manifest) of a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageVersion {
    /// Remote identifier used for deletion.
    pub id: u64,
    /// Content digest, stable across tag changes.
    pub digest: String,
    /// Tags currently pointing at this digest.
    pub tags: Vec<String>,
    /// Upload time, when the registry reports it.
    pub created_at: Option<DateTime<Utc>>,
}

impl ImageVersion {
    /// Whether the version carries no tags at all.
    #[must_use]
    pub fn is_untagged(&self) -> bool {
        self.tags.is_empty()
    }

    /// Classification of every tag, or `[Untagged]` for a bare version.
    #[must_use]
    pub fn classes(&self, testing_prefix: &str) -> Vec<TagClass> {
        if self.is_untagged() {
            return vec![TagClass::Untagged];
        }
        self.tags
            .iter()
            .map(|tag| TagClass::of(tag, testing_prefix))
            .collect()
    }
}

/// Derived classification of a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TagClass {
    /// Carries the reserved testing prefix.
    Testing,
    /// Leading dash-delimited segment names a branch or pull request.
    RefBound,
    /// Version without tags.
    Untagged,
    /// Anything else (`latest`, `v1.0`).
    Other,
}

impl TagClass {
    /// Classify a single tag.
    #[must_use]
    pub fn of(tag: &str, testing_prefix: &str) -> Self {
        if tag.starts_with(testing_prefix) {
            Self::Testing
        } else if let Some((lead, _)) = tag.split_once('-')
            && !lead.is_empty()
        {
            Self::RefBound
        } else {
            Self::Other
        }
    }

    /// Whether the policies treat the tag as a transient test build.
    #[must_use]
    pub const fn is_testing(self) -> bool {
        matches!(self, Self::Testing)
    }

    /// Stable tag used in logs and reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Testing => "testing",
            Self::RefBound => "ref-bound",
            Self::Untagged => "untagged",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for TagClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The ref a tag is bound to: its leading dash-delimited segment.
///
/// `feature-x` → `feature`, `1234-abcdef` → `1234`, `latest` → `latest`.
#[must_use]
pub fn ref_name_for_tag(tag: &str) -> &str {
    tag.split_once('-').map_or(tag, |(lead, _)| lead)
}

/// Refs the ref-bound policy will ask about, one entry per distinct name.
///
/// Tags with an empty leading segment (`-x`) name no ref and are never
/// queried; the policy treats them as gone.
#[must_use]
pub fn required_refs(versions: &[ImageVersion], testing_prefix: &str) -> BTreeSet<String> {
    versions
        .iter()
        .flat_map(|v| v.tags.iter())
        .filter(|tag| !TagClass::of(tag, testing_prefix).is_testing())
        .map(|tag| ref_name_for_tag(tag))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Registry policy knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryPolicy {
    /// Prefix that marks a tag as a testing tag.
    pub testing_prefix: String,
    /// Keep the newest version when every version would be deleted.
    pub keep_last_version: bool,
}

impl Default for RegistryPolicy {
    fn default() -> Self {
        Self {
            testing_prefix: DEFAULT_TESTING_PREFIX.to_string(),
            keep_last_version: true,
        }
    }
}

/// Verdict for one image version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionDecision {
    /// Remote identifier.
    pub id: u64,
    /// Content digest.
    pub digest: String,
    /// Tags removed (or kept) together with the version.
    pub tags: Vec<String>,
    /// Distinct classes of those tags, `[Untagged]` for a bare version.
    pub classes: Vec<TagClass>,
    /// Engine verdict.
    pub verdict: Verdict,
}

/// Verdicts accumulated across policies, keyed by version id.
#[derive(Debug, Default)]
struct Ledger {
    verdicts: BTreeMap<u64, Verdict>,
}

impl Ledger {
    /// Record a deletion. The first deletion reason sticks.
    fn delete(&mut self, id: u64, reason: DeleteReason) {
        match self.verdicts.get(&id) {
            Some(Verdict::Delete(_)) => {}
            _ => {
                self.verdicts.insert(id, Verdict::Delete(reason));
            }
        }
    }

    /// Record a keep. Never resurrects a deleted version.
    fn keep(&mut self, id: u64, reason: KeepReason) {
        self.verdicts.entry(id).or_insert(Verdict::Keep(reason));
    }

    fn is_deleted(&self, id: u64) -> bool {
        self.verdicts.get(&id).is_some_and(Verdict::is_delete)
    }

    fn rescue(&mut self, id: u64) {
        self.verdicts.insert(id, Verdict::Keep(KeepReason::LastSurvivor));
    }

    fn verdict(&self, id: u64) -> Verdict {
        self.verdicts
            .get(&id)
            .copied()
            .unwrap_or(Verdict::Keep(KeepReason::Retained))
    }
}

/// Evaluate every version of one package.
///
/// `ref_exists` answers whether a branch or pull request still exists; it is
/// called at most once per distinct ref name, and never for an empty one. Returns one decision per input
/// version, in input order.
#[must_use]
pub fn evaluate_package<F>(
    versions: &[ImageVersion],
    ref_exists: F,
    policy: &RegistryPolicy,
) -> Vec<VersionDecision>
where
    F: Fn(&str) -> bool,
{
    let mut ledger = Ledger::default();

    apply_testing_policy(versions, &policy.testing_prefix, &mut ledger);
    apply_ref_policy(versions, &policy.testing_prefix, ref_exists, &mut ledger);
    apply_untagged_policy(versions, &mut ledger);

    if policy.keep_last_version {
        apply_last_version_guard(versions, &mut ledger);
    }

    versions
        .iter()
        .map(|v| {
            let mut classes = v.classes(&policy.testing_prefix);
            classes.sort_unstable();
            classes.dedup();
            VersionDecision {
                id: v.id,
                digest: v.digest.clone(),
                tags: v.tags.clone(),
                classes,
                verdict: ledger.verdict(v.id),
            }
        })
        .collect()
}

fn apply_testing_policy(versions: &[ImageVersion], prefix: &str, ledger: &mut Ledger) {
    let mut testing_tags: BTreeSet<&str> = BTreeSet::new();
    let mut other_tags: BTreeSet<&str> = BTreeSet::new();
    let mut testing_versions: BTreeSet<u64> = BTreeSet::new();

    for version in versions {
        for tag in &version.tags {
            if TagClass::of(tag, prefix).is_testing() {
                testing_tags.insert(tag);
                testing_versions.insert(version.id);
            } else {
                other_tags.insert(tag);
            }
        }
    }

    if testing_tags.is_empty() || testing_tags.len() + other_tags.len() <= 1 {
        return;
    }

    if other_tags.is_empty() {
        let mut ids = testing_versions.into_iter();
        if let Some(representative) = ids.next() {
            ledger.keep(representative, KeepReason::TestingRepresentative);
        }
        for id in ids {
            ledger.delete(id, DeleteReason::TestingPruned);
        }
    } else {
        for id in testing_versions {
            ledger.delete(id, DeleteReason::TestingSuperseded);
        }
    }
}

fn apply_ref_policy<F>(versions: &[ImageVersion], prefix: &str, ref_exists: F, ledger: &mut Ledger)
where
    F: Fn(&str) -> bool,
{
    let mut known: BTreeMap<&str, bool> = BTreeMap::new();
    let mut stale_tags: BTreeSet<&str> = BTreeSet::new();
    let mut live_tags: BTreeSet<&str> = BTreeSet::new();

    for tag in versions.iter().flat_map(|v| v.tags.iter()) {
        if TagClass::of(tag, prefix).is_testing() {
            continue;
        }
        let ref_name = ref_name_for_tag(tag);
        let exists = !ref_name.is_empty()
            && *known
                .entry(ref_name)
                .or_insert_with(|| ref_exists(ref_name));
        if exists {
            live_tags.insert(tag);
        } else {
            stale_tags.insert(tag);
        }
    }

    if stale_tags.is_empty() {
        return;
    }

    let carriers = versions
        .iter()
        .filter(|v| v.tags.iter().any(|t| stale_tags.contains(t.as_str())));

    if stale_tags.len() + live_tags.len() > 1 {
        for version in carriers {
            ledger.delete(version.id, DeleteReason::RefDeleted);
        }
    } else {
        for version in carriers {
            ledger.keep(version.id, KeepReason::SoleReference);
        }
    }
}

fn apply_untagged_policy(versions: &[ImageVersion], ledger: &mut Ledger) {
    let untagged: BTreeSet<u64> = versions
        .iter()
        .filter(|v| v.is_untagged())
        .map(|v| v.id)
        .collect();

    if untagged.is_empty() || versions.len() <= 1 {
        return;
    }

    if untagged.len() == versions.len() {
        let mut ids = untagged.into_iter();
        if let Some(representative) = ids.next() {
            ledger.keep(representative, KeepReason::UntaggedRepresentative);
        }
        for id in ids {
            ledger.delete(id, DeleteReason::UntaggedPruned);
        }
    } else {
        for id in untagged {
            ledger.delete(id, DeleteReason::UntaggedSuperseded);
        }
    }
}

fn apply_last_version_guard(versions: &[ImageVersion], ledger: &mut Ledger) {
    if !versions.iter().all(|v| ledger.is_deleted(v.id)) {
        return;
    }

    let newest = versions
        .iter()
        .max_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

    if let Some(newest) = newest {
        tracing::debug!(
            id = newest.id,
            digest = %newest.digest,
            "Every version was flagged; keeping the newest"
        );
        ledger.rescue(newest.id);
    }
}
