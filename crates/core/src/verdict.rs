//! Decision records shared by both retention engines.

use crate::registry::TagClass;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why an entity must be deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeleteReason {
    /// Cache entry not accessed within the idle threshold.
    Idle,
    /// Cache entry created before the max-age threshold.
    Expired,
    /// A more recently accessed entry exists for the same key.
    Duplicate,
    /// Only testing tags exist; another testing tag was kept.
    TestingPruned,
    /// Non-testing tags keep the image reachable.
    TestingSuperseded,
    /// The branch or pull request behind the tag is gone.
    RefDeleted,
    /// Every version is untagged; another one was kept.
    UntaggedPruned,
    /// Tagged versions remain as valid references.
    UntaggedSuperseded,
}

impl DeleteReason {
    /// Stable reason tag used in logs and reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Expired => "expired",
            Self::Duplicate => "duplicate",
            Self::TestingPruned => "testing-pruned",
            Self::TestingSuperseded => "testing-superseded",
            Self::RefDeleted => "ref-deleted",
            Self::UntaggedPruned => "untagged-pruned",
            Self::UntaggedSuperseded => "untagged-superseded",
        }
    }
}

impl fmt::Display for DeleteReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an entity survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeepReason {
    /// Most recently accessed of several live cache entries.
    MostRecent,
    /// The only live cache entry for its key.
    OnlyCandidate,
    /// The single testing tag retained when nothing else is tagged.
    TestingRepresentative,
    /// The single untagged version retained when nothing is tagged.
    UntaggedRepresentative,
    /// Stale ref tag kept because it is the sole remaining reference.
    SoleReference,
    /// Rescued by the package-level guard so the package is never emptied.
    LastSurvivor,
    /// No rule flagged the version.
    Retained,
}

impl KeepReason {
    /// Stable reason tag used in logs and reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MostRecent => "most-recent",
            Self::OnlyCandidate => "only-candidate",
            Self::TestingRepresentative => "testing-representative",
            Self::UntaggedRepresentative => "untagged-representative",
            Self::SoleReference => "sole-reference",
            Self::LastSurvivor => "last-survivor",
            Self::Retained => "retained",
        }
    }
}

impl fmt::Display for KeepReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-entity decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", content = "reason", rename_all = "lowercase")]
pub enum Verdict {
    /// Leave the entity in place.
    Keep(KeepReason),
    /// Remove the entity from the remote store.
    Delete(DeleteReason),
}

impl Verdict {
    /// Whether this verdict removes the entity.
    #[must_use]
    pub const fn is_delete(&self) -> bool {
        matches!(self, Self::Delete(_))
    }

    /// Whether this verdict keeps the entity.
    #[must_use]
    pub const fn is_keep(&self) -> bool {
        matches!(self, Self::Keep(_))
    }

    /// The reason tag, whichever side of the decision.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Keep(reason) => reason.as_str(),
            Self::Delete(reason) => reason.as_str(),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keep(reason) => write!(f, "keep ({reason})"),
            Self::Delete(reason) => write!(f, "delete ({reason})"),
        }
    }
}

/// What happened when a verdict was executed against the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "kebab-case")]
pub enum Outcome {
    /// Nothing to execute.
    Kept,
    /// The remote deletion succeeded.
    Deleted,
    /// The entity was already gone; treated as success.
    AlreadyGone,
    /// Dry run: the deletion was not attempted.
    Skipped,
    /// The deletion failed after the permitted retry.
    Failed(String),
}

/// One `(entity, verdict, outcome)` record of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    /// Remote identifier of the entity.
    pub id: u64,
    /// Human-readable subject (cache key, `package@digest`).
    pub subject: String,
    /// Engine verdict.
    pub verdict: Verdict,
    /// Execution result.
    pub outcome: Outcome,
    /// Size in bytes where the store reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    /// Tag classes of an image version. Empty for cache entries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<TagClass>,
}

/// Aggregate counters for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Entities evaluated.
    pub examined: usize,
    /// Entities with a keep verdict.
    pub kept: usize,
    /// Deletions that succeeded or found the entity already gone.
    pub deleted: usize,
    /// Deletions that failed.
    pub failed: usize,
    /// Deletions not attempted because of dry run.
    pub skipped: usize,
    /// Bytes freed by deletions this run performed.
    pub bytes_reclaimed: u64,
}

impl RunSummary {
    /// Account for one executed decision.
    pub fn record(&mut self, decision: &Decision) {
        self.examined += 1;
        match &decision.outcome {
            Outcome::Kept => self.kept += 1,
            Outcome::Deleted => {
                self.deleted += 1;
                self.bytes_reclaimed += decision.size_bytes.unwrap_or(0);
            }
            Outcome::AlreadyGone => self.deleted += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Failed(_) => self.failed += 1,
        }
    }

    /// Fold another summary into this one.
    pub fn merge(&mut self, other: &Self) {
        self.examined += other.examined;
        self.kept += other.kept;
        self.deleted += other.deleted;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.bytes_reclaimed += other.bytes_reclaimed;
    }

    /// Whether every attempted deletion went through.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.failed == 0
    }
}
