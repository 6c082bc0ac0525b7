//! Cache retention engine.
//!
//! Groups build-cache entries by key, expires entries that are idle or too
//! old, then keeps only the most recently accessed survivor of each group.

use crate::verdict::{DeleteReason, KeepReason, Verdict};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default idle threshold (3 days).
pub const DEFAULT_IDLE_DAYS: u32 = 3;

/// Default max-age threshold (7 days).
pub const DEFAULT_MAX_AGE_DAYS: u32 = 7;

/// One entry of the remote build cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Remote identifier.
    pub id: u64,
    /// Branch or pull-request ref that produced the entry.
    pub ref_name: String,
    /// Logical cache name.
    pub key: String,
    /// Content-hash suffix.
    pub version: String,
    /// When the entry was stored.
    pub created_at: DateTime<Utc>,
    /// When the entry was last restored.
    pub last_accessed_at: DateTime<Utc>,
    /// Stored size.
    pub size_bytes: u64,
}

/// Expiry thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// Entries not accessed for this long are deleted as idle.
    pub idle: Duration,
    /// Entries created this long ago are deleted as expired.
    pub max_age: Duration,
}

impl CachePolicy {
    /// Build a policy from whole-day thresholds.
    #[must_use]
    pub fn from_days(idle_days: u32, max_age_days: u32) -> Self {
        Self {
            idle: Duration::days(i64::from(idle_days)),
            max_age: Duration::days(i64::from(max_age_days)),
        }
    }

    /// Classify an entry against the thresholds. Idle wins when both apply.
    #[must_use]
    pub fn expiry(&self, entry: &CacheEntry, now: DateTime<Utc>) -> Option<DeleteReason> {
        if now - entry.last_accessed_at >= self.idle {
            Some(DeleteReason::Idle)
        } else if now - entry.created_at >= self.max_age {
            Some(DeleteReason::Expired)
        } else {
            None
        }
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::from_days(DEFAULT_IDLE_DAYS, DEFAULT_MAX_AGE_DAYS)
    }
}

/// Verdict for a single cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheDecision {
    /// Remote identifier.
    pub id: u64,
    /// Cache key the entry belongs to.
    pub key: String,
    /// Stored size.
    pub size_bytes: u64,
    /// When the entry was last restored.
    pub last_accessed_at: DateTime<Utc>,
    /// Engine verdict.
    pub verdict: Verdict,
}

impl CacheDecision {
    fn new(entry: &CacheEntry, verdict: Verdict) -> Self {
        Self {
            id: entry.id,
            key: entry.key.clone(),
            size_bytes: entry.size_bytes,
            last_accessed_at: entry.last_accessed_at,
            verdict,
        }
    }
}

/// Group entries by cache key. Group order is the key order.
#[must_use]
pub fn group_by_key(entries: &[CacheEntry]) -> BTreeMap<&str, Vec<&CacheEntry>> {
    let mut groups: BTreeMap<&str, Vec<&CacheEntry>> = BTreeMap::new();
    for entry in entries {
        groups.entry(entry.key.as_str()).or_default().push(entry);
    }
    groups
}

/// Evaluate every entry of the snapshot.
///
/// Returns exactly one decision per input entry, ordered by key and then by
/// recency within the key. Within a group at most one entry is kept: the
/// survivor with the latest `last_accessed_at` (ties go to the newer
/// `created_at`, then the smaller id).
#[must_use]
pub fn evaluate(
    entries: &[CacheEntry],
    now: DateTime<Utc>,
    policy: &CachePolicy,
) -> Vec<CacheDecision> {
    let mut decisions = Vec::with_capacity(entries.len());

    for (_, group) in group_by_key(entries) {
        decisions.extend(evaluate_group(&group, now, policy));
    }

    decisions
}

/// Evaluate a single key group.
#[must_use]
pub fn evaluate_group(
    group: &[&CacheEntry],
    now: DateTime<Utc>,
    policy: &CachePolicy,
) -> Vec<CacheDecision> {
    let mut decisions = Vec::with_capacity(group.len());
    let mut survivors: Vec<&CacheEntry> = Vec::new();

    for &entry in group {
        match policy.expiry(entry, now) {
            Some(reason) => decisions.push(CacheDecision::new(entry, Verdict::Delete(reason))),
            None => survivors.push(entry),
        }
    }

    survivors.sort_by(|a, b| {
        b.last_accessed_at
            .cmp(&a.last_accessed_at)
            .then_with(|| b.created_at.cmp(&a.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });

    let keep_reason = if survivors.len() > 1 {
        KeepReason::MostRecent
    } else {
        KeepReason::OnlyCandidate
    };

    let mut survivors = survivors.into_iter();
    if let Some(newest) = survivors.next() {
        decisions.push(CacheDecision::new(newest, Verdict::Keep(keep_reason)));
    }
    for stale in survivors {
        decisions.push(CacheDecision::new(
            stale,
            Verdict::Delete(DeleteReason::Duplicate),
        ));
    }

    decisions
}
