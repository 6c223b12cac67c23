//! Outcome counters for a coordinator.
//!
//! Every draft that reaches an outcome is counted once in `processed` and
//! once in exactly one bucket. `unresolved` is a gauge: a draft parked by
//! this coordinator and later drained leaves it for its final bucket
//! without being processed a second time.

use crate::model::ResourceKey;
use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Snapshot of the counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatistics {
    pub processed: u64,
    pub created: u64,
    pub updated: u64,
    /// Drafts that needed no write, or that `before_create` skipped.
    pub unchanged: u64,
    pub failed: u64,
    /// Drafts currently waiting on missing references.
    pub unresolved: u64,
    /// Time spent inside `sync` calls, summed.
    pub duration_ms: u64,
}

impl SyncStatistics {
    pub fn summary(&self) -> String {
        format!(
            "Summary: {} resources were processed in total ({} created, {} updated, {} unchanged, {} failed to sync and {} resources with missing reference(s)).",
            self.processed, self.created, self.updated, self.unchanged, self.failed, self.unresolved
        )
    }
}

impl fmt::Display for SyncStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Updated,
    Unchanged,
    Failed,
    Unresolved,
}

/// Thread-safe accumulator behind [`SyncStatistics`].
#[derive(Debug, Default)]
pub struct StatisticsTracker {
    processed: AtomicU64,
    created: AtomicU64,
    updated: AtomicU64,
    unchanged: AtomicU64,
    failed: AtomicU64,
    unresolved: AtomicU64,
    duration_ms: AtomicU64,
    /// Draft keys currently counted in `unresolved`.
    waiting: DashSet<ResourceKey>,
}

impl StatisticsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one outcome for the draft with `key`. Keyless drafts can only fail.
    pub fn record(&self, key: Option<&ResourceKey>, outcome: Outcome) {
        let was_waiting = key.is_some_and(|key| self.waiting.remove(key).is_some());
        if was_waiting {
            self.unresolved.fetch_sub(1, Ordering::SeqCst);
        } else {
            self.processed.fetch_add(1, Ordering::SeqCst);
        }

        let bucket = match outcome {
            Outcome::Created => &self.created,
            Outcome::Updated => &self.updated,
            Outcome::Unchanged => &self.unchanged,
            Outcome::Failed => &self.failed,
            Outcome::Unresolved => {
                if let Some(key) = key {
                    self.waiting.insert(key.clone());
                }
                &self.unresolved
            }
        };
        bucket.fetch_add(1, Ordering::SeqCst);
    }

    pub fn add_duration(&self, elapsed: Duration) {
        let millis = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.duration_ms.fetch_add(millis, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> SyncStatistics {
        SyncStatistics {
            processed: self.processed.load(Ordering::SeqCst),
            created: self.created.load(Ordering::SeqCst),
            updated: self.updated.load(Ordering::SeqCst),
            unchanged: self.unchanged.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            unresolved: self.unresolved.load(Ordering::SeqCst),
            duration_ms: self.duration_ms.load(Ordering::SeqCst),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResourceKind;

    fn assert_balanced(stats: &SyncStatistics) {
        assert_eq!(
            stats.processed,
            stats.created + stats.updated + stats.unchanged + stats.failed + stats.unresolved
        );
    }

    #[test]
    fn test_unresolved_moves_to_final_bucket() {
        let tracker = StatisticsTracker::new();
        let a = ResourceKey::new(ResourceKind::Product, "prod-A");
        let b = ResourceKey::new(ResourceKind::Product, "prod-B");

        tracker.record(Some(&a), Outcome::Unresolved);
        let first = tracker.snapshot();
        assert_eq!((first.processed, first.unresolved), (1, 1));
        assert_balanced(&first);

        tracker.record(Some(&b), Outcome::Created);
        tracker.record(Some(&a), Outcome::Created);
        let second = tracker.snapshot();
        assert_eq!(second.processed, 2);
        assert_eq!(second.created, 2);
        assert_eq!(second.unresolved, 0);
        assert_balanced(&second);
    }

    #[test]
    fn test_requeued_draft_is_counted_once() {
        let tracker = StatisticsTracker::new();
        let a = ResourceKey::new(ResourceKind::Product, "prod-A");
        tracker.record(Some(&a), Outcome::Unresolved);
        tracker.record(Some(&a), Outcome::Unresolved);
        tracker.record(None, Outcome::Failed);

        let stats = tracker.snapshot();
        assert_eq!(stats.processed, 2);
        assert_eq!(stats.unresolved, 1);
        assert_eq!(stats.failed, 1);
        assert_balanced(&stats);
    }

    #[test]
    fn test_summary_wording() {
        let stats = SyncStatistics {
            processed: 5,
            created: 1,
            updated: 1,
            unchanged: 1,
            failed: 1,
            unresolved: 1,
            duration_ms: 12,
        };
        assert_eq!(
            stats.to_string(),
            "Summary: 5 resources were processed in total (1 created, 1 updated, 1 unchanged, 1 failed to sync and 1 resources with missing reference(s))."
        );
    }
}
