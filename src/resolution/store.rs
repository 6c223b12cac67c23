use crate::model::{ResourceDraft, ResourceKey};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// A draft parked until the resources behind `missing_keys` exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitingEntry {
    pub draft: ResourceDraft,
    pub missing_keys: BTreeSet<ResourceKey>,
    /// Set on creation and whenever the missing set shrinks.
    #[serde(default = "Utc::now")]
    pub last_modified: DateTime<Utc>,
}

impl WaitingEntry {
    /// Fails for keyless drafts and for an empty missing set, neither of
    /// which may be persisted.
    pub fn new(draft: ResourceDraft, missing_keys: BTreeSet<ResourceKey>) -> Result<Self, StoreError> {
        let entry = Self {
            draft,
            missing_keys,
            last_modified: Utc::now(),
        };
        entry.validate()?;
        Ok(entry)
    }

    pub fn draft_key(&self) -> Option<ResourceKey> {
        self.draft
            .key
            .as_ref()
            .map(|key| ResourceKey::new(self.draft.kind, key.clone()))
    }

    pub fn touch(&mut self) {
        self.last_modified = Utc::now();
    }

    pub(crate) fn validate(&self) -> Result<ResourceKey, StoreError> {
        if self.missing_keys.is_empty() {
            return Err(StoreError::EmptyMissingKeys);
        }
        self.draft_key().ok_or(StoreError::MissingDraftKey)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("A waiting entry needs at least one missing key")]
    EmptyMissingKeys,

    #[error("A waiting entry needs a keyed draft")]
    MissingDraftKey,
}

/// Durable queue of drafts waiting on missing references, indexed by the
/// keys they wait on.
///
/// Entries are addressed by their draft's own key: saving an entry for a key
/// that already has one replaces it.
#[async_trait]
pub trait UnresolvedReferenceStore: Send + Sync {
    async fn save(&self, entry: WaitingEntry) -> Result<(), StoreError>;

    async fn fetch(&self, draft_key: &ResourceKey) -> Result<Option<WaitingEntry>, StoreError>;

    /// Every entry whose missing set contains `key`.
    async fn fetch_all_waiting_on(&self, key: &ResourceKey) -> Result<Vec<WaitingEntry>, StoreError>;

    /// Removes and returns the entry for `draft_key`, if any.
    async fn delete(&self, draft_key: &ResourceKey) -> Result<Option<WaitingEntry>, StoreError>;

    /// Deletes every entry last modified before `older_than`. Entries that
    /// cannot be read or removed are counted as failed and left in place.
    async fn cleanup(&self, older_than: DateTime<Utc>) -> Result<CleanupStatistics, StoreError>;
}

/// Outcome of [`UnresolvedReferenceStore::cleanup`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupStatistics {
    pub deleted: u64,
    pub failed: u64,
}
