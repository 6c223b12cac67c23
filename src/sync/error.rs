use crate::clients::ClientError;
use crate::diff::DiffError;
use crate::model::ResourceKey;
use thiserror::Error;

/// Why one draft could not be synced. Handed to the error callback, never
/// returned from [`sync`](crate::sync::ReconciliationCoordinator::sync).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SyncError {
    #[error("Draft has no key")]
    MissingKey,

    /// The target rejected the payload. Not retried.
    #[error("Target rejected {key}: {reason}")]
    Validation { key: ResourceKey, reason: String },

    #[error("Gave up on {key} after {attempts} conflicting writes")]
    ConflictExhausted { key: ResourceKey, attempts: u32 },

    /// Network or backend failure. Not retried here.
    #[error("Transport failure for {key}: {reason}")]
    Transport { key: ResourceKey, reason: String },

    #[error("{key} was deleted while it was being synced")]
    ConcurrentlyDeleted { key: ResourceKey },

    /// The draft cannot be diffed, e.g. two prices share a key.
    #[error("Cannot compute actions for {key}: {source}")]
    Diff {
        key: ResourceKey,
        #[source]
        source: DiffError,
    },

    #[error("A before-create or before-update hook for {key} introduced unresolved references: {missing:?}")]
    HookIntroducedUnresolvedReference {
        key: ResourceKey,
        missing: Vec<ResourceKey>,
    },

    #[error("Could not update the waiting entry of {key}: {reason}")]
    Store { key: ResourceKey, reason: String },
}

impl SyncError {
    pub(crate) fn from_client(key: &ResourceKey, e: ClientError) -> Self {
        let key = key.clone();
        match e {
            ClientError::Validation(reason) => SyncError::Validation { key, reason },
            ClientError::NotFound(_) => SyncError::ConcurrentlyDeleted { key },
            ClientError::Conflict(reason) | ClientError::Transport(reason) => {
                SyncError::Transport { key, reason }
            }
        }
    }

    pub fn key(&self) -> Option<&ResourceKey> {
        match self {
            SyncError::MissingKey => None,
            SyncError::Validation { key, .. }
            | SyncError::ConflictExhausted { key, .. }
            | SyncError::Transport { key, .. }
            | SyncError::ConcurrentlyDeleted { key }
            | SyncError::Diff { key, .. }
            | SyncError::HookIntroducedUnresolvedReference { key, .. }
            | SyncError::Store { key, .. } => Some(key),
        }
    }
}
