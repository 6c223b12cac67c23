use crate::clients::{ActorClient, ClientError, CustomObjectClient};
use crate::model::{CustomObjectDraft, CustomObjectKey, CustomObjectQuery, ResourceKey, ResourceKind};
use crate::resolution::store::{CleanupStatistics, StoreError, UnresolvedReferenceStore, WaitingEntry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

const CONTAINER_PREFIX: &str = "catalog-sync.unresolved-references";

impl From<ClientError> for StoreError {
    fn from(e: ClientError) -> Self {
        StoreError::Backend(e.to_string())
    }
}

/// Keeps waiting drafts as custom objects, one container per resource kind
/// and the draft key as object key.
#[derive(Clone)]
pub struct CustomObjectReferenceStore {
    client: CustomObjectClient,
}

impl CustomObjectReferenceStore {
    pub fn new(client: CustomObjectClient) -> Self {
        Self { client }
    }

    pub fn container_for(kind: ResourceKind) -> String {
        format!("{CONTAINER_PREFIX}.{kind}")
    }

    fn object_key(draft_key: &ResourceKey) -> CustomObjectKey {
        CustomObjectKey::new(Self::container_for(draft_key.kind), draft_key.key.clone())
    }
}

#[async_trait]
impl UnresolvedReferenceStore for CustomObjectReferenceStore {
    #[instrument(skip(self, entry), fields(missing = entry.missing_keys.len()))]
    async fn save(&self, entry: WaitingEntry) -> Result<(), StoreError> {
        let draft_key = entry.validate()?;
        let draft = CustomObjectDraft {
            container: Self::container_for(draft_key.kind),
            key: draft_key.key.clone(),
            value: serde_json::to_value(&entry)?,
        };
        self.client.upsert(draft).await?;
        debug!(key = %draft_key, "Waiting entry saved");
        Ok(())
    }

    async fn fetch(&self, draft_key: &ResourceKey) -> Result<Option<WaitingEntry>, StoreError> {
        match self.client.get_by_key(Self::object_key(draft_key)).await? {
            Some(object) => Ok(Some(serde_json::from_value(object.value)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    async fn fetch_all_waiting_on(&self, key: &ResourceKey) -> Result<Vec<WaitingEntry>, StoreError> {
        // Drafts of any kind may wait on `key`.
        let mut entries = Vec::new();
        for kind in ResourceKind::ALL {
            let query = CustomObjectQuery {
                container: Self::container_for(kind),
                array_contains: Some(("/missingKeys".to_string(), serde_json::to_value(key)?)),
            };
            for object in self.client.query(query).await? {
                entries.push(serde_json::from_value(object.value)?);
            }
        }
        debug!(found = entries.len(), "Fetched waiting entries");
        Ok(entries)
    }

    async fn delete(&self, draft_key: &ResourceKey) -> Result<Option<WaitingEntry>, StoreError> {
        match self.client.delete_by_key(Self::object_key(draft_key)).await? {
            Some(object) => Ok(Some(serde_json::from_value(object.value)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    async fn cleanup(&self, older_than: DateTime<Utc>) -> Result<CleanupStatistics, StoreError> {
        let mut stats = CleanupStatistics::default();
        for kind in ResourceKind::ALL {
            let query = CustomObjectQuery {
                container: Self::container_for(kind),
                array_contains: None,
            };
            for object in self.client.query(query).await? {
                let object_key = CustomObjectKey::new(object.container.clone(), object.key.clone());
                let entry: WaitingEntry = match serde_json::from_value(object.value) {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!(object = %object_key, error = %e, "Unreadable waiting entry");
                        stats.failed += 1;
                        continue;
                    }
                };
                if entry.last_modified >= older_than {
                    continue;
                }
                match self.client.delete_by_key(object_key.clone()).await {
                    Ok(_) => stats.deleted += 1,
                    Err(e) => {
                        warn!(object = %object_key, error = %e, "Could not delete waiting entry");
                        stats.failed += 1;
                    }
                }
            }
        }
        info!(deleted = stats.deleted, failed = stats.failed, "Waiting entries cleaned up");
        Ok(stats)
    }
}
