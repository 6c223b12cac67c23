use crate::catalog_actor::CatalogFilter;
use crate::clients::actor_client::ActorClient;
use crate::framework::{FrameworkError, ResourceClient};
use crate::model::{CatalogResource, ResourceDraft, ResourceKey, UpdateAction};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;
use tracing::{debug, instrument};

/// Failures reported by the target store.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClientError {
    /// Stale version on update, or the key was taken concurrently on create.
    #[error("Concurrent modification: {0}")]
    Conflict(String),

    /// The target rejected the payload.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The addressed resource no longer exists.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The request never got an answer.
    #[error("Transport failure: {0}")]
    Transport(String),
}

impl From<FrameworkError> for ClientError {
    fn from(e: FrameworkError) -> Self {
        match e {
            FrameworkError::Conflict { .. } | FrameworkError::DuplicateKey(_) => {
                ClientError::Conflict(e.to_string())
            }
            FrameworkError::Validation(reason) => ClientError::Validation(reason),
            FrameworkError::NotFound(id) => ClientError::NotFound(id),
            FrameworkError::ActorClosed | FrameworkError::ActorDropped => {
                ClientError::Transport(e.to_string())
            }
        }
    }
}

/// The operations the reconciliation engine needs from a catalog backend.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn fetch_by_key(&self, key: &ResourceKey) -> Result<Option<CatalogResource>, ClientError>;

    /// Fetches every existing resource among `keys`. Absent keys are skipped.
    async fn fetch_by_keys(&self, keys: &BTreeSet<ResourceKey>) -> Result<Vec<CatalogResource>, ClientError> {
        let mut found = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(resource) = self.fetch_by_key(key).await? {
                found.push(resource);
            }
        }
        Ok(found)
    }

    async fn create(&self, draft: &ResourceDraft) -> Result<CatalogResource, ClientError>;

    async fn update(
        &self,
        id: &str,
        version: u64,
        actions: &[UpdateAction],
    ) -> Result<CatalogResource, ClientError>;

    /// Looks up the ids of every existing resource among `keys`.
    async fn batch_fetch_keys_to_ids(
        &self,
        keys: &BTreeSet<ResourceKey>,
    ) -> Result<HashMap<ResourceKey, String>, ClientError>;
}

/// [`CatalogClient`] backed by the in-memory catalog store actor.
#[derive(Clone)]
pub struct StoreCatalogClient {
    inner: ResourceClient<CatalogResource>,
}

impl StoreCatalogClient {
    pub fn new(inner: ResourceClient<CatalogResource>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ActorClient<CatalogResource> for StoreCatalogClient {
    type Error = ClientError;

    fn inner(&self) -> &ResourceClient<CatalogResource> {
        &self.inner
    }

    fn map_error(e: FrameworkError) -> Self::Error {
        e.into()
    }
}

#[async_trait]
impl CatalogClient for StoreCatalogClient {
    async fn fetch_by_key(&self, key: &ResourceKey) -> Result<Option<CatalogResource>, ClientError> {
        self.get_by_key(key.clone()).await
    }

    #[instrument(skip(self), fields(keys = keys.len()))]
    async fn fetch_by_keys(&self, keys: &BTreeSet<ResourceKey>) -> Result<Vec<CatalogResource>, ClientError> {
        debug!("Sending request");
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let filter = CatalogFilter { keys: keys.clone() };
        Ok(self.inner.query(filter).await?)
    }

    #[instrument(skip(self, draft), fields(key = ?draft.key))]
    async fn create(&self, draft: &ResourceDraft) -> Result<CatalogResource, ClientError> {
        debug!("Sending request");
        Ok(self.inner.create(draft.clone()).await?)
    }

    #[instrument(skip(self, actions), fields(actions = actions.len()))]
    async fn update(
        &self,
        id: &str,
        version: u64,
        actions: &[UpdateAction],
    ) -> Result<CatalogResource, ClientError> {
        debug!("Sending request");
        Ok(self.inner.update(id.to_string(), version, actions.to_vec()).await?)
    }

    #[instrument(skip(self), fields(keys = keys.len()))]
    async fn batch_fetch_keys_to_ids(
        &self,
        keys: &BTreeSet<ResourceKey>,
    ) -> Result<HashMap<ResourceKey, String>, ClientError> {
        debug!("Sending request");
        let found = self.fetch_by_keys(keys).await?;
        Ok(found
            .into_iter()
            .filter_map(|resource| resource.resource_key().map(|key| (key, resource.id)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Reference, ResourceKind};

    fn spawn_store() -> StoreCatalogClient {
        let (actor, client) = crate::catalog_actor::new();
        tokio::spawn(actor.run(()));
        client
    }

    #[tokio::test]
    async fn test_create_then_batch_lookup() {
        let client = spawn_store();
        let created = client
            .create(&ResourceDraft::new(ResourceKind::Category, "shoes"))
            .await
            .unwrap();
        assert_eq!(created.version, 1);

        let shoes = ResourceKey::new(ResourceKind::Category, "shoes");
        let ghost = ResourceKey::new(ResourceKind::Category, "ghost");
        let ids = client
            .batch_fetch_keys_to_ids(&BTreeSet::from([shoes.clone(), ghost]))
            .await
            .unwrap();
        assert_eq!(ids.len(), 1);
        assert_eq!(ids[&shoes], created.id);
    }

    #[tokio::test]
    async fn test_store_errors_map_to_client_errors() {
        let client = spawn_store();
        let draft = ResourceDraft::new(ResourceKind::Product, "prod-A");
        let created = client.create(&draft).await.unwrap();

        assert!(matches!(client.create(&draft).await, Err(ClientError::Conflict(_))));

        let stale = client.update(&created.id, 7, &[]).await;
        assert!(matches!(stale, Err(ClientError::Conflict(_))));

        let unresolved = client
            .update(
                &created.id,
                1,
                &[UpdateAction::AddToCategory {
                    category: Reference::by_key(ResourceKind::Category, "shoes"),
                }],
            )
            .await;
        assert!(matches!(unresolved, Err(ClientError::Validation(_))));

        let missing = client.update("nope", 1, &[]).await;
        assert!(matches!(missing, Err(ClientError::NotFound(_))));
    }
}
