use crate::framework::{ActorEntity, FrameworkError, ResourceClient};
use async_trait::async_trait;

/// Trait for resource-specific clients to inherit the keyed read and delete
/// operations every store offers.
#[async_trait]
pub trait ActorClient<T: ActorEntity>: Send + Sync {
    /// The resource-specific error type.
    type Error: Send + Sync;

    /// Access the inner generic ResourceClient.
    fn inner(&self) -> &ResourceClient<T>;

    /// Map framework errors to the specific resource error type.
    fn map_error(e: FrameworkError) -> Self::Error;

    /// Fetch an entity by ID.
    #[tracing::instrument(skip(self))]
    async fn get(&self, id: T::Id) -> Result<Option<T>, Self::Error> {
        tracing::debug!("Sending request");
        self.inner().get(id).await.map_err(Self::map_error)
    }

    /// Fetch an entity by its user-facing key.
    #[tracing::instrument(skip(self))]
    async fn get_by_key(&self, key: T::Key) -> Result<Option<T>, Self::Error> {
        tracing::debug!("Sending request");
        self.inner().get_by_key(key).await.map_err(Self::map_error)
    }

    /// Delete the entity holding `key`. Returns the removed entity, or `None`
    /// if nothing held the key.
    #[tracing::instrument(skip(self))]
    async fn delete_by_key(&self, key: T::Key) -> Result<Option<T>, Self::Error> {
        tracing::debug!("Sending request");
        let Some(existing) = self.inner().get_by_key(key).await.map_err(Self::map_error)? else {
            return Ok(None);
        };
        match self.inner().delete(existing.id()).await {
            Ok(removed) => Ok(Some(removed)),
            Err(FrameworkError::NotFound(_)) => Ok(None),
            Err(e) => Err(Self::map_error(e)),
        }
    }
}
