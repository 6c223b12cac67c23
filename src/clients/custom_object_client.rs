use crate::clients::actor_client::ActorClient;
use crate::clients::catalog_client::ClientError;
use crate::framework::{FrameworkError, ResourceClient};
use crate::model::{CustomObject, CustomObjectDraft, CustomObjectQuery};
use tracing::{debug, instrument};

/// Client for the custom-object store.
#[derive(Clone)]
pub struct CustomObjectClient {
    inner: ResourceClient<CustomObject>,
}

impl CustomObjectClient {
    pub fn new(inner: ResourceClient<CustomObject>) -> Self {
        Self { inner }
    }

    /// Creates the object, or replaces the value of the one already stored
    /// under the same container and key.
    #[instrument(skip(self, draft), fields(container = %draft.container, key = %draft.key))]
    pub async fn upsert(&self, draft: CustomObjectDraft) -> Result<CustomObject, ClientError> {
        debug!("Sending request");
        self.inner.upsert(draft).await.map_err(Self::map_error)
    }

    #[instrument(skip(self))]
    pub async fn query(&self, query: CustomObjectQuery) -> Result<Vec<CustomObject>, ClientError> {
        debug!("Sending request");
        self.inner.query(query).await.map_err(Self::map_error)
    }
}

impl ActorClient<CustomObject> for CustomObjectClient {
    type Error = ClientError;

    fn inner(&self) -> &ResourceClient<CustomObject> {
        &self.inner
    }

    fn map_error(e: FrameworkError) -> Self::Error {
        e.into()
    }
}
