use crate::clients::{CustomObjectClient, StoreCatalogClient};
use crate::resolution::CustomObjectReferenceStore;
use crate::sync::{ReconciliationCoordinator, SyncOptions};
use tracing::{error, info};

/// Coordinator wired to the in-memory stores.
pub type InMemoryCoordinator = ReconciliationCoordinator<StoreCatalogClient, CustomObjectReferenceStore>;

/// Starts and stops the in-memory backend: a catalog store and the
/// custom-object store that holds waiting drafts.
///
/// # Example
///
/// ```ignore
/// let system = SyncSystem::new();
/// let coordinator = system.coordinator(SyncOptions::default());
/// let stats = coordinator.sync(drafts).await;
///
/// drop(coordinator);
/// system.shutdown().await?;
/// ```
pub struct SyncSystem {
    pub catalog_client: StoreCatalogClient,

    pub custom_object_client: CustomObjectClient,

    handles: Vec<tokio::task::JoinHandle<()>>,
}

impl SyncSystem {
    /// Spawns both store actors. Must be called inside a Tokio runtime.
    pub fn new() -> Self {
        let (catalog_actor, catalog_client) = crate::catalog_actor::new();
        let (custom_object_actor, custom_object_client) = crate::custom_object_actor::new();

        let catalog_handle = tokio::spawn(catalog_actor.run(()));
        let custom_object_handle = tokio::spawn(custom_object_actor.run(()));

        info!("Stores started");
        Self {
            catalog_client,
            custom_object_client,
            handles: vec![catalog_handle, custom_object_handle],
        }
    }

    /// A coordinator that writes to the catalog store and parks waiting
    /// drafts in the custom-object store.
    pub fn coordinator(&self, options: SyncOptions) -> InMemoryCoordinator {
        ReconciliationCoordinator::new(
            self.catalog_client.clone(),
            CustomObjectReferenceStore::new(self.custom_object_client.clone()),
            options,
        )
    }

    /// Drops the clients and waits for the actors to drain their queues.
    ///
    /// Clients handed out elsewhere (coordinators included) keep their actor
    /// alive, so drop them first.
    pub async fn shutdown(self) -> Result<(), String> {
        info!("Shutting down system...");

        drop(self.catalog_client);
        drop(self.custom_object_client);

        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("Actor task failed: {:?}", e);
                return Err(format!("Actor task failed: {:?}", e));
            }
        }

        info!("System shutdown complete.");
        Ok(())
    }
}

impl Default for SyncSystem {
    fn default() -> Self {
        Self::new()
    }
}
