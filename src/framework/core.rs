//! # Core Actor Framework
//!
//! This module defines the generic building blocks the in-process stores are
//! built from.
//!
//! ## Key Types
//!
//! - [`ActorEntity`]: The trait that all stored resource types implement.
//! - [`ResourceActor`]: The generic actor that owns a keyed, versioned collection.
//! - [`ResourceClient`]: The generic client for communicating with actors.
//! - [`FrameworkError`]: Common errors (e.g., ActorClosed, Conflict).

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::hash::Hash;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

// =============================================================================
// 1. THE ABSTRACTION
// =============================================================================

/// Trait that any resource entity must implement to be managed by ResourceActor.
///
/// # Architecture Note
/// Every entity carries a server-assigned `Id`, an optional user-facing `Key`
/// that is unique within the actor, and a `version` used for optimistic
/// concurrency. The actor maintains the key index and the version counter, so
/// entity implementations only describe how to build and mutate themselves.
///
/// # Provided Methods (Hooks)
/// - [`ActorEntity::on_create`]
/// - [`ActorEntity::on_delete`]
///
/// The default implementations do nothing (`Ok(())`).
#[async_trait]
pub trait ActorEntity: Clone + Send + Sync + 'static {
    /// The unique identifier for this entity.
    type Id: Eq + Hash + Clone + Send + Sync + Display + Debug;

    /// The user-facing key, unique among entities of one actor.
    type Key: Eq + Hash + Clone + Send + Sync + Display + Debug;

    /// The data required to create a new instance.
    type CreateParams: Send + Sync + Debug;

    /// The data required to update an existing instance.
    type UpdateParams: Send + Sync + Debug;

    /// Selection criteria for [`ResourceRequest::Query`].
    type Filter: Send + Sync + Debug;

    /// The runtime context (dependencies) injected into the actor.
    /// Use `()` if no dependencies are needed.
    type Context: Send + Sync;

    fn id(&self) -> Self::Id;

    fn key(&self) -> Option<Self::Key>;

    /// The key a create payload will claim, checked before the entity is built.
    fn key_of(params: &Self::CreateParams) -> Option<Self::Key>;

    fn version(&self) -> u64;

    fn set_version(&mut self, version: u64);

    /// Construct the full Entity from the ID and Payload.
    fn from_create_params(id: Self::Id, params: Self::CreateParams) -> Result<Self, String>;

    fn matches(&self, filter: &Self::Filter) -> bool;

    // --- Lifecycle Hooks (Async) ---

    async fn on_create(&mut self, _ctx: &Self::Context) -> Result<(), String> {
        Ok(())
    }

    /// Applies an update. The actor calls this on a copy and only commits the
    /// copy when the hook succeeds.
    async fn on_update(&mut self, update: Self::UpdateParams, ctx: &Self::Context) -> Result<(), String>;

    async fn on_delete(&self, _ctx: &Self::Context) -> Result<(), String> {
        Ok(())
    }
}

// =============================================================================
// 2. THE GENERIC MESSAGES & ERRORS
// =============================================================================

/// Errors that can occur within the actor framework itself.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum FrameworkError {
    #[error("Actor closed")]
    ActorClosed,
    #[error("Actor dropped response channel")]
    ActorDropped,
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Version conflict on {id}: expected {expected}, current {current}")]
    Conflict { id: String, expected: u64, current: u64 },
    #[error("Key already in use: {0}")]
    DuplicateKey(String),
    #[error("Validation failed: {0}")]
    Validation(String),
}

/// Type alias for the one-shot response channel used by actors.
pub type Response<T> = oneshot::Sender<Result<T, FrameworkError>>;

/// Internal message type sent to the actor to request operations.
///
/// The variants are the lifecycle of a keyed, versioned resource:
///
/// - **Create**: Builds a new entity. Fails with `DuplicateKey` if the key is taken.
/// - **Get / GetByKey**: Reads the current state.
/// - **Update**: Applies [`ActorEntity::UpdateParams`] if `version` is current.
/// - **Upsert**: Replaces the entity holding the payload's key, or creates it.
/// - **Delete**: Removes the entity.
/// - **Query**: Returns every entity matching a filter.
#[derive(Debug)]
pub enum ResourceRequest<T: ActorEntity> {
    Create {
        params: T::CreateParams,
        respond_to: Response<T>,
    },
    Get {
        id: T::Id,
        respond_to: Response<Option<T>>,
    },
    GetByKey {
        key: T::Key,
        respond_to: Response<Option<T>>,
    },
    Update {
        id: T::Id,
        version: u64,
        update: T::UpdateParams,
        respond_to: Response<T>,
    },
    Upsert {
        params: T::CreateParams,
        respond_to: Response<T>,
    },
    Delete {
        id: T::Id,
        respond_to: Response<T>,
    },
    Query {
        filter: T::Filter,
        respond_to: Response<Vec<T>>,
    },
}

// =============================================================================
// 3. THE GENERIC ACTOR SERVER
// =============================================================================

/// The generic actor that manages a collection of entities.
///
/// **Concurrency Model**:
/// Each actor processes its messages sequentially, so every request is atomic
/// with respect to the others. Version checks and key uniqueness need no locks.
pub struct ResourceActor<T: ActorEntity> {
    receiver: mpsc::Receiver<ResourceRequest<T>>,
    store: HashMap<T::Id, T>,
    keys: HashMap<T::Key, T::Id>,
    next_id_fn: Box<dyn Fn() -> T::Id + Send + Sync>,
}

impl<T: ActorEntity> ResourceActor<T> {
    pub fn new(
        buffer_size: usize,
        next_id_fn: impl Fn() -> T::Id + Send + Sync + 'static,
    ) -> (Self, ResourceClient<T>) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let actor = Self {
            receiver,
            store: HashMap::new(),
            keys: HashMap::new(),
            next_id_fn: Box::new(next_id_fn),
        };
        let client = ResourceClient::new(sender);
        (actor, client)
    }

    /// Runs the actor's event loop, processing messages until the channel closes.
    pub async fn run(mut self, context: T::Context) {
        let entity_type = std::any::type_name::<T>()
            .split("::")
            .last()
            .unwrap_or("Unknown");
        info!(entity_type, "Actor started");

        while let Some(msg) = self.receiver.recv().await {
            match msg {
                ResourceRequest::Create { params, respond_to } => {
                    debug!(entity_type, ?params, "Create");
                    if let Some(key) = T::key_of(&params).filter(|k| self.keys.contains_key(k)) {
                        warn!(entity_type, %key, "Key already in use");
                        let _ = respond_to.send(Err(FrameworkError::DuplicateKey(key.to_string())));
                        continue;
                    }
                    let id = (self.next_id_fn)();
                    let result = self.insert_new(id.clone(), params, &context).await;
                    match &result {
                        Ok(_) => info!(entity_type, %id, size = self.store.len(), "Created"),
                        Err(e) => warn!(entity_type, error = %e, "Create failed"),
                    }
                    let _ = respond_to.send(result);
                }
                ResourceRequest::Get { id, respond_to } => {
                    let item = self.store.get(&id).cloned();
                    debug!(entity_type, %id, found = item.is_some(), "Get");
                    let _ = respond_to.send(Ok(item));
                }
                ResourceRequest::GetByKey { key, respond_to } => {
                    let item = self.keys.get(&key).and_then(|id| self.store.get(id)).cloned();
                    debug!(entity_type, %key, found = item.is_some(), "GetByKey");
                    let _ = respond_to.send(Ok(item));
                }
                ResourceRequest::Update { id, version, update, respond_to } => {
                    debug!(entity_type, %id, version, ?update, "Update");
                    let result = self.update(&id, version, update, &context).await;
                    match &result {
                        Ok(item) => info!(entity_type, %id, version = item.version(), "Updated"),
                        Err(e) => warn!(entity_type, %id, error = %e, "Update failed"),
                    }
                    let _ = respond_to.send(result);
                }
                ResourceRequest::Upsert { params, respond_to } => {
                    debug!(entity_type, ?params, "Upsert");
                    let existing = T::key_of(&params).and_then(|k| self.keys.get(&k).cloned());
                    let result = match existing {
                        Some(id) => self.replace(id, params, &context).await,
                        None => {
                            let id = (self.next_id_fn)();
                            self.insert_new(id, params, &context).await
                        }
                    };
                    match &result {
                        Ok(item) => info!(entity_type, version = item.version(), size = self.store.len(), "Upserted"),
                        Err(e) => warn!(entity_type, error = %e, "Upsert failed"),
                    }
                    let _ = respond_to.send(result);
                }
                ResourceRequest::Delete { id, respond_to } => {
                    debug!(entity_type, %id, "Delete");
                    let result = self.delete(&id, &context).await;
                    match &result {
                        Ok(_) => info!(entity_type, %id, size = self.store.len(), "Deleted"),
                        Err(e) => warn!(entity_type, %id, error = %e, "Delete failed"),
                    }
                    let _ = respond_to.send(result);
                }
                ResourceRequest::Query { filter, respond_to } => {
                    let items: Vec<T> = self
                        .store
                        .values()
                        .filter(|item| item.matches(&filter))
                        .cloned()
                        .collect();
                    debug!(entity_type, ?filter, matched = items.len(), "Query");
                    let _ = respond_to.send(Ok(items));
                }
            }
        }

        info!(entity_type, size = self.store.len(), "Shutdown");
    }

    async fn insert_new(
        &mut self,
        id: T::Id,
        params: T::CreateParams,
        context: &T::Context,
    ) -> Result<T, FrameworkError> {
        let mut item = T::from_create_params(id.clone(), params).map_err(FrameworkError::Validation)?;
        item.on_create(context).await.map_err(FrameworkError::Validation)?;
        item.set_version(1);
        if let Some(key) = item.key() {
            self.keys.insert(key, id.clone());
        }
        self.store.insert(id, item.clone());
        Ok(item)
    }

    async fn replace(
        &mut self,
        id: T::Id,
        params: T::CreateParams,
        context: &T::Context,
    ) -> Result<T, FrameworkError> {
        let current = self
            .store
            .get(&id)
            .map(|item| item.version())
            .ok_or_else(|| FrameworkError::NotFound(id.to_string()))?;
        let mut item = T::from_create_params(id.clone(), params).map_err(FrameworkError::Validation)?;
        item.on_create(context).await.map_err(FrameworkError::Validation)?;
        item.set_version(current + 1);
        self.store.insert(id, item.clone());
        Ok(item)
    }

    async fn update(
        &mut self,
        id: &T::Id,
        version: u64,
        update: T::UpdateParams,
        context: &T::Context,
    ) -> Result<T, FrameworkError> {
        let item = self
            .store
            .get(id)
            .ok_or_else(|| FrameworkError::NotFound(id.to_string()))?;
        if item.version() != version {
            return Err(FrameworkError::Conflict {
                id: id.to_string(),
                expected: version,
                current: item.version(),
            });
        }
        let old_key = item.key();
        let mut candidate = item.clone();
        candidate
            .on_update(update, context)
            .await
            .map_err(FrameworkError::Validation)?;
        candidate.set_version(version + 1);

        let new_key = candidate.key();
        if new_key != old_key {
            if let Some(key) = new_key.as_ref().filter(|k| self.keys.contains_key(*k)) {
                return Err(FrameworkError::DuplicateKey(key.to_string()));
            }
            if let Some(key) = old_key {
                self.keys.remove(&key);
            }
            if let Some(key) = new_key {
                self.keys.insert(key, id.clone());
            }
        }
        self.store.insert(id.clone(), candidate.clone());
        Ok(candidate)
    }

    async fn delete(&mut self, id: &T::Id, context: &T::Context) -> Result<T, FrameworkError> {
        let item = self
            .store
            .get(id)
            .ok_or_else(|| FrameworkError::NotFound(id.to_string()))?;
        item.on_delete(context).await.map_err(FrameworkError::Validation)?;
        if let Some(key) = item.key() {
            self.keys.remove(&key);
        }
        self.store
            .remove(id)
            .ok_or_else(|| FrameworkError::NotFound(id.to_string()))
    }
}

// =============================================================================
// 4. THE GENERIC CLIENT
// =============================================================================

/// A type-safe client for interacting with a `ResourceActor`.
pub struct ResourceClient<T: ActorEntity> {
    sender: mpsc::Sender<ResourceRequest<T>>,
}

impl<T: ActorEntity> Clone for ResourceClient<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<T: ActorEntity> ResourceClient<T> {
    pub fn new(sender: mpsc::Sender<ResourceRequest<T>>) -> Self {
        Self { sender }
    }

    async fn request<R>(
        &self,
        build: impl FnOnce(Response<R>) -> ResourceRequest<T>,
    ) -> Result<R, FrameworkError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(build(respond_to))
            .await
            .map_err(|_| FrameworkError::ActorClosed)?;
        response.await.map_err(|_| FrameworkError::ActorDropped)?
    }

    pub async fn create(&self, params: T::CreateParams) -> Result<T, FrameworkError> {
        self.request(|respond_to| ResourceRequest::Create { params, respond_to })
            .await
    }

    pub async fn get(&self, id: T::Id) -> Result<Option<T>, FrameworkError> {
        self.request(|respond_to| ResourceRequest::Get { id, respond_to })
            .await
    }

    pub async fn get_by_key(&self, key: T::Key) -> Result<Option<T>, FrameworkError> {
        self.request(|respond_to| ResourceRequest::GetByKey { key, respond_to })
            .await
    }

    pub async fn update(
        &self,
        id: T::Id,
        version: u64,
        update: T::UpdateParams,
    ) -> Result<T, FrameworkError> {
        self.request(|respond_to| ResourceRequest::Update {
            id,
            version,
            update,
            respond_to,
        })
        .await
    }

    pub async fn upsert(&self, params: T::CreateParams) -> Result<T, FrameworkError> {
        self.request(|respond_to| ResourceRequest::Upsert { params, respond_to })
            .await
    }

    pub async fn delete(&self, id: T::Id) -> Result<T, FrameworkError> {
        self.request(|respond_to| ResourceRequest::Delete { id, respond_to })
            .await
    }

    pub async fn query(&self, filter: T::Filter) -> Result<Vec<T>, FrameworkError> {
        self.request(|respond_to| ResourceRequest::Query { filter, respond_to })
            .await
    }
}
