//! Entity trait implementation for [`CatalogResource`].
//!
//! Creates build the resource from a resolved draft, updates apply an
//! action list. Both fail with a validation error when the payload is
//! rejected by [`CatalogResource::apply`].

use crate::framework::ActorEntity;
use crate::model::{CatalogResource, ResourceDraft, ResourceKey, UpdateAction};
use async_trait::async_trait;
use std::collections::BTreeSet;

/// Selects catalog resources by kind-qualified key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogFilter {
    pub keys: BTreeSet<ResourceKey>,
}

#[async_trait]
impl ActorEntity for CatalogResource {
    type Id = String;
    type Key = ResourceKey;
    type CreateParams = ResourceDraft;
    type UpdateParams = Vec<UpdateAction>;
    type Filter = CatalogFilter;
    type Context = ();

    fn id(&self) -> String {
        self.id.clone()
    }

    fn key(&self) -> Option<ResourceKey> {
        self.resource_key()
    }

    fn key_of(params: &ResourceDraft) -> Option<ResourceKey> {
        params
            .key
            .as_ref()
            .map(|key| ResourceKey::new(params.kind, key.clone()))
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    fn from_create_params(id: String, params: ResourceDraft) -> Result<Self, String> {
        CatalogResource::from_draft(id, params).map_err(|e| e.to_string())
    }

    fn matches(&self, filter: &CatalogFilter) -> bool {
        self.resource_key()
            .is_some_and(|key| filter.keys.contains(&key))
    }

    /// Applies the action list atomically: the actor discards the copy on error.
    async fn on_update(&mut self, update: Vec<UpdateAction>, _ctx: &()) -> Result<(), String> {
        self.apply(&update).map_err(|e| e.to_string())
    }
}
