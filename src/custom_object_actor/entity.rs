//! Entity trait implementation for [`CustomObject`].

use crate::framework::ActorEntity;
use crate::model::{CustomObject, CustomObjectDraft, CustomObjectKey, CustomObjectQuery};
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
impl ActorEntity for CustomObject {
    type Id = String;
    type Key = CustomObjectKey;
    type CreateParams = CustomObjectDraft;
    type UpdateParams = Value;
    type Filter = CustomObjectQuery;
    type Context = ();

    fn id(&self) -> String {
        self.id.clone()
    }

    fn key(&self) -> Option<CustomObjectKey> {
        Some(CustomObjectKey::new(self.container.clone(), self.key.clone()))
    }

    fn key_of(params: &CustomObjectDraft) -> Option<CustomObjectKey> {
        Some(CustomObjectKey::new(params.container.clone(), params.key.clone()))
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    fn from_create_params(id: String, params: CustomObjectDraft) -> Result<Self, String> {
        if params.container.is_empty() || params.key.is_empty() {
            return Err("container and key must not be empty".to_string());
        }
        Ok(Self {
            id,
            version: 0,
            container: params.container,
            key: params.key,
            value: params.value,
        })
    }

    fn matches(&self, query: &CustomObjectQuery) -> bool {
        if self.container != query.container {
            return false;
        }
        match &query.array_contains {
            None => true,
            Some((pointer, element)) => self
                .value
                .pointer(pointer)
                .and_then(Value::as_array)
                .is_some_and(|items| items.contains(element)),
        }
    }

    async fn on_update(&mut self, update: Value, _ctx: &()) -> Result<(), String> {
        self.value = update;
        Ok(())
    }
}
