//! Custom-object store: schemaless JSON documents grouped in containers.
//!
//! The unresolved-reference store keeps its waiting drafts here.

pub mod entity;

use crate::clients::CustomObjectClient;
use crate::framework::ResourceActor;
use crate::model::CustomObject;
use uuid::Uuid;

/// Creates a new custom-object actor and its client.
pub fn new() -> (ResourceActor<CustomObject>, CustomObjectClient) {
    let next_id = || Uuid::new_v4().to_string();
    let (actor, generic_client) = ResourceActor::new(64, next_id);
    let client = CustomObjectClient::new(generic_client);

    (actor, client)
}
