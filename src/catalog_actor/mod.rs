//! The in-memory catalog store: a [`ResourceActor`] over [`CatalogResource`].

pub mod apply;
pub mod entity;
pub mod error;

pub use entity::*;
pub use error::*;

use crate::clients::StoreCatalogClient;
use crate::framework::ResourceActor;
use crate::model::CatalogResource;
use uuid::Uuid;

/// Creates a new catalog store actor and its client.
pub fn new() -> (ResourceActor<CatalogResource>, StoreCatalogClient) {
    let next_id = || Uuid::new_v4().to_string();
    let (actor, generic_client) = ResourceActor::new(64, next_id);
    let client = StoreCatalogClient::new(generic_client);

    (actor, client)
}
