//! Type-safe wrappers around [`ResourceClient`](crate::framework::ResourceClient).

pub mod actor_client;
pub mod catalog_client;
pub mod custom_object_client;

pub use actor_client::*;
pub use catalog_client::*;
pub use custom_object_client::*;
