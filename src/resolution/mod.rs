//! # Reference Resolution
//!
//! Drafts name other resources by key. Before a draft can be diffed every
//! such key must be translated to an id through the [`KeyValueCache`]. A
//! draft with keys the cache cannot translate is parked in an
//! [`UnresolvedReferenceStore`] as a [`WaitingEntry`] until the resources
//! behind those keys exist.
//!
//! Two stores are provided:
//!
//! - [`CustomObjectReferenceStore`] keeps entries in the custom-object
//!   service, one container per resource kind.
//! - [`FileReferenceStore`] keeps one JSON file per entry on local disk.

pub mod cache;
pub mod custom_object_store;
pub mod file_store;
pub mod resolver;
pub mod store;

pub use cache::KeyValueCache;
pub use custom_object_store::CustomObjectReferenceStore;
pub use file_store::FileReferenceStore;
pub use resolver::ReferenceResolver;
pub use store::{CleanupStatistics, StoreError, UnresolvedReferenceStore, WaitingEntry};
