//! Plain data: drafts, persisted resources, references and update actions.

pub mod action;
pub mod custom_object;
pub mod draft;
pub mod reference;
pub mod resource;

pub use action::*;
pub use custom_object::*;
pub use draft::*;
pub use reference::*;
pub use resource::*;
