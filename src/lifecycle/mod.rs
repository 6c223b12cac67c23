//! Runtime wiring.
//!
//! - [`SyncSystem`] starts the in-memory stores and hands out coordinators
//! - [`setup_tracing`] initializes logging

pub mod system;
pub mod tracing;

pub use system::*;
pub use tracing::*;
