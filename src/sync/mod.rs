//! # Sync
//!
//! The caller-facing side of the engine: [`ReconciliationCoordinator::sync`]
//! takes a batch of drafts and returns [`SyncStatistics`]. Everything that
//! goes wrong for a single draft is a [`SyncError`] handed to the error
//! callback configured in [`SyncOptions`].

pub mod coordinator;
pub mod error;
pub mod options;
pub mod statistics;

pub use coordinator::ReconciliationCoordinator;
pub use error::SyncError;
pub use options::{SyncConfig, SyncOptions, SyncOptionsBuilder};
pub use statistics::{Outcome, StatisticsTracker, SyncStatistics};
