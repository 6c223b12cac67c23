//! # Catalog Sync
//!
//! > **Reconcile catalog drafts into a live store with minimal update actions.**
//!
//! Integrators hand this crate batches of *drafts* (desired state for products,
//! categories, shopping lists and their variants, prices, assets, line items
//! and custom fields). For each draft the crate works out the shortest ordered
//! list of update actions that makes the stored resource match, writes it with
//! optimistic concurrency, and keeps drafts whose references point at
//! resources that do not exist yet until those resources show up.
//!
//! ## 🏗️ How a Draft Flows
//!
//! 1. **Resolve**: every reference by key is translated to an id through the
//!    [`KeyValueCache`](resolution::KeyValueCache). Missing keys park the draft
//!    in an [`UnresolvedReferenceStore`](resolution::UnresolvedReferenceStore).
//! 2. **Diff**: the [`DiffEngine`](diff::DiffEngine) compares the stored
//!    resource with the resolved draft.
//! 3. **Write**: create or update. A version conflict re-fetches and re-diffs,
//!    up to a fixed number of times.
//! 4. **Drain**: the new key may be what parked drafts were waiting for, so
//!    they are re-submitted.
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. The Engine ([`diff`], [`resolution`], [`sync`])
//! - [`diff`]: pure old-vs-new comparison, including the per-owner custom-field
//!   strategies.
//! - [`resolution`]: the key cache, the resolver and the waiting-draft stores.
//! - [`sync`]: the [`ReconciliationCoordinator`](sync::ReconciliationCoordinator),
//!   its options, callbacks and statistics.
//!
//! ### 2. The Data ([`model`])
//! Plain serde types: drafts, stored resources, references, update actions.
//!
//! ### 3. The Backend ([`framework`], [`catalog_actor`], [`custom_object_actor`], [`clients`])
//! An in-process stand-in for the remote catalog API, built as actors on the
//! generic `ResourceActor<T>`. The coordinator only sees the
//! [`CatalogClient`](clients::CatalogClient) trait, so a real HTTP client can
//! take its place.
//!
//! ### 4. The Orchestrator ([`lifecycle`])
//! Starts the stores, hands out coordinators and sets up tracing.
//!
//! ## 🚀 Quick Start
//!
//! ```bash
//! RUST_LOG=info cargo run
//! cargo test
//! ```

pub mod catalog_actor;
pub mod clients;
pub mod custom_object_actor;
pub mod diff;
pub mod framework;
pub mod lifecycle;
pub mod model;
pub mod resolution;
pub mod sync;
