//! # Observability & Tracing
//!
//! [`setup_tracing`] installs a compact `tracing-subscriber` formatter whose
//! level comes from `RUST_LOG`. Module paths are hidden (`with_target(false)`)
//! since every log line already carries the resource key it is about.
//!
//! ## Levels
//!
//! - `info`: store lifecycle, one line per created or updated resource,
//!   drafts parked on missing references, the run summary.
//! - `debug`: cache warming, diff sizes, drain progress, client requests.
//! - `warn`: per-draft failures and store hiccups.
//!
//! ```bash
//! RUST_LOG=info cargo run
//! RUST_LOG=catalog_sync::sync=debug cargo run
//! ```
//!
//! ## Spans
//!
//! Each draft is reconciled inside a `reconcile` span carrying its `key` and
//! the drain `depth`. A draft released by a drain is logged nested under the
//! span of the draft whose creation released it.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}
