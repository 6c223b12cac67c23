//! Error types for the catalog store.

use thiserror::Error;

/// Reasons the catalog store rejects a create payload or an action list.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApplyError {
    /// The payload still carries a reference by key.
    #[error("Reference {0} is not resolved to an id")]
    UnresolvedReference(String),

    #[error("Variant not found: {0}")]
    VariantNotFound(u32),

    #[error("Price not found: {0}")]
    PriceNotFound(String),

    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    #[error("Asset key already in use: {0}")]
    DuplicateAsset(String),

    #[error("Line item not found: {0}")]
    LineItemNotFound(String),

    #[error("Category {0} is not assigned")]
    CategoryNotAssigned(String),

    #[error("Cannot set custom field {0} without a custom type")]
    NoCustomType(String),

    #[error("Asset order must list every asset exactly once")]
    InvalidAssetOrder,
}
