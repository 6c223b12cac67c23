use crate::model::draft::{
    AssetDraft, Attribute, CustomFields, LineItemDraft, LocalizedString, PriceDraft,
};
use crate::model::reference::{Reference, ResourceKey, ResourceKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The persisted state of a catalog resource.
///
/// All references held here are by id. `version` grows by one on every
/// accepted update and is the optimistic-concurrency token.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogResource {
    pub id: String,
    pub version: u64,
    pub kind: ResourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default)]
    pub name: LocalizedString,
    #[serde(default)]
    pub slug: LocalizedString,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<LocalizedString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Reference>,
    #[serde(default)]
    pub categories: Vec<Reference>,
    /// Category id → order hint.
    #[serde(default)]
    pub category_order_hints: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<CustomFields>,
    #[serde(default)]
    pub assets: Vec<Asset>,
    #[serde(default)]
    pub variants: Vec<Variant>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
}

impl CatalogResource {
    pub fn resource_key(&self) -> Option<ResourceKey> {
        self.key
            .as_ref()
            .map(|key| ResourceKey::new(self.kind, key.clone()))
    }

    pub fn variant(&self, variant_id: u32) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id == variant_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    #[serde(flatten)]
    pub draft: AssetDraft,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub id: String,
    #[serde(flatten)]
    pub draft: PriceDraft,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: String,
    #[serde(flatten)]
    pub draft: LineItemDraft,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub prices: Vec<Price>,
    #[serde(default)]
    pub assets: Vec<Asset>,
}
