use crate::model::draft::{
    visit_custom, AssetDraft, AssetSource, AttributeValue, LineItemDraft, LocalizedString, Money,
    PriceDraft, VariantDraft,
};
use crate::model::reference::Reference;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One atomic mutation sent to the target store.
///
/// Lists of actions are applied in order. Removing a custom type is a
/// `Set*CustomType` with `type_ref: None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum UpdateAction {
    ChangeName {
        name: LocalizedString,
    },
    ChangeSlug {
        slug: LocalizedString,
    },
    SetDescription {
        description: Option<LocalizedString>,
    },
    ChangeParent {
        parent: Option<Reference>,
    },
    AddToCategory {
        category: Reference,
    },
    RemoveFromCategory {
        category: Reference,
    },
    SetCategoryOrderHint {
        category_id: String,
        order_hint: Option<String>,
    },
    SetCustomType {
        type_ref: Option<Reference>,
        fields: BTreeMap<String, Value>,
    },
    SetCustomField {
        name: String,
        value: Option<Value>,
    },
    AddAsset {
        variant_id: Option<u32>,
        asset: AssetDraft,
    },
    RemoveAsset {
        variant_id: Option<u32>,
        asset_key: String,
    },
    ChangeAssetOrder {
        variant_id: Option<u32>,
        asset_keys: Vec<String>,
    },
    ChangeAssetName {
        variant_id: Option<u32>,
        asset_key: String,
        name: LocalizedString,
    },
    SetAssetDescription {
        variant_id: Option<u32>,
        asset_key: String,
        description: Option<LocalizedString>,
    },
    SetAssetSources {
        variant_id: Option<u32>,
        asset_key: String,
        sources: Vec<AssetSource>,
    },
    SetAssetTags {
        variant_id: Option<u32>,
        asset_key: String,
        tags: Vec<String>,
    },
    SetAssetCustomType {
        variant_id: Option<u32>,
        asset_key: String,
        type_ref: Option<Reference>,
        fields: BTreeMap<String, Value>,
    },
    SetAssetCustomField {
        variant_id: Option<u32>,
        asset_key: String,
        name: String,
        value: Option<Value>,
    },
    AddVariant {
        variant: VariantDraft,
    },
    RemoveVariant {
        variant_id: u32,
    },
    SetSku {
        variant_id: u32,
        sku: Option<String>,
    },
    SetAttribute {
        variant_id: u32,
        name: String,
        value: Option<AttributeValue>,
    },
    AddPrice {
        variant_id: u32,
        price: PriceDraft,
    },
    RemovePrice {
        price_id: String,
    },
    ChangePrice {
        price_id: String,
        price: PriceDraft,
    },
    ChangePriceValue {
        price_id: String,
        value: Money,
    },
    SetPriceCustomType {
        price_id: String,
        type_ref: Option<Reference>,
        fields: BTreeMap<String, Value>,
    },
    SetPriceCustomField {
        price_id: String,
        name: String,
        value: Option<Value>,
    },
    AddLineItem {
        line_item: LineItemDraft,
    },
    RemoveLineItem {
        line_item_id: String,
    },
    ChangeLineItemQuantity {
        line_item_id: String,
        quantity: u64,
    },
    SetLineItemCustomType {
        line_item_id: String,
        type_ref: Option<Reference>,
        fields: BTreeMap<String, Value>,
    },
    SetLineItemCustomField {
        line_item_id: String,
        name: String,
        value: Option<Value>,
    },
}

impl UpdateAction {
    /// Visits every reference carried by this action.
    pub fn for_each_reference_mut(&mut self, f: &mut impl FnMut(&mut Reference)) {
        match self {
            UpdateAction::ChangeParent { parent: Some(r) }
            | UpdateAction::AddToCategory { category: r }
            | UpdateAction::RemoveFromCategory { category: r }
            | UpdateAction::SetCustomType { type_ref: Some(r), .. }
            | UpdateAction::SetAssetCustomType { type_ref: Some(r), .. }
            | UpdateAction::SetPriceCustomType { type_ref: Some(r), .. }
            | UpdateAction::SetLineItemCustomType { type_ref: Some(r), .. } => f(r),
            UpdateAction::AddAsset { asset, .. } => asset.for_each_reference_mut(f),
            UpdateAction::AddVariant { variant } => variant.for_each_reference_mut(f),
            UpdateAction::SetAttribute { value: Some(value), .. } => value.for_each_reference_mut(f),
            UpdateAction::AddPrice { price, .. } | UpdateAction::ChangePrice { price, .. } => {
                price.for_each_reference_mut(f)
            }
            UpdateAction::AddLineItem { line_item } => visit_custom(&mut line_item.custom, f),
            _ => {}
        }
    }

    /// The action name as it appears on the wire.
    pub fn name(&self) -> String {
        serde_json::to_value(self)
            .ok()
            .and_then(|v| v.get("action").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::reference::ResourceKind;
    use serde_json::json;

    #[test]
    fn test_action_wire_format() {
        let action = UpdateAction::ChangePriceValue {
            price_id: "p-1".into(),
            value: Money::new("EUR", 2500),
        };
        assert_eq!(
            serde_json::to_value(&action).unwrap(),
            json!({
                "action": "changePriceValue",
                "priceId": "p-1",
                "value": { "currencyCode": "EUR", "centAmount": 2500 }
            })
        );
        assert_eq!(action.name(), "changePriceValue");
    }

    #[test]
    fn test_action_reference_walk() {
        let mut action = UpdateAction::AddToCategory {
            category: Reference::by_key(ResourceKind::Category, "shoes"),
        };
        let mut keys = Vec::new();
        action.for_each_reference_mut(&mut |r| keys.extend(r.unresolved_key()));
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].key, "shoes");
    }
}
