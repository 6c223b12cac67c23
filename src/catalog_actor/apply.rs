//! Building resources from drafts and applying update actions to them.
//!
//! This is what the in-memory catalog store runs on create and update. It
//! plays the role of the remote API: it only accepts references by id and
//! rejects actions that address sub-objects that do not exist.

use crate::catalog_actor::error::ApplyError;
use crate::model::{
    Asset, AssetDraft, Attribute, CatalogResource, CustomFields, LineItem, LineItemDraft, Price, Reference,
    ResourceDraft, UpdateAction, Variant, VariantDraft,
};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn first_unresolved(visit: impl FnOnce(&mut dyn FnMut(&mut Reference))) -> Result<(), ApplyError> {
    let mut unresolved = None;
    visit(&mut |reference: &mut Reference| {
        if unresolved.is_none() && !reference.is_resolved() {
            unresolved = Some(reference.to_string());
        }
    });
    match unresolved {
        Some(reference) => Err(ApplyError::UnresolvedReference(reference)),
        None => Ok(()),
    }
}

fn reference_id(reference: &Reference) -> Result<String, ApplyError> {
    reference
        .id()
        .map(str::to_string)
        .ok_or_else(|| ApplyError::UnresolvedReference(reference.to_string()))
}

fn to_asset(draft: AssetDraft, existing: &[Asset]) -> Result<Asset, ApplyError> {
    if let Some(key) = draft.key.as_ref() {
        if existing.iter().any(|a| a.draft.key.as_ref() == Some(key)) {
            return Err(ApplyError::DuplicateAsset(key.clone()));
        }
    }
    Ok(Asset {
        id: new_id(),
        draft,
    })
}

fn to_assets(drafts: Vec<AssetDraft>) -> Result<Vec<Asset>, ApplyError> {
    let mut assets = Vec::with_capacity(drafts.len());
    for draft in drafts {
        let asset = to_asset(draft, &assets)?;
        assets.push(asset);
    }
    Ok(assets)
}

fn to_line_item(mut draft: LineItemDraft) -> LineItem {
    draft.quantity = Some(draft.effective_quantity());
    LineItem {
        id: new_id(),
        draft,
    }
}

fn set_custom_field(
    custom: &mut Option<CustomFields>,
    name: &str,
    value: &Option<Value>,
) -> Result<(), ApplyError> {
    let custom = custom
        .as_mut()
        .ok_or_else(|| ApplyError::NoCustomType(name.to_string()))?;
    match value {
        Some(value) => {
            custom.fields.insert(name.to_string(), value.clone());
        }
        None => {
            custom.fields.remove(name);
        }
    }
    Ok(())
}

fn custom_from(type_ref: &Option<Reference>, fields: &BTreeMap<String, Value>) -> Option<CustomFields> {
    type_ref.as_ref().map(|type_ref| CustomFields {
        type_ref: type_ref.clone(),
        fields: fields.clone(),
    })
}

impl CatalogResource {
    /// Builds a fresh resource at version 0 from a fully resolved draft.
    ///
    /// Duplicate category references are collapsed. Sub-objects get new ids.
    pub fn from_draft(id: String, mut draft: ResourceDraft) -> Result<Self, ApplyError> {
        first_unresolved(|f| draft.for_each_reference_mut(&mut |r: &mut Reference| f(r)))?;

        let mut categories: Vec<Reference> = Vec::with_capacity(draft.categories.len());
        for category in draft.categories {
            if !categories.contains(&category) {
                categories.push(category);
            }
        }
        let mut category_order_hints = BTreeMap::new();
        for hint in draft.category_order_hints {
            category_order_hints.insert(reference_id(&hint.category)?, hint.hint);
        }

        let mut resource = CatalogResource {
            id,
            version: 0,
            kind: draft.kind,
            key: draft.key,
            name: draft.name,
            slug: draft.slug,
            description: draft.description,
            parent: draft.parent,
            categories,
            category_order_hints,
            custom: draft.custom,
            assets: to_assets(draft.assets)?,
            variants: Vec::new(),
            line_items: draft.line_items.into_iter().map(to_line_item).collect(),
        };
        for variant in draft.variants {
            resource.push_variant(variant)?;
        }
        Ok(resource)
    }

    /// Applies `actions` in order. Nothing is rolled back on error; callers
    /// that need atomicity apply to a copy.
    pub fn apply(&mut self, actions: &[UpdateAction]) -> Result<(), ApplyError> {
        for action in actions {
            let mut checked = action.clone();
            first_unresolved(|f| checked.for_each_reference_mut(&mut |r: &mut Reference| f(r)))?;
            self.apply_one(action)?;
        }
        Ok(())
    }

    fn apply_one(&mut self, action: &UpdateAction) -> Result<(), ApplyError> {
        match action {
            UpdateAction::ChangeName { name } => self.name = name.clone(),
            UpdateAction::ChangeSlug { slug } => self.slug = slug.clone(),
            UpdateAction::SetDescription { description } => self.description = description.clone(),
            UpdateAction::ChangeParent { parent } => self.parent = parent.clone(),
            UpdateAction::AddToCategory { category } => {
                if !self.categories.contains(category) {
                    self.categories.push(category.clone());
                }
            }
            UpdateAction::RemoveFromCategory { category } => {
                let id = reference_id(category)?;
                let position = self
                    .categories
                    .iter()
                    .position(|c| c.id() == Some(id.as_str()))
                    .ok_or_else(|| ApplyError::CategoryNotAssigned(id.clone()))?;
                self.categories.remove(position);
                self.category_order_hints.remove(&id);
            }
            UpdateAction::SetCategoryOrderHint { category_id, order_hint } => match order_hint {
                Some(hint) => {
                    self.category_order_hints.insert(category_id.clone(), hint.clone());
                }
                None => {
                    self.category_order_hints.remove(category_id);
                }
            },
            UpdateAction::SetCustomType { type_ref, fields } => self.custom = custom_from(type_ref, fields),
            UpdateAction::SetCustomField { name, value } => set_custom_field(&mut self.custom, name, value)?,
            UpdateAction::AddAsset { variant_id, asset } => {
                let assets = self.assets_mut(*variant_id)?;
                let asset = to_asset(asset.clone(), assets)?;
                assets.push(asset);
            }
            UpdateAction::RemoveAsset { variant_id, asset_key } => {
                let assets = self.assets_mut(*variant_id)?;
                let position = assets
                    .iter()
                    .position(|a| a.draft.key.as_ref() == Some(asset_key))
                    .ok_or_else(|| ApplyError::AssetNotFound(asset_key.clone()))?;
                assets.remove(position);
            }
            UpdateAction::ChangeAssetOrder { variant_id, asset_keys } => {
                let assets = self.assets_mut(*variant_id)?;
                let unique: HashSet<&String> = asset_keys.iter().collect();
                let known = asset_keys
                    .iter()
                    .all(|key| assets.iter().any(|a| a.draft.key.as_ref() == Some(key)));
                if unique.len() != asset_keys.len() || !known {
                    return Err(ApplyError::InvalidAssetOrder);
                }
                // Listed assets first, in the given order. The rest keep their relative order.
                let mut remaining = std::mem::take(assets);
                for key in asset_keys {
                    if let Some(position) = remaining.iter().position(|a| a.draft.key.as_ref() == Some(key)) {
                        assets.push(remaining.remove(position));
                    }
                }
                assets.append(&mut remaining);
            }
            UpdateAction::ChangeAssetName { variant_id, asset_key, name } => {
                self.asset_mut(*variant_id, asset_key)?.draft.name = name.clone();
            }
            UpdateAction::SetAssetDescription { variant_id, asset_key, description } => {
                self.asset_mut(*variant_id, asset_key)?.draft.description = description.clone();
            }
            UpdateAction::SetAssetSources { variant_id, asset_key, sources } => {
                self.asset_mut(*variant_id, asset_key)?.draft.sources = sources.clone();
            }
            UpdateAction::SetAssetTags { variant_id, asset_key, tags } => {
                self.asset_mut(*variant_id, asset_key)?.draft.tags = tags.clone();
            }
            UpdateAction::SetAssetCustomType { variant_id, asset_key, type_ref, fields } => {
                self.asset_mut(*variant_id, asset_key)?.draft.custom = custom_from(type_ref, fields);
            }
            UpdateAction::SetAssetCustomField { variant_id, asset_key, name, value } => {
                let asset = self.asset_mut(*variant_id, asset_key)?;
                set_custom_field(&mut asset.draft.custom, name, value)?;
            }
            UpdateAction::AddVariant { variant } => self.push_variant(variant.clone())?,
            UpdateAction::RemoveVariant { variant_id } => {
                let position = self
                    .variants
                    .iter()
                    .position(|v| v.id == *variant_id)
                    .ok_or(ApplyError::VariantNotFound(*variant_id))?;
                self.variants.remove(position);
            }
            UpdateAction::SetSku { variant_id, sku } => self.variant_mut(*variant_id)?.sku = sku.clone(),
            UpdateAction::SetAttribute { variant_id, name, value } => {
                let attributes = &mut self.variant_mut(*variant_id)?.attributes;
                let position = attributes.iter().position(|a| &a.name == name);
                match (value, position) {
                    (Some(value), Some(position)) => attributes[position].value = value.clone(),
                    (Some(value), None) => attributes.push(Attribute::new(name, value.clone())),
                    (None, Some(position)) => {
                        attributes.remove(position);
                    }
                    (None, None) => {}
                }
            }
            UpdateAction::AddPrice { variant_id, price } => {
                self.variant_mut(*variant_id)?.prices.push(Price {
                    id: new_id(),
                    draft: price.clone(),
                });
            }
            UpdateAction::RemovePrice { price_id } => {
                let variant = self
                    .variants
                    .iter_mut()
                    .find(|v| v.prices.iter().any(|p| &p.id == price_id))
                    .ok_or_else(|| ApplyError::PriceNotFound(price_id.clone()))?;
                variant.prices.retain(|p| &p.id != price_id);
            }
            UpdateAction::ChangePrice { price_id, price } => self.price_mut(price_id)?.draft = price.clone(),
            UpdateAction::ChangePriceValue { price_id, value } => {
                self.price_mut(price_id)?.draft.value = value.clone();
            }
            UpdateAction::SetPriceCustomType { price_id, type_ref, fields } => {
                self.price_mut(price_id)?.draft.custom = custom_from(type_ref, fields);
            }
            UpdateAction::SetPriceCustomField { price_id, name, value } => {
                set_custom_field(&mut self.price_mut(price_id)?.draft.custom, name, value)?;
            }
            UpdateAction::AddLineItem { line_item } => self.line_items.push(to_line_item(line_item.clone())),
            UpdateAction::RemoveLineItem { line_item_id } => {
                let position = self
                    .line_items
                    .iter()
                    .position(|l| &l.id == line_item_id)
                    .ok_or_else(|| ApplyError::LineItemNotFound(line_item_id.clone()))?;
                self.line_items.remove(position);
            }
            UpdateAction::ChangeLineItemQuantity { line_item_id, quantity } => {
                self.line_item_mut(line_item_id)?.draft.quantity = Some(*quantity);
            }
            UpdateAction::SetLineItemCustomType { line_item_id, type_ref, fields } => {
                self.line_item_mut(line_item_id)?.draft.custom = custom_from(type_ref, fields);
            }
            UpdateAction::SetLineItemCustomField { line_item_id, name, value } => {
                set_custom_field(&mut self.line_item_mut(line_item_id)?.draft.custom, name, value)?;
            }
        }
        Ok(())
    }

    fn push_variant(&mut self, draft: VariantDraft) -> Result<(), ApplyError> {
        let id = self.variants.iter().map(|v| v.id).max().unwrap_or(0) + 1;
        let variant = Variant {
            id,
            key: draft.key,
            sku: draft.sku,
            attributes: draft.attributes,
            prices: draft
                .prices
                .into_iter()
                .map(|draft| Price { id: new_id(), draft })
                .collect(),
            assets: to_assets(draft.assets)?,
        };
        self.variants.push(variant);
        Ok(())
    }

    fn variant_mut(&mut self, variant_id: u32) -> Result<&mut Variant, ApplyError> {
        self.variants
            .iter_mut()
            .find(|v| v.id == variant_id)
            .ok_or(ApplyError::VariantNotFound(variant_id))
    }

    fn assets_mut(&mut self, variant_id: Option<u32>) -> Result<&mut Vec<Asset>, ApplyError> {
        match variant_id {
            Some(variant_id) => Ok(&mut self.variant_mut(variant_id)?.assets),
            None => Ok(&mut self.assets),
        }
    }

    fn asset_mut(&mut self, variant_id: Option<u32>, asset_key: &str) -> Result<&mut Asset, ApplyError> {
        self.assets_mut(variant_id)?
            .iter_mut()
            .find(|a| a.draft.key.as_deref() == Some(asset_key))
            .ok_or_else(|| ApplyError::AssetNotFound(asset_key.to_string()))
    }

    fn price_mut(&mut self, price_id: &str) -> Result<&mut Price, ApplyError> {
        self.variants
            .iter_mut()
            .flat_map(|v| v.prices.iter_mut())
            .find(|p| p.id == price_id)
            .ok_or_else(|| ApplyError::PriceNotFound(price_id.to_string()))
    }

    fn line_item_mut(&mut self, line_item_id: &str) -> Result<&mut LineItem, ApplyError> {
        self.line_items
            .iter_mut()
            .find(|l| l.id == line_item_id)
            .ok_or_else(|| ApplyError::LineItemNotFound(line_item_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{localized, Money, PriceDraft, ResourceKind};

    fn resolved_product() -> ResourceDraft {
        ResourceDraft::new(ResourceKind::Product, "prod-A")
            .with_name("en", "Shirt")
            .with_category(Reference::by_id(ResourceKind::Category, "cat-1"))
            .with_category(Reference::by_id(ResourceKind::Category, "cat-1"))
            .with_variant(VariantDraft::new("v1").with_price(PriceDraft::new(Money::new("EUR", 100))))
            .with_variant(VariantDraft::new("v2"))
    }

    #[test]
    fn test_from_draft_assigns_ids_and_collapses_categories() {
        let resource = CatalogResource::from_draft("r-1".into(), resolved_product()).unwrap();
        assert_eq!(resource.categories.len(), 1);
        assert_eq!(resource.variants.iter().map(|v| v.id).collect::<Vec<_>>(), vec![1, 2]);
        assert!(!resource.variants[0].prices[0].id.is_empty());
    }

    #[test]
    fn test_from_draft_rejects_key_references() {
        let draft = resolved_product().with_parent(Reference::by_key(ResourceKind::Category, "root"));
        let result = CatalogResource::from_draft("r-1".into(), draft);
        assert_eq!(result, Err(ApplyError::UnresolvedReference("category:root".into())));
    }

    #[test]
    fn test_apply_addresses_sub_objects() {
        let mut resource = CatalogResource::from_draft("r-1".into(), resolved_product()).unwrap();
        let price_id = resource.variants[0].prices[0].id.clone();

        resource
            .apply(&[
                UpdateAction::ChangePriceValue {
                    price_id: price_id.clone(),
                    value: Money::new("EUR", 250),
                },
                UpdateAction::AddAsset {
                    variant_id: Some(2),
                    asset: AssetDraft::new("img", localized("en", "Image")),
                },
                UpdateAction::RemoveVariant { variant_id: 1 },
                UpdateAction::AddVariant {
                    variant: VariantDraft::new("v3"),
                },
            ])
            .unwrap();

        assert_eq!(resource.variants.iter().map(|v| v.id).collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(resource.variants[0].assets.len(), 1);

        let missing = resource.apply(&[UpdateAction::RemovePrice { price_id }]);
        assert!(matches!(missing, Err(ApplyError::PriceNotFound(_))));
    }

    #[test]
    fn test_asset_order_rejects_unknown_keys() {
        let draft = resolved_product()
            .with_asset(AssetDraft::new("a", localized("en", "A")))
            .with_asset(AssetDraft::new("b", localized("en", "B")));
        let mut resource = CatalogResource::from_draft("r-1".into(), draft).unwrap();

        resource
            .apply(&[UpdateAction::ChangeAssetOrder {
                variant_id: None,
                asset_keys: vec!["b".into(), "a".into()],
            }])
            .unwrap();
        let keys: Vec<_> = resource.assets.iter().filter_map(|a| a.draft.key.clone()).collect();
        assert_eq!(keys, vec!["b", "a"]);

        let bad = resource.apply(&[UpdateAction::ChangeAssetOrder {
            variant_id: None,
            asset_keys: vec!["c".into()],
        }]);
        assert_eq!(bad, Err(ApplyError::InvalidAssetOrder));
    }
}
