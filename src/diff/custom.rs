//! Custom-field sync for every owner kind.
//!
//! Each [`OwnerKind`] maps to one [`CustomFieldStrategy`]: a small table of
//! plain functions that build the owner-specific "remove type", "set type"
//! and "set field" actions. The diff algorithm itself is shared.

use crate::diff::{resolved_id, DiffError, DiffOptions};
use crate::model::{CustomFields, Reference, ResourceKey, ResourceKind, UpdateAction};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Whether an empty array in a custom field counts as a value of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EmptySetPolicy {
    /// Empty arrays and nulls both mean "field absent".
    #[default]
    TreatAsAbsent,
    /// Empty arrays stay distinct from absent for fields the type schema
    /// declares as sets. Other fields behave as with `TreatAsAbsent`.
    DistinguishForSetFields,
}

/// Set-typed field names per custom type.
///
/// Types may be registered by key or by id. [`CustomTypeSchemas::resolve_with`]
/// rewrites key registrations to ids once the ids are known, which is what the
/// diff engine looks up.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomTypeSchemas {
    set_fields: HashMap<Reference, BTreeSet<String>>,
}

impl CustomTypeSchemas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_set_field(mut self, type_ref: Reference, field: &str) -> Self {
        self.set_fields
            .entry(type_ref)
            .or_default()
            .insert(field.to_string());
        self
    }

    pub fn is_set_field(&self, type_id: &str, field: &str) -> bool {
        self.set_fields
            .get(&Reference::by_id(ResourceKind::Type, type_id))
            .is_some_and(|fields| fields.contains(field))
    }

    /// Type keys that still need an id.
    pub fn unresolved_type_keys(&self) -> impl Iterator<Item = ResourceKey> + '_ {
        self.set_fields.keys().filter_map(Reference::unresolved_key)
    }

    /// Copy with every key registration that `lookup` can resolve moved to its id.
    pub fn resolve_with(&self, lookup: impl Fn(&ResourceKey) -> Option<String>) -> Self {
        let mut resolved = Self::default();
        for (type_ref, fields) in &self.set_fields {
            let target = match type_ref.unresolved_key() {
                Some(key) => match lookup(&key) {
                    Some(id) => Reference::by_id(type_ref.kind(), id),
                    None => type_ref.clone(),
                },
                None => type_ref.clone(),
            };
            resolved
                .set_fields
                .entry(target)
                .or_default()
                .extend(fields.iter().cloned());
        }
        resolved
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OwnerKind {
    Resource,
    Asset,
    Price,
    LineItem,
}

/// Addresses one custom-field owner. `id` is the asset key for assets and
/// the sub-object id for prices and line items. It is empty for the
/// resource itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerRef {
    pub kind: OwnerKind,
    pub variant_id: Option<u32>,
    pub id: String,
}

/// The three action builders for one owner kind.
pub struct CustomFieldStrategy {
    pub remove_custom_type: fn(&OwnerRef) -> UpdateAction,
    pub set_custom_type: fn(&OwnerRef, Reference, BTreeMap<String, Value>) -> UpdateAction,
    pub set_custom_field: fn(&OwnerRef, String, Option<Value>) -> UpdateAction,
}

impl OwnerKind {
    pub fn strategy(self) -> &'static CustomFieldStrategy {
        match self {
            OwnerKind::Resource => &RESOURCE_STRATEGY,
            OwnerKind::Asset => &ASSET_STRATEGY,
            OwnerKind::Price => &PRICE_STRATEGY,
            OwnerKind::LineItem => &LINE_ITEM_STRATEGY,
        }
    }
}

impl OwnerRef {
    pub fn resource() -> Self {
        Self {
            kind: OwnerKind::Resource,
            variant_id: None,
            id: String::new(),
        }
    }

    pub fn asset(variant_id: Option<u32>, asset_key: &str) -> Self {
        Self {
            kind: OwnerKind::Asset,
            variant_id,
            id: asset_key.to_string(),
        }
    }

    pub fn price(price_id: &str) -> Self {
        Self {
            kind: OwnerKind::Price,
            variant_id: None,
            id: price_id.to_string(),
        }
    }

    pub fn line_item(line_item_id: &str) -> Self {
        Self {
            kind: OwnerKind::LineItem,
            variant_id: None,
            id: line_item_id.to_string(),
        }
    }

    pub fn build_remove_custom_type(&self) -> UpdateAction {
        (self.kind.strategy().remove_custom_type)(self)
    }

    pub fn build_set_custom_type(&self, type_ref: Reference, fields: BTreeMap<String, Value>) -> UpdateAction {
        (self.kind.strategy().set_custom_type)(self, type_ref, fields)
    }

    pub fn build_set_custom_field(&self, name: String, value: Option<Value>) -> UpdateAction {
        (self.kind.strategy().set_custom_field)(self, name, value)
    }
}

static RESOURCE_STRATEGY: CustomFieldStrategy = CustomFieldStrategy {
    remove_custom_type: resource_remove_type,
    set_custom_type: resource_set_type,
    set_custom_field: resource_set_field,
};

static ASSET_STRATEGY: CustomFieldStrategy = CustomFieldStrategy {
    remove_custom_type: asset_remove_type,
    set_custom_type: asset_set_type,
    set_custom_field: asset_set_field,
};

static PRICE_STRATEGY: CustomFieldStrategy = CustomFieldStrategy {
    remove_custom_type: price_remove_type,
    set_custom_type: price_set_type,
    set_custom_field: price_set_field,
};

static LINE_ITEM_STRATEGY: CustomFieldStrategy = CustomFieldStrategy {
    remove_custom_type: line_item_remove_type,
    set_custom_type: line_item_set_type,
    set_custom_field: line_item_set_field,
};

fn resource_remove_type(_: &OwnerRef) -> UpdateAction {
    UpdateAction::SetCustomType {
        type_ref: None,
        fields: BTreeMap::new(),
    }
}

fn resource_set_type(_: &OwnerRef, type_ref: Reference, fields: BTreeMap<String, Value>) -> UpdateAction {
    UpdateAction::SetCustomType {
        type_ref: Some(type_ref),
        fields,
    }
}

fn resource_set_field(_: &OwnerRef, name: String, value: Option<Value>) -> UpdateAction {
    UpdateAction::SetCustomField { name, value }
}

fn asset_remove_type(owner: &OwnerRef) -> UpdateAction {
    UpdateAction::SetAssetCustomType {
        variant_id: owner.variant_id,
        asset_key: owner.id.clone(),
        type_ref: None,
        fields: BTreeMap::new(),
    }
}

fn asset_set_type(owner: &OwnerRef, type_ref: Reference, fields: BTreeMap<String, Value>) -> UpdateAction {
    UpdateAction::SetAssetCustomType {
        variant_id: owner.variant_id,
        asset_key: owner.id.clone(),
        type_ref: Some(type_ref),
        fields,
    }
}

fn asset_set_field(owner: &OwnerRef, name: String, value: Option<Value>) -> UpdateAction {
    UpdateAction::SetAssetCustomField {
        variant_id: owner.variant_id,
        asset_key: owner.id.clone(),
        name,
        value,
    }
}

fn price_remove_type(owner: &OwnerRef) -> UpdateAction {
    UpdateAction::SetPriceCustomType {
        price_id: owner.id.clone(),
        type_ref: None,
        fields: BTreeMap::new(),
    }
}

fn price_set_type(owner: &OwnerRef, type_ref: Reference, fields: BTreeMap<String, Value>) -> UpdateAction {
    UpdateAction::SetPriceCustomType {
        price_id: owner.id.clone(),
        type_ref: Some(type_ref),
        fields,
    }
}

fn price_set_field(owner: &OwnerRef, name: String, value: Option<Value>) -> UpdateAction {
    UpdateAction::SetPriceCustomField {
        price_id: owner.id.clone(),
        name,
        value,
    }
}

fn line_item_remove_type(owner: &OwnerRef) -> UpdateAction {
    UpdateAction::SetLineItemCustomType {
        line_item_id: owner.id.clone(),
        type_ref: None,
        fields: BTreeMap::new(),
    }
}

fn line_item_set_type(owner: &OwnerRef, type_ref: Reference, fields: BTreeMap<String, Value>) -> UpdateAction {
    UpdateAction::SetLineItemCustomType {
        line_item_id: owner.id.clone(),
        type_ref: Some(type_ref),
        fields,
    }
}

fn line_item_set_field(owner: &OwnerRef, name: String, value: Option<Value>) -> UpdateAction {
    UpdateAction::SetLineItemCustomField {
        line_item_id: owner.id.clone(),
        name,
        value,
    }
}

// =============================================================================
// DIFF
// =============================================================================

/// Fails when a custom block about to be added wholesale still names its type by key.
pub(crate) fn check_resolved(custom: Option<&CustomFields>) -> Result<(), DiffError> {
    match custom {
        Some(custom) => resolved_id(&custom.type_ref).map(|_| ()),
        None => Ok(()),
    }
}

/// Drops nulls, and empty arrays unless the policy keeps them for set fields.
fn normalize(custom: &CustomFields, type_id: &str, options: &DiffOptions) -> BTreeMap<String, Value> {
    custom
        .fields
        .iter()
        .filter(|(name, value)| match value {
            Value::Null => false,
            Value::Array(items) if items.is_empty() => {
                options.empty_set_policy == EmptySetPolicy::DistinguishForSetFields
                    && options.schemas.is_set_field(type_id, name)
            }
            _ => true,
        })
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Actions that turn `old` custom fields into `new` ones for `owner`.
///
/// New or changed fields are set first (in field-name order), then fields
/// that disappeared are cleared.
pub fn diff_custom_fields(
    owner: &OwnerRef,
    old: Option<&CustomFields>,
    new: Option<&CustomFields>,
    options: &DiffOptions,
) -> Result<Vec<UpdateAction>, DiffError> {
    let (old, new) = match (old, new) {
        (None, None) => return Ok(Vec::new()),
        (Some(_), None) => return Ok(vec![owner.build_remove_custom_type()]),
        (None, Some(new)) => {
            let id = resolved_id(&new.type_ref)?;
            let fields = normalize(new, id, options);
            return Ok(vec![owner.build_set_custom_type(new.type_ref.clone(), fields)]);
        }
        (Some(old), Some(new)) => (old, new),
    };

    let new_id = resolved_id(&new.type_ref)?;
    let old_id = old.type_ref.id().unwrap_or_default();
    let new_fields = normalize(new, new_id, options);
    if old_id != new_id {
        return Ok(vec![owner.build_set_custom_type(new.type_ref.clone(), new_fields)]);
    }

    let old_fields = normalize(old, old_id, options);
    let mut actions = Vec::new();
    for (name, value) in &new_fields {
        if old_fields.get(name) != Some(value) {
            actions.push(owner.build_set_custom_field(name.clone(), Some(value.clone())));
        }
    }
    for name in old_fields.keys() {
        if !new_fields.contains_key(name) {
            actions.push(owner.build_set_custom_field(name.clone(), None));
        }
    }
    Ok(actions)
}
