//! Caller-supplied descriptions of the desired resource state.
//!
//! A [`ResourceDraft`] may reference other resources by key. Those references
//! are rewritten to ids by the resolver before the draft reaches the diff
//! engine or the target store.

use crate::model::reference::{Reference, ResourceKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Locale → text.
pub type LocalizedString = BTreeMap<String, String>;

/// Builds a single-locale [`LocalizedString`].
pub fn localized(locale: &str, text: &str) -> LocalizedString {
    BTreeMap::from([(locale.to_string(), text.to_string())])
}

/// Custom-field extension attached to a resource or one of its sub-objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomFields {
    pub type_ref: Reference,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

impl CustomFields {
    pub fn new(type_ref: Reference) -> Self {
        Self {
            type_ref,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: &str, value: Value) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryOrderHint {
    pub category: Reference,
    pub hint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Money {
    pub currency_code: String,
    pub cent_amount: i64,
}

impl Money {
    pub fn new(currency_code: &str, cent_amount: i64) -> Self {
        Self {
            currency_code: currency_code.to_string(),
            cent_amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub value: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_group: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<CustomFields>,
}

impl PriceDraft {
    pub fn new(value: Money) -> Self {
        Self {
            key: None,
            value,
            country: None,
            customer_group: None,
            channel: None,
            valid_from: None,
            valid_until: None,
            custom: None,
        }
    }

    pub fn with_key(mut self, key: &str) -> Self {
        self.key = Some(key.to_string());
        self
    }

    pub fn with_country(mut self, country: &str) -> Self {
        self.country = Some(country.to_string());
        self
    }

    /// The scope that makes a keyless price unique within a variant:
    /// currency, country, customer group, channel and validity window.
    pub fn composite_id(&self) -> String {
        fn part(reference: &Option<Reference>) -> String {
            reference.as_ref().map(|r| r.to_string()).unwrap_or_default()
        }
        format!(
            "{}|{}|{}|{}|{}|{}",
            self.value.currency_code,
            self.country.as_deref().unwrap_or_default(),
            part(&self.customer_group),
            part(&self.channel),
            self.valid_from.map(|d| d.to_rfc3339()).unwrap_or_default(),
            self.valid_until.map(|d| d.to_rfc3339()).unwrap_or_default(),
        )
    }

    pub(crate) fn same_scope(&self, other: &PriceDraft) -> bool {
        self.value.currency_code == other.value.currency_code
            && self.country == other.country
            && self.customer_group == other.customer_group
            && self.channel == other.channel
            && self.valid_from == other.valid_from
            && self.valid_until == other.valid_until
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetSource {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub name: LocalizedString,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<LocalizedString>,
    #[serde(default)]
    pub sources: Vec<AssetSource>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<CustomFields>,
}

impl AssetDraft {
    pub fn new(key: &str, name: LocalizedString) -> Self {
        Self {
            key: Some(key.to_string()),
            name,
            description: None,
            sources: Vec::new(),
            tags: Vec::new(),
            custom: None,
        }
    }
}

/// A typed attribute value. References inside attributes are resolved like
/// any other reference; nested and set values are compared structurally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum AttributeValue {
    Plain(Value),
    Reference(Reference),
    Set(Vec<AttributeValue>),
    Nested(Vec<Attribute>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: AttributeValue,
}

impl Attribute {
    pub fn new(name: &str, value: AttributeValue) -> Self {
        Self {
            name: name.to_string(),
            value,
        }
    }

    pub fn plain(name: &str, value: Value) -> Self {
        Self::new(name, AttributeValue::Plain(value))
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub prices: Vec<PriceDraft>,
    #[serde(default)]
    pub assets: Vec<AssetDraft>,
}

impl VariantDraft {
    pub fn new(key: &str) -> Self {
        Self {
            key: Some(key.to_string()),
            ..Default::default()
        }
    }

    pub fn with_sku(mut self, sku: &str) -> Self {
        self.sku = Some(sku.to_string());
        self
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn with_price(mut self, price: PriceDraft) -> Self {
        self.prices.push(price);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<CustomFields>,
}

impl LineItemDraft {
    pub fn new(sku: &str, quantity: u64) -> Self {
        Self {
            key: None,
            sku: Some(sku.to_string()),
            quantity: Some(quantity),
            custom: None,
        }
    }

    /// Missing and zero quantities both mean one item.
    pub fn effective_quantity(&self) -> u64 {
        match self.quantity {
            None | Some(0) => 1,
            Some(quantity) => quantity,
        }
    }
}

/// Desired state for one catalog resource.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDraft {
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
    #[serde(default)]
    pub category_order_hints: Vec<CategoryOrderHint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<CustomFields>,
    #[serde(default)]
    pub assets: Vec<AssetDraft>,
    #[serde(default)]
    pub variants: Vec<VariantDraft>,
    #[serde(default)]
    pub line_items: Vec<LineItemDraft>,
}

impl ResourceDraft {
    pub fn new(kind: ResourceKind, key: &str) -> Self {
        Self {
            kind,
            key: Some(key.to_string()),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, locale: &str, text: &str) -> Self {
        self.name.insert(locale.to_string(), text.to_string());
        self
    }

    pub fn with_slug(mut self, locale: &str, text: &str) -> Self {
        self.slug.insert(locale.to_string(), text.to_string());
        self
    }

    pub fn with_parent(mut self, parent: Reference) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_category(mut self, category: Reference) -> Self {
        self.categories.push(category);
        self
    }

    pub fn with_custom(mut self, custom: CustomFields) -> Self {
        self.custom = Some(custom);
        self
    }

    pub fn with_asset(mut self, asset: AssetDraft) -> Self {
        self.assets.push(asset);
        self
    }

    pub fn with_variant(mut self, variant: VariantDraft) -> Self {
        self.variants.push(variant);
        self
    }

    pub fn with_line_item(mut self, line_item: LineItemDraft) -> Self {
        self.line_items.push(line_item);
        self
    }

    /// Visits every reference reachable from this draft, including those
    /// nested in sub-objects and attribute values.
    pub fn for_each_reference_mut(&mut self, f: &mut impl FnMut(&mut Reference)) {
        if let Some(parent) = self.parent.as_mut() {
            f(parent);
        }
        self.categories.iter_mut().for_each(&mut *f);
        for hint in &mut self.category_order_hints {
            f(&mut hint.category);
        }
        visit_custom(&mut self.custom, f);
        for asset in &mut self.assets {
            asset.for_each_reference_mut(f);
        }
        for variant in &mut self.variants {
            variant.for_each_reference_mut(f);
        }
        for line_item in &mut self.line_items {
            visit_custom(&mut line_item.custom, f);
        }
    }
}

impl VariantDraft {
    pub fn for_each_reference_mut(&mut self, f: &mut impl FnMut(&mut Reference)) {
        for attribute in &mut self.attributes {
            attribute.value.for_each_reference_mut(f);
        }
        for price in &mut self.prices {
            price.for_each_reference_mut(f);
        }
        for asset in &mut self.assets {
            asset.for_each_reference_mut(f);
        }
    }
}

impl PriceDraft {
    pub fn for_each_reference_mut(&mut self, f: &mut impl FnMut(&mut Reference)) {
        if let Some(group) = self.customer_group.as_mut() {
            f(group);
        }
        if let Some(channel) = self.channel.as_mut() {
            f(channel);
        }
        visit_custom(&mut self.custom, f);
    }
}

impl AssetDraft {
    pub fn for_each_reference_mut(&mut self, f: &mut impl FnMut(&mut Reference)) {
        visit_custom(&mut self.custom, f);
    }
}

impl AttributeValue {
    pub fn for_each_reference_mut(&mut self, f: &mut impl FnMut(&mut Reference)) {
        match self {
            AttributeValue::Plain(_) => {}
            AttributeValue::Reference(reference) => f(reference),
            AttributeValue::Set(values) => {
                for value in values {
                    value.for_each_reference_mut(f);
                }
            }
            AttributeValue::Nested(attributes) => {
                for attribute in attributes {
                    attribute.value.for_each_reference_mut(f);
                }
            }
        }
    }
}

pub(crate) fn visit_custom(custom: &mut Option<CustomFields>, f: &mut impl FnMut(&mut Reference)) {
    if let Some(custom) = custom.as_mut() {
        f(&mut custom.type_ref);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_line_item_quantity_defaults_to_one() {
        let mut item = LineItemDraft::new("sku-1", 0);
        assert_eq!(item.effective_quantity(), 1);
        item.quantity = None;
        assert_eq!(item.effective_quantity(), 1);
        item.quantity = Some(4);
        assert_eq!(item.effective_quantity(), 4);
    }

    #[test]
    fn test_reference_walk_reaches_nested_attributes() {
        let nested = AttributeValue::Nested(vec![Attribute::new(
            "related",
            AttributeValue::Set(vec![AttributeValue::Reference(Reference::by_key(
                ResourceKind::Product,
                "prod-B",
            ))]),
        )]);
        let mut draft = ResourceDraft::new(ResourceKind::Product, "prod-A")
            .with_category(Reference::by_key(ResourceKind::Category, "shoes"))
            .with_variant(
                VariantDraft::new("v1")
                    .with_attribute(Attribute::new("bundle", nested))
                    .with_price(PriceDraft {
                        channel: Some(Reference::by_key(ResourceKind::Channel, "web")),
                        ..PriceDraft::new(Money::new("EUR", 100))
                    }),
            );

        let mut seen = Vec::new();
        draft.for_each_reference_mut(&mut |r| seen.push(r.to_string()));
        assert_eq!(seen, vec!["category:shoes", "product:prod-B", "channel:web"]);
    }

    #[test]
    fn test_draft_deserializes_with_defaults() {
        let draft: ResourceDraft = serde_json::from_value(json!({
            "kind": "category",
            "key": "shoes",
            "name": { "en": "Shoes" }
        }))
        .unwrap();
        assert_eq!(draft.kind, ResourceKind::Category);
        assert!(draft.variants.is_empty());
        assert_eq!(draft.name, localized("en", "Shoes"));
    }
}
