//! Variants and what hangs off them: attributes, prices and variant assets.

use crate::diff::collection::plan;
use crate::diff::custom::{self, OwnerRef};
use crate::diff::{assets, resolved_id, DiffError, DiffOptions, DiffOutcome};
use crate::model::{Attribute, AttributeValue, Price, PriceDraft, UpdateAction, Variant, VariantDraft};
use std::collections::HashSet;

fn variant_identity(key: Option<&str>, sku: Option<&str>) -> Option<String> {
    key.map(|k| format!("key:{k}"))
        .or_else(|| sku.map(|s| format!("sku:{s}")))
}

/// Prices are matched by key, or by their scope when keyless.
fn price_identity(price: &PriceDraft) -> String {
    match &price.key {
        Some(key) => format!("key:{key}"),
        None => format!("scope:{}", price.composite_id()),
    }
}

pub fn diff_variants(
    old: &[Variant],
    new: &[VariantDraft],
    options: &DiffOptions,
    out: &mut DiffOutcome,
) -> Result<(), DiffError> {
    let plan = plan(
        "variants",
        old,
        new,
        |v: &Variant| variant_identity(v.key.as_deref(), v.sku.as_deref()),
        |v: &VariantDraft| variant_identity(v.key.as_deref(), v.sku.as_deref()),
        &mut out.warnings,
    )?;

    for variant in plan.removed {
        out.actions.push(UpdateAction::RemoveVariant { variant_id: variant.id });
    }
    for (old_variant, new_variant) in plan.matched {
        diff_variant(old_variant, new_variant, options, out)?;
    }
    for variant in plan.added {
        validate_new_variant(variant, options)?;
        out.actions.push(UpdateAction::AddVariant {
            variant: variant.clone(),
        });
    }
    Ok(())
}

fn diff_variant(old: &Variant, new: &VariantDraft, options: &DiffOptions, out: &mut DiffOutcome) -> Result<(), DiffError> {
    if old.sku != new.sku {
        out.actions.push(UpdateAction::SetSku {
            variant_id: old.id,
            sku: new.sku.clone(),
        });
    }
    diff_attributes(old.id, &old.attributes, &new.attributes, out)?;
    diff_prices(old.id, &old.prices, &new.prices, options, out)?;
    assets::diff_assets(Some(old.id), &old.assets, &new.assets, options, out)
}

/// A variant that is about to be added wholesale still has to satisfy the
/// identity and resolution rules of its nested collections.
fn validate_new_variant(variant: &VariantDraft, options: &DiffOptions) -> Result<(), DiffError> {
    let mut scratch = DiffOutcome::default();
    let empty = Variant {
        id: 0,
        key: variant.key.clone(),
        sku: variant.sku.clone(),
        attributes: Vec::new(),
        prices: Vec::new(),
        assets: Vec::new(),
    };
    diff_variant(&empty, variant, options, &mut scratch)
}

fn diff_attributes(
    variant_id: u32,
    old: &[Attribute],
    new: &[Attribute],
    out: &mut DiffOutcome,
) -> Result<(), DiffError> {
    let name = |a: &Attribute| Some(a.name.clone());
    let plan = plan("attributes", old, new, name, name, &mut out.warnings)?;

    for attribute in plan.removed {
        out.actions.push(UpdateAction::SetAttribute {
            variant_id,
            name: attribute.name.clone(),
            value: None,
        });
    }
    for (old_attribute, new_attribute) in plan.matched {
        if !values_equal(&old_attribute.value, &new_attribute.value)? {
            out.actions.push(UpdateAction::SetAttribute {
                variant_id,
                name: new_attribute.name.clone(),
                value: Some(new_attribute.value.clone()),
            });
        }
    }
    for attribute in plan.added {
        validate_value(&attribute.value)?;
        out.actions.push(UpdateAction::SetAttribute {
            variant_id,
            name: attribute.name.clone(),
            value: Some(attribute.value.clone()),
        });
    }
    Ok(())
}

/// Rejects unresolved references and duplicate nested names anywhere in `value`.
fn validate_value(value: &AttributeValue) -> Result<(), DiffError> {
    match value {
        AttributeValue::Plain(_) => Ok(()),
        AttributeValue::Reference(reference) => resolved_id(reference).map(|_| ()),
        AttributeValue::Set(values) => values.iter().try_for_each(validate_value),
        AttributeValue::Nested(attributes) => {
            let mut names = HashSet::new();
            for attribute in attributes {
                if !names.insert(attribute.name.as_str()) {
                    return Err(DiffError::DuplicateIdentity {
                        collection: "nested attributes",
                        identity: attribute.name.clone(),
                    });
                }
                validate_value(&attribute.value)?;
            }
            Ok(())
        }
    }
}

/// Structural equality: sets ignore order, nested attributes match by name,
/// references compare by id.
pub fn values_equal(old: &AttributeValue, new: &AttributeValue) -> Result<bool, DiffError> {
    validate_value(new)?;
    Ok(structurally_equal(old, new))
}

fn structurally_equal(old: &AttributeValue, new: &AttributeValue) -> bool {
    match (old, new) {
        (AttributeValue::Set(old), AttributeValue::Set(new)) => {
            if old.len() != new.len() {
                return false;
            }
            let mut used = vec![false; old.len()];
            new.iter().all(|candidate| {
                let found = old
                    .iter()
                    .enumerate()
                    .position(|(i, value)| !used[i] && structurally_equal(value, candidate));
                match found {
                    Some(i) => {
                        used[i] = true;
                        true
                    }
                    None => false,
                }
            })
        }
        (AttributeValue::Nested(old), AttributeValue::Nested(new)) => {
            old.len() == new.len()
                && new.iter().all(|attribute| {
                    old.iter()
                        .find(|o| o.name == attribute.name)
                        .is_some_and(|o| structurally_equal(&o.value, &attribute.value))
                })
        }
        (old, new) => old == new,
    }
}

fn diff_prices(
    variant_id: u32,
    old: &[Price],
    new: &[PriceDraft],
    options: &DiffOptions,
    out: &mut DiffOutcome,
) -> Result<(), DiffError> {
    for price in new {
        if let Some(group) = &price.customer_group {
            resolved_id(group)?;
        }
        if let Some(channel) = &price.channel {
            resolved_id(channel)?;
        }
    }
    let plan = plan(
        "prices",
        old,
        new,
        |p: &Price| Some(price_identity(&p.draft)),
        |p: &PriceDraft| Some(price_identity(p)),
        &mut out.warnings,
    )?;

    for price in plan.removed {
        out.actions.push(UpdateAction::RemovePrice {
            price_id: price.id.clone(),
        });
    }
    for (old_price, new_price) in plan.matched {
        if !old_price.draft.same_scope(new_price) {
            custom::check_resolved(new_price.custom.as_ref())?;
            out.actions.push(UpdateAction::ChangePrice {
                price_id: old_price.id.clone(),
                price: new_price.clone(),
            });
            continue;
        }
        if old_price.draft.value != new_price.value {
            out.actions.push(UpdateAction::ChangePriceValue {
                price_id: old_price.id.clone(),
                value: new_price.value.clone(),
            });
        }
        out.actions.extend(custom::diff_custom_fields(
            &OwnerRef::price(&old_price.id),
            old_price.draft.custom.as_ref(),
            new_price.custom.as_ref(),
            options,
        )?);
    }
    for price in plan.added {
        custom::check_resolved(price.custom.as_ref())?;
        out.actions.push(UpdateAction::AddPrice {
            variant_id,
            price: price.clone(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Money, Reference, ResourceKind};
    use serde_json::json;

    fn old_variant(id: u32, draft: VariantDraft) -> Variant {
        Variant {
            id,
            key: draft.key,
            sku: draft.sku,
            attributes: draft.attributes,
            prices: draft
                .prices
                .into_iter()
                .enumerate()
                .map(|(i, draft)| Price { id: format!("price-{}", i + 1), draft })
                .collect(),
            assets: Vec::new(),
        }
    }

    fn price(key: &str, amount: i64) -> PriceDraft {
        PriceDraft::new(Money::new("EUR", amount)).with_key(key)
    }

    #[test]
    fn test_price_scenario_remove_change_add() {
        let old = vec![old_variant(1, VariantDraft::new("v1").with_price(price("p1", 10)).with_price(price("p2", 20)))];
        let new = vec![VariantDraft::new("v1").with_price(price("p2", 25)).with_price(price("p3", 5))];

        let mut out = DiffOutcome::default();
        diff_variants(&old, &new, &DiffOptions::default(), &mut out).unwrap();
        assert_eq!(
            out.actions,
            vec![
                UpdateAction::RemovePrice { price_id: "price-1".into() },
                UpdateAction::ChangePriceValue {
                    price_id: "price-2".into(),
                    value: Money::new("EUR", 25),
                },
                UpdateAction::AddPrice { variant_id: 1, price: price("p3", 5) },
            ]
        );
    }

    #[test]
    fn test_keyless_prices_match_by_scope() {
        let de = PriceDraft::new(Money::new("EUR", 100)).with_country("DE");
        let at = PriceDraft::new(Money::new("EUR", 100)).with_country("AT");
        let old = vec![old_variant(1, VariantDraft::new("v1").with_price(de.clone()).with_price(at.clone()))];
        let new = vec![VariantDraft::new("v1").with_price(at).with_price(PriceDraft {
            value: Money::new("EUR", 90),
            ..de
        })];

        let mut out = DiffOutcome::default();
        diff_variants(&old, &new, &DiffOptions::default(), &mut out).unwrap();
        assert_eq!(
            out.actions,
            vec![UpdateAction::ChangePriceValue {
                price_id: "price-1".into(),
                value: Money::new("EUR", 90),
            }]
        );
    }

    #[test]
    fn test_duplicate_price_key_fails() {
        let old = vec![old_variant(1, VariantDraft::new("v1"))];
        let new = vec![VariantDraft::new("v1").with_price(price("p1", 10)).with_price(price("p1", 20))];

        let mut out = DiffOutcome::default();
        let result = diff_variants(&old, &new, &DiffOptions::default(), &mut out);
        assert_eq!(
            result,
            Err(DiffError::DuplicateIdentity {
                collection: "prices",
                identity: "key:p1".into(),
            })
        );
    }

    #[test]
    fn test_added_variant_is_validated() {
        let new = vec![VariantDraft::new("v2").with_price(price("p1", 10)).with_price(price("p1", 20))];
        let mut out = DiffOutcome::default();
        let result = diff_variants(&[], &new, &DiffOptions::default(), &mut out);
        assert!(matches!(result, Err(DiffError::DuplicateIdentity { .. })));
    }

    #[test]
    fn test_variants_matched_by_key_then_sku() {
        let old = vec![
            old_variant(1, VariantDraft::new("v1").with_sku("A")),
            old_variant(2, VariantDraft { sku: Some("B".into()), ..Default::default() }),
        ];
        let new = vec![
            VariantDraft { sku: Some("B".into()), ..Default::default() },
            VariantDraft::new("v1").with_sku("A2"),
        ];

        let mut out = DiffOutcome::default();
        diff_variants(&old, &new, &DiffOptions::default(), &mut out).unwrap();
        assert_eq!(
            out.actions,
            vec![UpdateAction::SetSku { variant_id: 1, sku: Some("A2".into()) }]
        );
    }

    #[test]
    fn test_attribute_sets_and_nested_values_compare_structurally() {
        let set = |items: &[&str]| {
            AttributeValue::Set(items.iter().map(|s| AttributeValue::Plain(json!(s))).collect())
        };
        assert!(values_equal(&set(&["a", "b"]), &set(&["b", "a"])).unwrap());
        assert!(!values_equal(&set(&["a", "a"]), &set(&["a", "b"])).unwrap());

        let nested = |size: i64, color: &str| {
            AttributeValue::Nested(vec![
                Attribute::plain("size", json!(size)),
                Attribute::plain("color", json!(color)),
            ])
        };
        let reordered = AttributeValue::Nested(vec![
            Attribute::plain("color", json!("red")),
            Attribute::plain("size", json!(42)),
        ]);
        assert!(values_equal(&nested(42, "red"), &reordered).unwrap());
        assert!(!values_equal(&nested(41, "red"), &reordered).unwrap());
    }

    #[test]
    fn test_reference_attributes_compare_by_id() {
        let by_id = |id: &str| AttributeValue::Reference(Reference::by_id(ResourceKind::Product, id));
        assert!(values_equal(&by_id("x"), &by_id("x")).unwrap());
        assert!(!values_equal(&by_id("x"), &by_id("y")).unwrap());

        let by_key = AttributeValue::Reference(Reference::by_key(ResourceKind::Product, "prod-B"));
        assert!(matches!(values_equal(&by_id("x"), &by_key), Err(DiffError::UnresolvedReference(_))));
    }

    #[test]
    fn test_attribute_changes() {
        let old = vec![old_variant(
            1,
            VariantDraft::new("v1")
                .with_attribute(Attribute::plain("color", json!("red")))
                .with_attribute(Attribute::plain("size", json!(40))),
        )];
        let new = vec![VariantDraft::new("v1")
            .with_attribute(Attribute::plain("size", json!(42)))
            .with_attribute(Attribute::plain("fit", json!("slim")))];

        let mut out = DiffOutcome::default();
        diff_variants(&old, &new, &DiffOptions::default(), &mut out).unwrap();
        assert_eq!(
            out.actions,
            vec![
                UpdateAction::SetAttribute { variant_id: 1, name: "color".into(), value: None },
                UpdateAction::SetAttribute {
                    variant_id: 1,
                    name: "size".into(),
                    value: Some(AttributeValue::Plain(json!(42))),
                },
                UpdateAction::SetAttribute {
                    variant_id: 1,
                    name: "fit".into(),
                    value: Some(AttributeValue::Plain(json!("slim"))),
                },
            ]
        );
    }
}
