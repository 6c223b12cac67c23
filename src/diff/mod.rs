//! # Diff Engine
//!
//! Compares an existing [`CatalogResource`] with a resolved [`ResourceDraft`]
//! and produces the ordered list of [`UpdateAction`]s that turns the former
//! into the latter.
//!
//! The engine is pure: identical inputs give identical action lists. Groups
//! are emitted in a fixed order:
//!
//! 1. name, slug, description, parent
//! 2. category removals, then additions
//! 3. category order hints
//! 4. resource custom fields
//! 5. resource assets
//! 6. variants (attributes, prices, variant assets)
//! 7. line items
//!
//! Nested collections follow [`collection::plan`]: removals in old order,
//! updates and additions in draft order, and a reorder last where the
//! target tracks order.

pub mod assets;
pub mod collection;
pub mod custom;
pub mod line_items;
pub mod variants;

pub use custom::{CustomFieldStrategy, CustomTypeSchemas, EmptySetPolicy, OwnerKind, OwnerRef};

use crate::model::{CatalogResource, Reference, ResourceDraft, ResourceKey, ResourceKind, UpdateAction};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use tracing::debug;

/// Errors that prevent any action from being produced for a resource.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DiffError {
    /// Two draft entries of one collection share an identity.
    #[error("Duplicate {collection} identity '{identity}' in draft")]
    DuplicateIdentity { collection: &'static str, identity: String },

    /// A draft entry has no key (or SKU) to match it by.
    #[error("Draft {collection} entry at position {position} has no identity")]
    MissingIdentity { collection: &'static str, position: usize },

    /// The draft still references `0` by key.
    #[error("Reference {0} is not resolved")]
    UnresolvedReference(ResourceKey),
}

#[derive(Debug, Clone, Default)]
pub struct DiffOptions {
    pub empty_set_policy: EmptySetPolicy,
    pub schemas: CustomTypeSchemas,
}

/// Actions plus the non-fatal anomalies met while computing them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffOutcome {
    pub actions: Vec<UpdateAction>,
    pub warnings: Vec<String>,
}

pub(crate) fn resolved_id(reference: &Reference) -> Result<&str, DiffError> {
    match reference {
        Reference::Id { id, .. } => Ok(id),
        Reference::Key { kind, key } => Err(DiffError::UnresolvedReference(ResourceKey::new(*kind, key.clone()))),
    }
}

fn resolved_opt(reference: Option<&Reference>) -> Result<Option<&str>, DiffError> {
    reference.map(resolved_id).transpose()
}

pub struct DiffEngine {
    options: DiffOptions,
}

impl DiffEngine {
    pub fn new(options: DiffOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &DiffOptions {
        &self.options
    }

    /// Actions that make `old` match `new`. On error no actions are returned.
    pub fn diff(&self, old: &CatalogResource, new: &ResourceDraft) -> Result<DiffOutcome, DiffError> {
        let mut out = DiffOutcome::default();

        if old.name != new.name {
            out.actions.push(UpdateAction::ChangeName { name: new.name.clone() });
        }
        if old.slug != new.slug {
            out.actions.push(UpdateAction::ChangeSlug { slug: new.slug.clone() });
        }
        if old.description != new.description {
            out.actions.push(UpdateAction::SetDescription {
                description: new.description.clone(),
            });
        }
        if resolved_opt(old.parent.as_ref()).unwrap_or(None) != resolved_opt(new.parent.as_ref())? {
            out.actions.push(UpdateAction::ChangeParent {
                parent: new.parent.clone(),
            });
        }

        self.diff_categories(old, new, &mut out)?;

        let owner = OwnerRef::resource();
        out.actions.extend(custom::diff_custom_fields(
            &owner,
            old.custom.as_ref(),
            new.custom.as_ref(),
            &self.options,
        )?);

        assets::diff_assets(None, &old.assets, &new.assets, &self.options, &mut out)?;
        variants::diff_variants(&old.variants, &new.variants, &self.options, &mut out)?;
        line_items::diff_line_items(&old.line_items, &new.line_items, &self.options, &mut out)?;

        debug!(key = ?new.key, actions = out.actions.len(), warnings = out.warnings.len(), "Diff computed");
        Ok(out)
    }

    /// Checks a draft that is about to be created: the same identity and
    /// resolution rules as [`DiffEngine::diff`], against an empty resource.
    pub fn validate(&self, draft: &ResourceDraft) -> Result<Vec<String>, DiffError> {
        let empty = CatalogResource {
            kind: draft.kind,
            key: draft.key.clone(),
            ..Default::default()
        };
        self.diff(&empty, draft).map(|outcome| outcome.warnings)
    }

    fn diff_categories(&self, old: &CatalogResource, new: &ResourceDraft, out: &mut DiffOutcome) -> Result<(), DiffError> {
        let mut new_ids: Vec<&str> = Vec::with_capacity(new.categories.len());
        for category in &new.categories {
            let id = resolved_id(category)?;
            if new_ids.contains(&id) {
                out.warnings.push(format!("category {id} is listed more than once, keeping the first"));
                continue;
            }
            new_ids.push(id);
        }
        let old_ids: Vec<&str> = old.categories.iter().filter_map(Reference::id).collect();

        let removed: HashSet<&str> = old_ids.iter().copied().filter(|id| !new_ids.contains(id)).collect();
        for id in old_ids.iter().filter(|id| removed.contains(*id)) {
            out.actions.push(UpdateAction::RemoveFromCategory {
                category: Reference::by_id(ResourceKind::Category, *id),
            });
        }
        for id in new_ids.iter().filter(|id| !old_ids.contains(*id)) {
            out.actions.push(UpdateAction::AddToCategory {
                category: Reference::by_id(ResourceKind::Category, *id),
            });
        }

        let mut new_hints: BTreeMap<&str, &str> = BTreeMap::new();
        for hint in &new.category_order_hints {
            let id = resolved_id(&hint.category)?;
            if new_hints.contains_key(id) {
                out.warnings.push(format!("category {id} has more than one order hint, keeping the first"));
                continue;
            }
            new_hints.insert(id, hint.hint.as_str());
        }
        // Removing a category already drops its hint.
        for id in old.category_order_hints.keys() {
            if !new_hints.contains_key(id.as_str()) && !removed.contains(id.as_str()) {
                out.actions.push(UpdateAction::SetCategoryOrderHint {
                    category_id: id.clone(),
                    order_hint: None,
                });
            }
        }
        for (id, hint) in &new_hints {
            if old.category_order_hints.get(*id).map(String::as_str) != Some(*hint) {
                out.actions.push(UpdateAction::SetCategoryOrderHint {
                    category_id: id.to_string(),
                    order_hint: Some(hint.to_string()),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CategoryOrderHint;

    fn category(id: &str) -> Reference {
        Reference::by_id(ResourceKind::Category, id)
    }

    fn existing(draft: ResourceDraft) -> CatalogResource {
        let mut resource = CatalogResource::from_draft("r-1".into(), draft).unwrap();
        resource.version = 1;
        resource
    }

    #[test]
    fn test_root_fields_in_fixed_order() {
        let old = existing(ResourceDraft::new(ResourceKind::Category, "shoes").with_name("en", "Shoes"));
        let new = ResourceDraft::new(ResourceKind::Category, "shoes")
            .with_name("en", "Sneakers")
            .with_slug("en", "sneakers")
            .with_parent(category("root"));

        let outcome = DiffEngine::new(DiffOptions::default()).diff(&old, &new).unwrap();
        let names: Vec<String> = outcome.actions.iter().map(UpdateAction::name).collect();
        assert_eq!(names, vec!["changeName", "changeSlug", "changeParent"]);
    }

    #[test]
    fn test_categories_remove_then_add_with_duplicate_warning() {
        let old = existing(
            ResourceDraft::new(ResourceKind::Product, "p")
                .with_category(category("a"))
                .with_category(category("b")),
        );
        let new = ResourceDraft::new(ResourceKind::Product, "p")
            .with_category(category("c"))
            .with_category(category("b"))
            .with_category(category("c"));

        let outcome = DiffEngine::new(DiffOptions::default()).diff(&old, &new).unwrap();
        assert_eq!(
            outcome.actions,
            vec![
                UpdateAction::RemoveFromCategory { category: category("a") },
                UpdateAction::AddToCategory { category: category("c") },
            ]
        );
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[test]
    fn test_order_hints_follow_category_membership() {
        let mut old_draft = ResourceDraft::new(ResourceKind::Product, "p")
            .with_category(category("a"))
            .with_category(category("b"));
        old_draft.category_order_hints = vec![
            CategoryOrderHint { category: category("a"), hint: "0.1".into() },
            CategoryOrderHint { category: category("b"), hint: "0.2".into() },
        ];
        let old = existing(old_draft);

        let mut new = ResourceDraft::new(ResourceKind::Product, "p").with_category(category("b"));
        new.category_order_hints = vec![CategoryOrderHint { category: category("b"), hint: "0.5".into() }];

        let outcome = DiffEngine::new(DiffOptions::default()).diff(&old, &new).unwrap();
        assert_eq!(
            outcome.actions,
            vec![
                UpdateAction::RemoveFromCategory { category: category("a") },
                UpdateAction::SetCategoryOrderHint {
                    category_id: "b".into(),
                    order_hint: Some("0.5".into()),
                },
            ]
        );
    }

    #[test]
    fn test_unresolved_draft_reference_fails() {
        let old = existing(ResourceDraft::new(ResourceKind::Product, "p"));
        let new = ResourceDraft::new(ResourceKind::Product, "p")
            .with_category(Reference::by_key(ResourceKind::Category, "shoes"));
        let result = DiffEngine::new(DiffOptions::default()).diff(&old, &new);
        assert_eq!(
            result,
            Err(DiffError::UnresolvedReference(ResourceKey::new(ResourceKind::Category, "shoes")))
        );
    }

    fn rich_pair() -> (CatalogResource, ResourceDraft) {
        use crate::model::{localized, AssetDraft, Attribute, CustomFields, LineItemDraft, Money, PriceDraft, VariantDraft};
        use serde_json::json;

        let type_ref = Reference::by_id(ResourceKind::Type, "t-1");
        let asset = |key: &str| AssetDraft::new(key, localized("en", key));

        let mut old_draft = ResourceDraft::new(ResourceKind::Product, "p")
            .with_name("en", "Runner")
            .with_category(category("a"))
            .with_category(category("b"))
            .with_custom(CustomFields::new(type_ref.clone()).with_field("color", json!("red")))
            .with_asset(asset("a"))
            .with_asset(asset("b"))
            .with_asset(asset("c"))
            .with_variant(
                VariantDraft::new("v1")
                    .with_sku("s1")
                    .with_attribute(Attribute::plain("color", json!("red")))
                    .with_price(PriceDraft::new(Money::new("EUR", 10)).with_key("p1"))
                    .with_price(PriceDraft::new(Money::new("USD", 20)).with_key("p2")),
            )
            .with_line_item(LineItemDraft::new("sku-1", 2));
        old_draft.category_order_hints = vec![CategoryOrderHint { category: category("a"), hint: "0.1".into() }];
        let old = existing(old_draft);

        let mut hero = asset("b");
        hero.tags = vec!["hero".into()];
        let mut new = ResourceDraft::new(ResourceKind::Product, "p")
            .with_name("en", "Trail Runner")
            .with_category(category("b"))
            .with_category(category("c"))
            .with_custom(
                CustomFields::new(type_ref)
                    .with_field("color", json!("blue"))
                    .with_field("size", json!("M")),
            )
            .with_asset(asset("d"))
            .with_asset(hero)
            .with_asset(asset("a"))
            .with_variant(
                VariantDraft::new("v1")
                    .with_sku("s1b")
                    .with_attribute(Attribute::plain("color", json!("blue")))
                    .with_attribute(Attribute::plain("size", json!("M")))
                    .with_price(PriceDraft::new(Money::new("USD", 25)).with_key("p2"))
                    .with_price(PriceDraft::new(Money::new("GBP", 5)).with_key("p3")),
            )
            .with_variant(VariantDraft::new("v2").with_sku("s2"))
            .with_line_item(LineItemDraft::new("sku-1", 3))
            .with_line_item(LineItemDraft::new("sku-2", 1));
        new.category_order_hints = vec![CategoryOrderHint { category: category("c"), hint: "0.3".into() }];
        (old, new)
    }

    #[test]
    fn test_applied_actions_leave_nothing_to_do() {
        let (mut old, new) = rich_pair();
        let engine = DiffEngine::new(DiffOptions::default());

        let outcome = engine.diff(&old, &new).unwrap();
        assert!(!outcome.actions.is_empty());
        assert_eq!(engine.diff(&old, &new).unwrap(), outcome);

        old.apply(&outcome.actions).unwrap();
        assert_eq!(engine.diff(&old, &new).unwrap().actions, vec![]);
    }

    #[test]
    fn test_draft_of_existing_state_yields_no_actions() {
        let (_, new) = rich_pair();
        let engine = DiffEngine::new(DiffOptions::default());
        let created = existing(new.clone());
        assert_eq!(engine.diff(&created, &new).unwrap(), DiffOutcome::default());
    }
}
