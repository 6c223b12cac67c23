use crate::model::{Reference, ResourceDraft, ResourceKey};
use crate::resolution::KeyValueCache;
use std::collections::BTreeSet;
use tracing::debug;

/// Translates key references into id references through a [`KeyValueCache`].
#[derive(Debug, Clone)]
pub struct ReferenceResolver {
    cache: KeyValueCache,
}

impl ReferenceResolver {
    pub fn new(cache: KeyValueCache) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &KeyValueCache {
        &self.cache
    }

    /// Every key reference in `draft`, nested sub-objects and attribute
    /// values included.
    pub fn collect_key_references(draft: &ResourceDraft) -> BTreeSet<ResourceKey> {
        let mut keys = BTreeSet::new();
        // The walker only hands out mutable references.
        let mut scratch = draft.clone();
        scratch.for_each_reference_mut(&mut |reference: &mut Reference| {
            if let Some(key) = reference.unresolved_key() {
                keys.insert(key);
            }
        });
        keys
    }

    /// A copy of `draft` with every key reference replaced by its id, or the
    /// keys the cache does not know yet.
    pub fn resolve(&self, draft: &ResourceDraft) -> Result<ResourceDraft, BTreeSet<ResourceKey>> {
        let mut resolved = draft.clone();
        let mut missing = BTreeSet::new();
        resolved.for_each_reference_mut(&mut |reference: &mut Reference| {
            if let Some(key) = reference.unresolved_key() {
                match self.cache.resolve(&key) {
                    Some(id) => *reference = Reference::by_id(key.kind, id),
                    None => {
                        missing.insert(key);
                    }
                }
            }
        });

        if missing.is_empty() {
            Ok(resolved)
        } else {
            debug!(key = ?draft.key, missing = missing.len(), "Draft has unresolved references");
            Err(missing)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Attribute, AttributeValue, CustomFields, Money, PriceDraft, ResourceKind, VariantDraft,
    };

    fn draft() -> ResourceDraft {
        let mut price = PriceDraft::new(Money::new("EUR", 100));
        price.channel = Some(Reference::by_key(ResourceKind::Channel, "web"));
        ResourceDraft::new(ResourceKind::Product, "prod-A")
            .with_category(Reference::by_key(ResourceKind::Category, "shoes"))
            .with_custom(CustomFields::new(Reference::by_key(ResourceKind::Type, "fields")))
            .with_variant(
                VariantDraft::new("v1")
                    .with_price(price)
                    .with_attribute(Attribute::new(
                        "related",
                        AttributeValue::Set(vec![AttributeValue::Nested(vec![Attribute::new(
                            "product",
                            AttributeValue::Reference(Reference::by_key(ResourceKind::Product, "prod-B")),
                        )])]),
                    )),
            )
    }

    #[test]
    fn test_collects_references_at_every_depth() {
        let keys = ReferenceResolver::collect_key_references(&draft());
        assert_eq!(
            keys,
            BTreeSet::from([
                ResourceKey::new(ResourceKind::Product, "prod-B"),
                ResourceKey::new(ResourceKind::Category, "shoes"),
                ResourceKey::new(ResourceKind::Type, "fields"),
                ResourceKey::new(ResourceKind::Channel, "web"),
            ])
        );
    }

    #[test]
    fn test_resolve_reports_every_missing_key() {
        let cache = KeyValueCache::new();
        cache.put(ResourceKey::new(ResourceKind::Category, "shoes"), "cat-1".into());
        cache.put(ResourceKey::new(ResourceKind::Type, "fields"), "type-1".into());
        let resolver = ReferenceResolver::new(cache);

        let missing = resolver.resolve(&draft()).unwrap_err();
        assert_eq!(
            missing,
            BTreeSet::from([
                ResourceKey::new(ResourceKind::Product, "prod-B"),
                ResourceKey::new(ResourceKind::Channel, "web"),
            ])
        );
    }

    #[test]
    fn test_resolve_replaces_keys_with_ids() {
        let cache = KeyValueCache::new();
        for (kind, key, id) in [
            (ResourceKind::Category, "shoes", "cat-1"),
            (ResourceKind::Type, "fields", "type-1"),
            (ResourceKind::Channel, "web", "chan-1"),
            (ResourceKind::Product, "prod-B", "prod-2"),
        ] {
            cache.put(ResourceKey::new(kind, key), id.into());
        }
        let resolved = ReferenceResolver::new(cache).resolve(&draft()).unwrap();

        assert_eq!(resolved.categories, vec![Reference::by_id(ResourceKind::Category, "cat-1")]);
        assert!(ReferenceResolver::collect_key_references(&resolved).is_empty());
    }
}
