use crate::model::ResourceKey;
use dashmap::DashMap;
use std::sync::Arc;

/// Concurrent key ↔ id lookup table.
///
/// Never evicts. The coordinator warms it from the target store before
/// resolving a sub-batch and adds every key it creates along the way.
#[derive(Debug, Clone, Default)]
pub struct KeyValueCache {
    ids: Arc<DashMap<ResourceKey, String>>,
    keys: Arc<DashMap<String, ResourceKey>>,
}

impl KeyValueCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&self, key: &ResourceKey) -> Option<String> {
        self.ids.get(key).map(|id| id.value().clone())
    }

    pub fn put(&self, key: ResourceKey, id: String) {
        self.keys.insert(id.clone(), key.clone());
        self.ids.insert(key, id);
    }

    pub fn put_all(&self, entries: impl IntoIterator<Item = (ResourceKey, String)>) {
        for (key, id) in entries {
            self.put(key, id);
        }
    }

    /// Reverse lookup.
    pub fn key_of(&self, id: &str) -> Option<ResourceKey> {
        self.keys.get(id).map(|key| key.value().clone())
    }

    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.ids.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResourceKind;

    #[test]
    fn test_put_and_resolve_both_ways() {
        let cache = KeyValueCache::new();
        let shoes = ResourceKey::new(ResourceKind::Category, "shoes");
        assert!(cache.resolve(&shoes).is_none());

        cache.put(shoes.clone(), "cat-1".into());
        assert_eq!(cache.resolve(&shoes).as_deref(), Some("cat-1"));
        assert_eq!(cache.key_of("cat-1"), Some(shoes));
        assert!(cache.key_of("cat-2").is_none());
    }

    #[test]
    fn test_kinds_do_not_collide() {
        let cache = KeyValueCache::new();
        cache.put_all([
            (ResourceKey::new(ResourceKind::Category, "summer"), "cat-1".to_string()),
            (ResourceKey::new(ResourceKind::Product, "summer"), "prod-1".to_string()),
        ]);
        assert_eq!(cache.len(), 2);
        assert_eq!(
            cache.resolve(&ResourceKey::new(ResourceKind::Product, "summer")).as_deref(),
            Some("prod-1")
        );
    }

    #[test]
    fn test_clones_share_entries() {
        let cache = KeyValueCache::new();
        let clone = cache.clone();
        clone.put(ResourceKey::new(ResourceKind::Type, "t"), "type-1".into());
        assert!(cache.contains(&ResourceKey::new(ResourceKind::Type, "t")));
    }
}
