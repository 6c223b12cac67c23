use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// The kinds of catalog resources a reference can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceKind {
    #[default]
    Product,
    Category,
    ShoppingList,
    ProductType,
    Type,
    Channel,
    CustomerGroup,
    State,
    TaxCategory,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 9] = [
        ResourceKind::Product,
        ResourceKind::Category,
        ResourceKind::ShoppingList,
        ResourceKind::ProductType,
        ResourceKind::Type,
        ResourceKind::Channel,
        ResourceKind::CustomerGroup,
        ResourceKind::State,
        ResourceKind::TaxCategory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Product => "product",
            ResourceKind::Category => "category",
            ResourceKind::ShoppingList => "shopping-list",
            ResourceKind::ProductType => "product-type",
            ResourceKind::Type => "type",
            ResourceKind::Channel => "channel",
            ResourceKind::CustomerGroup => "customer-group",
            ResourceKind::State => "state",
            ResourceKind::TaxCategory => "tax-category",
        }
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user-facing key qualified by the kind of resource it names.
///
/// Keys are only unique within a kind, so every lookup table in the crate
/// (the key/id cache, the missing-key sets of waiting drafts) is keyed by
/// this pair rather than by the bare string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    pub kind: ResourceKind,
    pub key: String,
}

impl ResourceKey {
    pub fn new(kind: ResourceKind, key: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
        }
    }
}

impl Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.key)
    }
}

/// A pointer to another resource.
///
/// `Id` references are taken as-is. `Key` references must be translated
/// to an id before anything is sent to the target store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "camelCase")]
pub enum Reference {
    Id { kind: ResourceKind, id: String },
    Key { kind: ResourceKind, key: String },
}

impl Reference {
    pub fn by_id(kind: ResourceKind, id: impl Into<String>) -> Self {
        Reference::Id { kind, id: id.into() }
    }

    pub fn by_key(kind: ResourceKind, key: impl Into<String>) -> Self {
        Reference::Key {
            kind,
            key: key.into(),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            Reference::Id { kind, .. } | Reference::Key { kind, .. } => *kind,
        }
    }

    /// The resolved id, if this reference has one.
    pub fn id(&self) -> Option<&str> {
        match self {
            Reference::Id { id, .. } => Some(id),
            Reference::Key { .. } => None,
        }
    }

    /// The key still waiting for resolution, if any.
    pub fn unresolved_key(&self) -> Option<ResourceKey> {
        match self {
            Reference::Id { .. } => None,
            Reference::Key { kind, key } => Some(ResourceKey::new(*kind, key.clone())),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Reference::Id { .. })
    }
}

impl Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Id { kind, id } => write!(f, "{kind}#{id}"),
            Reference::Key { kind, key } => write!(f, "{kind}:{key}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_key_display_is_kind_qualified() {
        let key = ResourceKey::new(ResourceKind::ShoppingList, "weekly");
        assert_eq!(key.to_string(), "shopping-list:weekly");
    }

    #[test]
    fn test_reference_serializes_with_tag() {
        let reference = Reference::by_key(ResourceKind::Category, "shoes");
        let json = serde_json::to_value(&reference).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "by": "key", "kind": "category", "key": "shoes" })
        );
        assert_eq!(
            reference.unresolved_key(),
            Some(ResourceKey::new(ResourceKind::Category, "shoes"))
        );
        assert!(Reference::by_id(ResourceKind::Category, "c-1").is_resolved());
    }
}
