use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{self, Display};

/// A schemaless JSON document addressed by `(container, key)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomObject {
    pub id: String,
    pub version: u64,
    pub container: String,
    pub key: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomObjectKey {
    pub container: String,
    pub key: String,
}

impl CustomObjectKey {
    pub fn new(container: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            key: key.into(),
        }
    }
}

impl Display for CustomObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.container, self.key)
    }
}

/// Payload for creating or replacing a custom object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomObjectDraft {
    pub container: String,
    pub key: String,
    pub value: Value,
}

/// Selects custom objects in one container. With `array_contains` set to
/// `(pointer, element)`, only objects whose JSON array at `pointer` holds
/// `element` match.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomObjectQuery {
    pub container: String,
    pub array_contains: Option<(String, Value)>,
}
