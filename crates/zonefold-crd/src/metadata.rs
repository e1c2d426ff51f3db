//! Object and type metadata shared by all resources

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Namespace used when an object does not name one
pub const DEFAULT_NAMESPACE: &str = "default";

/// Kubernetes-style object metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Resource name (required)
    pub name: String,

    /// Namespace (optional, defaults to "default")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Unique identifier, assigned by the store on first write
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<Uuid>,

    /// Bumped by the store every time the object changes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,

    /// Labels for organizing resources
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Creation timestamp, assigned by the store
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<chrono::DateTime<chrono::Utc>>,
}

impl ObjectMeta {
    /// Create new metadata with just a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Create new metadata with name and namespace
    pub fn with_namespace(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Some(namespace.into()),
            ..Default::default()
        }
    }

    /// Add a label
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Namespace, falling back to `default`
    pub fn namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE)
    }

    /// Namespace-qualified key identifying this object within its kind
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.namespace(), &self.name)
    }
}

/// `namespace/name` pair identifying a stored object
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Type metadata for resource objects
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TypeMeta {
    /// API version (e.g., "zonefold.dev/v1alpha1")
    pub api_version: String,

    /// Kind ("Zone" or "RecordSet")
    pub kind: String,
}

impl TypeMeta {
    /// Create type metadata for Zone
    pub fn zone() -> Self {
        Self {
            api_version: crate::API_VERSION.to_string(),
            kind: crate::zone::KIND.to_string(),
        }
    }

    /// Create type metadata for RecordSet
    pub fn record_set() -> Self {
        Self {
            api_version: crate::API_VERSION.to_string(),
            kind: crate::recordset::KIND.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_meta_new() {
        let meta = ObjectMeta::new("example.com");
        assert_eq!(meta.name, "example.com");
        assert!(meta.namespace.is_none());
        assert_eq!(meta.namespace(), DEFAULT_NAMESPACE);
        assert!(meta.labels.is_empty());
    }

    #[test]
    fn test_object_key() {
        let meta = ObjectMeta::with_namespace("www", "dns");
        assert_eq!(meta.key(), ObjectKey::new("dns", "www"));
        assert_eq!(meta.key().to_string(), "dns/www");
        assert_eq!(ObjectMeta::new("www").key().to_string(), "default/www");
    }

    #[test]
    fn test_type_meta_kinds() {
        assert_eq!(TypeMeta::zone().api_version, "zonefold.dev/v1alpha1");
        assert_eq!(TypeMeta::zone().kind, "Zone");
        assert_eq!(TypeMeta::record_set().kind, "RecordSet");
    }

    #[test]
    fn test_object_meta_serialization() {
        let meta = ObjectMeta::with_namespace("www", "default").with_label("team", "edge");

        let json = serde_json::to_string(&meta).unwrap();
        assert!(!json.contains("uid"));
        let parsed: ObjectMeta = serde_json::from_str(&json).unwrap();

        assert_eq!(meta, parsed);
    }
}
