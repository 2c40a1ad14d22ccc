//! Remote record model

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One authoritative record as the remote store represents it on the wire.
///
/// The protocol envelope (`id`, `created`, `updated`, `collectionId`,
/// `collectionName`, `expand`) is split out; every other key lands in
/// `fields` and is treated as business data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    /// Server-assigned identifier, unique within its collection
    pub id: String,
    /// Creation timestamp as the remote store formats it
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub created: String,
    /// Last-update timestamp as the remote store formats it
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub updated: String,
    /// Collection identifier (protocol metadata)
    #[serde(default, rename = "collectionId", skip_serializing_if = "String::is_empty")]
    pub collection_id: String,
    /// Collection name (protocol metadata)
    #[serde(default, rename = "collectionName", skip_serializing_if = "String::is_empty")]
    pub collection_name: String,
    /// Optional relation expansion payload (protocol metadata)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expand: Option<Value>,
    /// Business fields
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl RemoteRecord {
    /// Look up a business field by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}
