//! Catalog records

use serde::{Deserialize, Serialize};

/// A catalog entry for one image acquisition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogRecord {
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(rename = "type", default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
    /// Any fields not modelled above.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CatalogRecord {
    /// String-valued property, if present.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(|v| v.as_str())
    }
}
