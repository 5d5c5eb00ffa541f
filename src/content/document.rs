//! Category document model
//!
//! Mirrors the CMS `category` collection. Documents are replaced wholesale
//! on every mutation, so every field other than `index` is optional and is
//! pruned from the payload when absent rather than sent as `null`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::index::IndexItem;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDocument {
    pub title: Option<String>,
    pub uri: Option<String>,
    pub guid: Option<String>,
    /// Rich-text AST or markdown string; passed through untouched
    pub body: Option<Value>,
    #[serde(default)]
    pub index: Vec<IndexItem>,
    pub created: Option<String>,
    pub created_by: Option<String>,
    pub last_updated: Option<String>,
    pub last_updated_by: Option<String>,
    pub is_archived: Option<bool>,
    #[serde(rename = "archivedreason")]
    pub archived_reason: Option<String>,
    pub redirects: Option<Vec<String>>,
}

impl CategoryDocument {
    /// Build the mutation params for this document with `index` replaced
    ///
    /// Unresolvable index entries are dropped, and `null` values are pruned
    /// at every level so the CMS does not clear fields we never read.
    pub fn mutation_params(&self, index: &[IndexItem]) -> Value {
        let mut fields = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };

        let persisted: Vec<Value> = index
            .iter()
            .filter_map(IndexItem::to_persisted)
            .filter_map(|item| serde_json::to_value(item).ok())
            .collect();
        fields.insert("index".to_string(), Value::Array(persisted));

        let mut params = Value::Object(fields);
        prune_nulls(&mut params);
        params
    }
}

/// Remove `null` members from objects, recursively
pub fn prune_nulls(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            for v in map.values_mut() {
                prune_nulls(v);
            }
        }
        Value::Array(items) => {
            for v in items.iter_mut() {
                prune_nulls(v);
            }
        }
        _ => {}
    }
}
