//! Merge schemas
//!
//! A merge schema is a subset of an OpenAPI / `values.schema.json` document
//! that only carries the structural merge directives:
//!
//! - `x-kubernetes-list-type`: `atomic` (replace, default), `set` (union of
//!   scalars) or `map` (merge entries with equal `x-kubernetes-list-map-keys`)
//! - `x-kubernetes-map-type`: `granular` (merge, default) or `atomic` (replace)
//!
//! Any other JSON schema keyword is ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{CoreError, Result};

/// List merge strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListType {
    #[default]
    Atomic,
    Set,
    Map,
}

/// Map merge strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapType {
    #[default]
    Granular,
    Atomic,
}

/// Merge directives for one level of a document
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeSchema {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, MergeSchema>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<MergeSchema>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<Box<AdditionalProperties>>,

    #[serde(default, rename = "x-kubernetes-list-type")]
    pub list_type: ListType,

    #[serde(
        default,
        rename = "x-kubernetes-list-map-keys",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub list_map_keys: Vec<String>,

    #[serde(default, rename = "x-kubernetes-map-type")]
    pub map_type: MapType,
}

/// `additionalProperties` is either a boolean or a nested schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AdditionalProperties {
    Allowed(bool),
    Schema(MergeSchema),
}

impl MergeSchema {
    /// Parse a schema from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| CoreError::InvalidSchema {
            message: e.to_string(),
        })
    }

    /// Load a schema file (JSON or YAML)
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let is_json = path.extension().is_some_and(|e| e == "json");
        if is_json {
            Self::from_json(&content)
        } else {
            serde_yaml::from_str(&content).map_err(|e| CoreError::InvalidSchema {
                message: e.to_string(),
            })
        }
    }

    /// Schema for a named property, if any
    pub fn property(&self, name: &str) -> Option<&MergeSchema> {
        self.properties.get(name).or(match self.additional_properties.as_deref() {
            Some(AdditionalProperties::Schema(schema)) => Some(schema),
            _ => None,
        })
    }

    /// Merge `src` into `dest` following the directives
    pub fn merge(&self, dest: &mut JsonValue, src: &JsonValue) {
        merge_two(dest, src, Some(self));
    }
}

/// Structural merge of two documents; `src` wins on scalars
///
/// Without a schema, maps merge recursively and lists are replaced.
pub fn merge_two(dest: &mut JsonValue, src: &JsonValue, schema: Option<&MergeSchema>) {
    match (dest, src) {
        (JsonValue::Object(dest_map), JsonValue::Object(src_map))
            if schema.map(|s| s.map_type) != Some(MapType::Atomic) =>
        {
            for (key, src_value) in src_map {
                let child = schema.and_then(|s| s.property(key));
                match dest_map.get_mut(key) {
                    Some(dest_value) => merge_two(dest_value, src_value, child),
                    None => {
                        dest_map.insert(key.clone(), src_value.clone());
                    }
                }
            }
        }
        (JsonValue::Array(dest_items), JsonValue::Array(src_items)) => {
            let list_type = schema.map(|s| s.list_type).unwrap_or_default();
            match list_type {
                ListType::Atomic => *dest_items = src_items.clone(),
                ListType::Set => {
                    for item in src_items {
                        if !dest_items.contains(item) {
                            dest_items.push(item.clone());
                        }
                    }
                }
                ListType::Map => {
                    let keys = schema.map(|s| s.list_map_keys.as_slice()).unwrap_or(&[]);
                    let item_schema = schema.and_then(|s| s.items.as_deref());
                    for item in src_items {
                        match dest_items.iter_mut().find(|d| same_list_key(d, item, keys)) {
                            Some(existing) => merge_two(existing, item, item_schema),
                            None => dest_items.push(item.clone()),
                        }
                    }
                }
            }
        }
        (dest, src) => *dest = src.clone(),
    }
}

fn same_list_key(a: &JsonValue, b: &JsonValue, keys: &[String]) -> bool {
    if keys.is_empty() {
        return a == b;
    }
    keys.iter().all(|k| {
        // Missing keys compare equal to an empty string (e.g. the core group)
        let get = |v: &JsonValue| v.get(k).cloned().unwrap_or(JsonValue::String(String::new()));
        get(a) == get(b)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn component_schema() -> MergeSchema {
        MergeSchema::from_json(
            r#"{
              "properties": {
                "componentKinds": {
                  "type": "array",
                  "x-kubernetes-list-type": "map",
                  "x-kubernetes-list-map-keys": ["group", "kind"]
                },
                "keywords": { "type": "array", "x-kubernetes-list-type": "set" },
                "labels": { "type": "object", "x-kubernetes-map-type": "atomic" }
              }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_merge_without_schema_replaces_lists() {
        let mut dest = json!({"a": {"b": 1, "c": [1, 2]}, "d": "x"});
        merge_two(&mut dest, &json!({"a": {"c": [3]}, "e": true}), None);
        assert_eq!(dest, json!({"a": {"b": 1, "c": [3]}, "d": "x", "e": true}));
    }

    #[test]
    fn test_list_map_deduplicates_by_keys() {
        let schema = component_schema();
        let mut dest = json!({"componentKinds": [{"group": "apps", "kind": "Deployment"}]});
        schema.merge(
            &mut dest,
            &json!({"componentKinds": [
                {"group": "apps", "kind": "Deployment"},
                {"kind": "Service"}
            ]}),
        );
        assert_eq!(
            dest,
            json!({"componentKinds": [
                {"group": "apps", "kind": "Deployment"},
                {"kind": "Service"}
            ]})
        );

        // A core group written as an empty string matches a missing group
        schema.merge(&mut dest, &json!({"componentKinds": [{"group": "", "kind": "Service"}]}));
        assert_eq!(dest["componentKinds"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_set_and_atomic_map() {
        let schema = component_schema();
        let mut dest = json!({"keywords": ["a", "b"], "labels": {"x": "1"}});
        schema.merge(&mut dest, &json!({"keywords": ["b", "c"], "labels": {"y": "2"}}));
        assert_eq!(dest, json!({"keywords": ["a", "b", "c"], "labels": {"y": "2"}}));
    }

    #[test]
    fn test_additional_properties_schema() {
        let schema = MergeSchema::from_json(
            r#"{"additionalProperties": {"x-kubernetes-list-type": "set"}}"#,
        )
        .unwrap();
        let mut dest = json!({"any": [1]});
        schema.merge(&mut dest, &json!({"any": [1, 2]}));
        assert_eq!(dest, json!({"any": [1, 2]}));
    }

    #[test]
    fn test_invalid_schema() {
        assert!(MergeSchema::from_json(r#"{"x-kubernetes-list-type": "bogus"}"#).is_err());
    }
}
