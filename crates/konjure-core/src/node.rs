//! Resource nodes
//!
//! A [`Node`] is one YAML document flowing through the pipeline: the value
//! tree plus the document-level comments and the source position needed to
//! restore vertical whitespace when the stream is written back out.

use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;

use crate::error::{CoreError, Result};

/// Annotation carrying the path of the file a node was read from
pub const PATH_ANNOTATION: &str = "config.kubernetes.io/path";

/// Annotation carrying the index of a node within its source file
pub const INDEX_ANNOTATION: &str = "config.kubernetes.io/index";

/// A single resource document
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Node {
    value: Value,
    head_comment: Option<String>,
    foot_comment: Option<String>,
    /// 1-based line of the first content line in the source stream (0 when unknown)
    line: usize,
    /// Number of content lines the document spanned in the source stream
    line_count: usize,
}

impl Node {
    /// Wrap a value tree
    pub fn new(value: Value) -> Self {
        Self {
            value,
            ..Default::default()
        }
    }

    /// Build a node from anything serializable
    pub fn from_serialize<T: serde::Serialize>(value: &T) -> Result<Self> {
        Ok(Self::new(serde_yaml::to_value(value)?))
    }

    /// Parse a single YAML document
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut nodes = crate::yaml::parse_documents(yaml)?;
        match nodes.len() {
            1 => Ok(nodes.remove(0)),
            n => Err(CoreError::MalformedSpec {
                spec: yaml.to_string(),
                message: format!("expected exactly one document, found {}", n),
            }),
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut Value {
        &mut self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Deserialize the node into a typed value
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_yaml::from_value(self.value.clone())?)
    }

    // =========================================================================
    // Type and object metadata
    // =========================================================================

    pub fn api_version(&self) -> &str {
        self.lookup_str(&["apiVersion"]).unwrap_or("")
    }

    pub fn kind(&self) -> &str {
        self.lookup_str(&["kind"]).unwrap_or("")
    }

    /// API group of the node (`""` for the core group)
    pub fn group(&self) -> &str {
        split_api_version(self.api_version()).0
    }

    pub fn version(&self) -> &str {
        split_api_version(self.api_version()).1
    }

    pub fn name(&self) -> &str {
        self.lookup_str(&["metadata", "name"]).unwrap_or("")
    }

    pub fn namespace(&self) -> &str {
        self.lookup_str(&["metadata", "namespace"]).unwrap_or("")
    }

    pub fn group_kind(&self) -> GroupKind {
        GroupKind::new(self.group(), self.kind())
    }

    /// Labels as strings; non-scalar values are ignored
    pub fn labels(&self) -> BTreeMap<String, String> {
        self.string_map(&["metadata", "labels"])
    }

    /// Annotations as strings; non-scalar values are ignored
    pub fn annotations(&self) -> BTreeMap<String, String> {
        self.string_map(&["metadata", "annotations"])
    }

    pub fn set_label(&mut self, key: &str, value: &str) {
        self.set_field(
            &["metadata", "labels", key],
            Value::String(value.to_string()),
        );
    }

    pub fn set_annotation(&mut self, key: &str, value: &str) {
        self.set_field(
            &["metadata", "annotations", key],
            Value::String(value.to_string()),
        );
    }

    /// Is this a `List` (or `*List`) wrapper document?
    pub fn is_list(&self) -> bool {
        self.kind() == "List" || (self.kind().ends_with("List") && self.lookup(&["items"]).is_some())
    }

    /// Human readable identity used in logs and errors
    pub fn display_name(&self) -> String {
        let name = if self.name().is_empty() {
            "unnamed"
        } else {
            self.name()
        };
        if self.namespace().is_empty() {
            format!("{}/{}", self.kind(), name)
        } else {
            format!("{}/{}/{}", self.namespace(), self.kind(), name)
        }
    }

    // =========================================================================
    // Path access
    // =========================================================================

    /// Get a nested value by mapping keys
    pub fn lookup(&self, path: &[&str]) -> Option<&Value> {
        lookup(&self.value, path)
    }

    /// Get a nested string scalar
    pub fn lookup_str(&self, path: &[&str]) -> Option<&str> {
        self.lookup(path).and_then(Value::as_str)
    }

    /// Set a nested value, creating intermediate mappings as needed
    pub fn set_field(&mut self, path: &[&str], new_value: Value) {
        set_field(&mut self.value, path, new_value);
    }

    /// Remove a nested field, returning the removed value
    pub fn remove_field(&mut self, path: &[&str]) -> Option<Value> {
        let (last, parents) = path.split_last()?;
        let mut current = &mut self.value;
        for key in parents {
            current = current.get_mut(*key)?;
        }
        current.as_mapping_mut()?.remove(*last)
    }

    fn string_map(&self, path: &[&str]) -> BTreeMap<String, String> {
        let Some(Value::Mapping(map)) = self.lookup(path) else {
            return BTreeMap::new();
        };
        map.iter()
            .filter_map(|(k, v)| Some((scalar_to_string(k)?, scalar_to_string(v)?)))
            .collect()
    }

    // =========================================================================
    // Comments and source position
    // =========================================================================

    pub fn head_comment(&self) -> Option<&str> {
        self.head_comment.as_deref()
    }

    pub fn set_head_comment(&mut self, comment: impl Into<String>) {
        self.head_comment = Some(comment.into());
    }

    pub fn foot_comment(&self) -> Option<&str> {
        self.foot_comment.as_deref()
    }

    pub fn set_foot_comment(&mut self, comment: impl Into<String>) {
        self.foot_comment = Some(comment.into());
    }

    /// Remove head and foot comments
    pub fn clear_comments(&mut self) {
        self.head_comment = None;
        self.foot_comment = None;
    }

    /// Number of lines occupied by the head and foot comments
    pub fn comment_line_count(&self) -> usize {
        let count = |c: &Option<String>| c.as_ref().map(|c| c.lines().count()).unwrap_or(0);
        count(&self.head_comment) + count(&self.foot_comment)
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn line_count(&self) -> usize {
        self.line_count
    }

    pub fn set_position(&mut self, line: usize, line_count: usize) {
        self.line = line;
        self.line_count = line_count;
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

impl From<Mapping> for Node {
    fn from(map: Mapping) -> Self {
        Self::new(Value::Mapping(map))
    }
}

// =============================================================================
// GROUP / KIND
// =============================================================================

/// An API group and kind pair, e.g. `apps/Deployment`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct GroupKind {
    pub group: String,
    pub kind: String,
}

impl GroupKind {
    pub fn new(group: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            kind: kind.into(),
        }
    }

    /// Does this group/kind describe the node?
    pub fn matches(&self, node: &Node) -> bool {
        self.kind == node.kind() && self.group == node.group()
    }
}

impl std::fmt::Display for GroupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}.{}", self.kind, self.group)
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Split an `apiVersion` into group and version; `v1` yields `("", "v1")`
pub fn split_api_version(api_version: &str) -> (&str, &str) {
    match api_version.rsplit_once('/') {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    }
}

/// Render a YAML scalar as a string
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Get a nested value by mapping keys
pub fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.get(*key))
}

/// Set a nested value, replacing non-mapping intermediates with mappings
pub fn set_field(value: &mut Value, path: &[&str], new_value: Value) {
    let Some((first, rest)) = path.split_first() else {
        *value = new_value;
        return;
    };

    if !value.is_mapping() {
        *value = Value::Mapping(Mapping::new());
    }
    let Value::Mapping(map) = value else {
        return;
    };

    let key = Value::String((*first).to_string());
    if rest.is_empty() {
        map.insert(key, new_value);
    } else {
        let entry = map
            .entry(key)
            .or_insert_with(|| Value::Mapping(Mapping::new()));
        set_field(entry, rest, new_value);
    }
}
