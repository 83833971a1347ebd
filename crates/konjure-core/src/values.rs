//! Helm values with ordered directive merging
//!
//! Mirrors how Helm composes `--values`, `--set`, `--set-string` and
//! `--set-file`: every directive produces a partial document that is merged
//! over the accumulator, so later directives win at the same path.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};
use crate::schema::{MergeSchema, merge_two};
use crate::spec::HelmValue;

/// Values container with deep merge capability
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Values(pub JsonValue);

impl Values {
    /// Create empty values
    pub fn new() -> Self {
        Self(JsonValue::Object(serde_json::Map::new()))
    }

    /// Load values from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse values from YAML string; an empty document is empty values
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let value: JsonValue = serde_yaml::from_str(yaml)?;
        if value.is_null() {
            return Ok(Self::new());
        }
        Ok(Self(value))
    }

    /// Deep merge another Values into this one
    ///
    /// Rules:
    /// - Scalars: overlay replaces base
    /// - Objects: recursive merge
    /// - Arrays: overlay replaces base (unless a schema says otherwise)
    pub fn merge(&mut self, overlay: &Values) {
        merge_two(&mut self.0, &overlay.0, None);
    }

    /// Deep merge using the list/map strategies of a merge schema
    pub fn merge_with_schema(&mut self, overlay: &Values, schema: Option<&MergeSchema>) {
        merge_two(&mut self.0, &overlay.0, schema);
    }

    /// Set a value by Helm key path (e.g., `image.tag`, `hosts[0].name`)
    pub fn set(&mut self, path: &str, value: JsonValue) -> Result<()> {
        let segments = parse_key_path(path)?;
        set_path(&mut self.0, &segments, value);
        Ok(())
    }

    /// Get a value by dotted path
    pub fn get(&self, path: &str) -> Option<&JsonValue> {
        path.split('.').try_fold(&self.0, |current, key| match current {
            JsonValue::Object(map) => map.get(key),
            _ => None,
        })
    }

    /// Get the inner JSON value
    pub fn inner(&self) -> &JsonValue {
        &self.0
    }

    /// Convert to JSON value
    pub fn into_inner(self) -> JsonValue {
        self.0
    }

    /// Check if values are empty
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            JsonValue::Object(map) => map.is_empty(),
            JsonValue::Null => true,
            _ => false,
        }
    }

    /// Render as a YAML document
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.0)?)
    }
}

// =============================================================================
// DIRECTIVE MERGING
// =============================================================================

/// Merges ordered value directives into a single document
#[derive(Debug, Clone, Default)]
pub struct ValuesMerger {
    /// Directory used to resolve relative file references
    base_dir: PathBuf,
    schema: Option<MergeSchema>,
}

impl ValuesMerger {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            schema: None,
        }
    }

    /// Use a merge schema to tune list merging
    pub fn with_schema(mut self, schema: MergeSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Apply every directive in order
    pub fn merge(&self, directives: &[HelmValue]) -> Result<Values> {
        let mut values = Values::new();
        for directive in directives {
            for overlay in self.resolve(directive)? {
                values.merge_with_schema(&overlay, self.schema.as_ref());
            }
        }
        Ok(values)
    }

    fn resolve(&self, directive: &HelmValue) -> Result<Vec<Values>> {
        match directive {
            HelmValue::File(pattern) => self
                .expand_glob(pattern)?
                .into_iter()
                .map(Values::from_file)
                .collect(),
            HelmValue::Set { name, value } => {
                let value = match value {
                    serde_yaml::Value::String(s) => parse_value(s, SetMode::Typed)?,
                    other => serde_json::to_value(other)?,
                };
                Ok(vec![single(name, value)?])
            }
            HelmValue::SetString { name, value } => {
                Ok(vec![single(name, parse_value(value, SetMode::String)?)?])
            }
            HelmValue::SetFile { name, path } => {
                let content = std::fs::read_to_string(self.resolve_path(path))?;
                Ok(vec![single(name, JsonValue::String(content))?])
            }
        }
    }

    fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    fn expand_glob(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        let full = self.resolve_path(pattern);
        let full_str = full.to_string_lossy();

        let mut matches: Vec<PathBuf> = glob::glob(&full_str)
            .map_err(|e| CoreError::ValuesMerge {
                message: format!("invalid values file pattern '{}': {}", pattern, e),
            })?
            .filter_map(|entry| entry.ok())
            .collect();
        matches.sort();

        if matches.is_empty() {
            return Err(CoreError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("values file not found: {}", full.display()),
            )));
        }
        Ok(matches)
    }
}

fn single(name: &str, value: JsonValue) -> Result<Values> {
    let mut values = Values::new();
    values.set(name, value)?;
    Ok(values)
}

// =============================================================================
// --set PARSING
// =============================================================================

/// How `--set` style values are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetMode {
    /// `--set`: infer booleans, null and integers
    Typed,
    /// `--set-string`: everything is a string
    String,
}

/// Split a `--set` expression into `(name, value)` pairs
///
/// Commas separate assignments except when escaped (`\,`) or inside a
/// `{a,b}` list literal.
pub fn split_set_expression(expr: &str) -> Result<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut chars = expr.chars();

    let mut finish = |part: &str| -> Result<()> {
        if part.is_empty() {
            return Ok(());
        }
        let (name, value) = split_unescaped(part, '=').ok_or_else(|| CoreError::ValuesMerge {
            message: format!("key '{}' has no value", part),
        })?;
        pairs.push((name, value));
        Ok(())
    };

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                current.push(c);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            '{' => {
                depth += 1;
                current.push(c);
            }
            '}' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => {
                finish(&current)?;
                current.clear();
            }
            _ => current.push(c),
        }
    }
    finish(&current)?;

    Ok(pairs)
}

fn split_unescaped(s: &str, sep: char) -> Option<(String, String)> {
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == sep {
            return Some((s[..i].to_string(), s[i + c.len_utf8()..].to_string()));
        }
    }
    None
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Parse one `--set` value, including `{a,b}` list literals
pub fn parse_value(raw: &str, mode: SetMode) -> Result<JsonValue> {
    if let Some(inner) = raw.strip_prefix('{').and_then(|r| r.strip_suffix('}')) {
        if inner.is_empty() {
            return Ok(JsonValue::Array(vec![]));
        }
        let items = split_list(inner)
            .iter()
            .map(|item| scalar(&unescape(item), mode))
            .collect();
        return Ok(JsonValue::Array(items));
    }
    Ok(scalar(&unescape(raw), mode))
}

fn split_list(inner: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                current.push(c);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            ',' => items.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    items.push(current);
    items
}

/// Helm's scalar typing: booleans, null and integers without leading zeros
fn scalar(value: &str, mode: SetMode) -> JsonValue {
    if mode == SetMode::String {
        return JsonValue::String(value.to_string());
    }
    match value {
        "true" => JsonValue::Bool(true),
        "false" => JsonValue::Bool(false),
        "null" => JsonValue::Null,
        "0" => JsonValue::Number(0.into()),
        _ => {
            let digits = value.strip_prefix('-').unwrap_or(value);
            let leading_zero = digits.starts_with('0');
            match value.parse::<i64>() {
                Ok(n) if !leading_zero => JsonValue::Number(n.into()),
                _ => JsonValue::String(value.to_string()),
            }
        }
    }
}

/// Parse `--set` arguments into a single document
pub fn parse_set_values(set_args: &[String], mode: SetMode) -> Result<Values> {
    let mut values = Values::new();
    for arg in set_args {
        for (name, raw) in split_set_expression(arg)? {
            let overlay = single(&name, parse_value(&raw, mode)?)?;
            values.merge(&overlay);
        }
    }
    Ok(values)
}

// =============================================================================
// KEY PATHS
// =============================================================================

/// One step of a Helm key path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Largest list index a key path may address, as in Helm
pub const MAX_INDEX: usize = 65536;

/// Parse `a.b[0].c` (with `\.` escapes) into segments
pub fn parse_key_path(path: &str) -> Result<Vec<PathSegment>> {
    let invalid = |message: &str| CoreError::ValuesMerge {
        message: format!("invalid key '{}': {}", path, message),
    };

    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            '.' => {
                if !current.is_empty() {
                    segments.push(PathSegment::Key(std::mem::take(&mut current)));
                } else if !matches!(segments.last(), Some(PathSegment::Index(_))) {
                    return Err(invalid("empty key segment"));
                }
            }
            '[' => {
                if !current.is_empty() {
                    segments.push(PathSegment::Key(std::mem::take(&mut current)));
                }
                let mut digits = String::new();
                for d in chars.by_ref() {
                    if d == ']' {
                        break;
                    }
                    digits.push(d);
                }
                let index = digits
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| invalid("list index must be a non-negative integer"))?;
                if index > MAX_INDEX {
                    return Err(invalid(&format!("list index exceeds {}", MAX_INDEX)));
                }
                segments.push(PathSegment::Index(index));
            }
            _ => current.push(c),
        }
    }

    if !current.is_empty() {
        segments.push(PathSegment::Key(current));
    }
    if segments.is_empty() {
        return Err(invalid("empty key"));
    }
    Ok(segments)
}

fn set_path(target: &mut JsonValue, segments: &[PathSegment], value: JsonValue) {
    let Some((first, rest)) = segments.split_first() else {
        *target = value;
        return;
    };

    match first {
        PathSegment::Key(key) => {
            if !target.is_object() {
                *target = JsonValue::Object(serde_json::Map::new());
            }
            if let JsonValue::Object(map) = target {
                let entry = map.entry(key.clone()).or_insert(JsonValue::Null);
                set_path(entry, rest, value);
            }
        }
        PathSegment::Index(index) => {
            if !target.is_array() {
                *target = JsonValue::Array(Vec::new());
            }
            if let JsonValue::Array(items) = target {
                if items.len() <= *index {
                    items.resize(*index + 1, JsonValue::Null);
                }
                set_path(&mut items[*index], rest, value);
            }
        }
    }
}
