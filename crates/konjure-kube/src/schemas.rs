//! Bundled merge schemas
//!
//! Process-wide registry of the merge schemas used when duplicate resources
//! are collapsed, keyed by group and kind. Built on first use.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use konjure_core::{GroupKind, MergeSchema};

const APPLICATION_SCHEMA: &str = include_str!("../schema/application.json");

static SCHEMAS: Lazy<HashMap<GroupKind, MergeSchema>> = Lazy::new(|| {
    let mut schemas = HashMap::new();
    schemas.insert(
        GroupKind::new("app.k8s.io", "Application"),
        MergeSchema::from_json(APPLICATION_SCHEMA).expect("bundled application schema is valid"),
    );
    schemas
});

/// Merge schema registered for a group and kind
pub fn schema_for(group_kind: &GroupKind) -> Option<&'static MergeSchema> {
    SCHEMAS.get(group_kind)
}
