//! Application aggregation
//!
//! Reconciles `app.k8s.io/v1beta1` `Application` resources with the stream
//! around them. Applications with the same namespace and name are collapsed
//! into one, each application claims the resources it owns (same namespace,
//! a listed component kind and labels matching its selector) and the output
//! is the aggregated applications, optionally preceded by whatever nothing
//! claimed.
//!
//! When label scanning is enabled, unclaimed resources carrying the
//! recommended `app.kubernetes.io/*` labels (or a `helm.sh/chart` label) give
//! rise to synthesized applications. Synthesis happens in a single pass.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_yaml::{Mapping, Value};

use konjure_core::{GroupKind, Node, Selector, merge_two};

use crate::error::{FilterError, Result};
use crate::filters::Filter;
use crate::labels;
use crate::schemas::schema_for;

pub const APPLICATION_GROUP: &str = "app.k8s.io";
pub const APPLICATION_API_VERSION: &str = "app.k8s.io/v1beta1";
pub const APPLICATION_KIND: &str = "Application";

/// `<chart>-<MAJOR.MINOR.PATCH...>`
static CHART_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+?)-(\d+\.\d+\.\d+.*)$").expect("valid chart version regex"));

/// Split a `helm.sh/chart` label into chart name and version
///
/// The version must be valid semver, otherwise the whole label is the name.
pub fn split_helm_chart(chart: &str) -> (String, String) {
    if let Some(caps) = CHART_VERSION.captures(chart) {
        let version = &caps[2];
        if semver::Version::parse(version).is_ok() {
            return (caps[1].to_string(), version.to_string());
        }
    }
    (chart.to_string(), String::new())
}

pub fn is_application(node: &Node) -> bool {
    node.kind() == APPLICATION_KIND && node.group() == APPLICATION_GROUP
}

// =============================================================================
// INDEX
// =============================================================================

/// An application with its decoded selector and component kinds
#[derive(Debug, Clone)]
pub struct ApplicationNode {
    node: Node,
    selector: Selector,
    component_kinds: Vec<GroupKind>,
}

impl ApplicationNode {
    fn decode(node: Node) -> Result<Self> {
        let selector = match node.lookup(&["spec", "selector"]) {
            Some(value) if !value.is_null() => {
                let invalid = |message: String| FilterError::InvalidApplicationSelector {
                    application: node.display_name(),
                    message,
                };
                let label_selector: LabelSelector =
                    serde_yaml::from_value(value.clone()).map_err(|e| invalid(e.to_string()))?;
                Selector::from_label_selector(&label_selector).map_err(|e| invalid(e.to_string()))?
            }
            _ => Selector::everything(),
        };

        let component_kinds = match node.lookup(&["spec", "componentKinds"]) {
            Some(Value::Sequence(items)) => items
                .iter()
                .filter_map(|item| {
                    let kind = item.get("kind")?.as_str()?;
                    let group = item.get("group").and_then(Value::as_str).unwrap_or_default();
                    Some(GroupKind::new(normalize_group(group), kind))
                })
                .collect(),
            _ => Vec::new(),
        };

        Ok(Self {
            node,
            selector,
            component_kinds,
        })
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    pub fn component_kinds(&self) -> &[GroupKind] {
        &self.component_kinds
    }

    /// Does this application own the resource?
    pub fn owns(&self, node: &Node) -> bool {
        node.namespace() == self.node.namespace()
            && self.component_kinds.iter().any(|gk| gk.matches(node))
            && self.selector.matches(&node.labels())
    }
}

/// The core group may be spelled `core` or `v1` in a component kind
fn normalize_group(group: &str) -> &str {
    match group {
        "core" | "v1" => "",
        other => other,
    }
}

/// Applications keyed by namespace and name, in first-seen order
#[derive(Debug, Default)]
struct ApplicationIndex {
    applications: Vec<ApplicationNode>,
}

impl ApplicationIndex {
    fn add(&mut self, node: Node) -> Result<()> {
        let existing = self
            .applications
            .iter()
            .position(|a| a.node.name() == node.name() && a.node.namespace() == node.namespace());

        let Some(index) = existing else {
            self.applications.push(ApplicationNode::decode(node)?);
            return Ok(());
        };

        let current = &self.applications[index].node;
        let mut merged = serde_json::to_value(current.value())?;
        let src = serde_json::to_value(node.value())?;
        merge_two(&mut merged, &src, schema_for(&current.group_kind()));

        let mut merged_node = Node::new(serde_yaml::to_value(&merged)?);
        if let Some(comment) = current.head_comment() {
            merged_node.set_head_comment(comment);
        }
        self.applications[index] = ApplicationNode::decode(merged_node)?;
        Ok(())
    }

    /// Remove the nodes owned by an indexed application
    fn claim(&self, nodes: &mut Vec<Node>) {
        nodes.retain(|node| {
            let owner = self.applications.iter().find(|app| app.owns(node));
            if let Some(app) = owner {
                tracing::debug!(resource = %node.display_name(), application = %app.node.display_name(), "claimed");
            }
            owner.is_none()
        });
    }

    fn into_nodes(self) -> Vec<Node> {
        self.applications.into_iter().map(|a| a.node).collect()
    }
}

// =============================================================================
// FILTER
// =============================================================================

/// Aggregates resources into applications
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplicationFilter {
    /// Keep resources no application claims
    pub show_unowned: bool,
    /// Synthesize applications from recommended labels
    pub scan_app_labels: bool,
}

impl ApplicationFilter {
    pub fn new(show_unowned: bool, scan_app_labels: bool) -> Self {
        Self {
            show_unowned,
            scan_app_labels,
        }
    }
}

impl Filter for ApplicationFilter {
    fn filter(&self, nodes: Vec<Node>) -> Result<Vec<Node>> {
        let (applications, mut unclaimed): (Vec<Node>, Vec<Node>) =
            nodes.into_iter().partition(is_application);

        let mut index = ApplicationIndex::default();
        for application in applications {
            index.add(application)?;
        }
        index.claim(&mut unclaimed);

        if self.scan_app_labels {
            let synthesized: Vec<Node> = unclaimed.iter().filter_map(synthesize).collect();
            if !synthesized.is_empty() {
                tracing::debug!(count = synthesized.len(), "synthesized applications from labels");
                for application in synthesized {
                    index.add(application)?;
                }
                index.claim(&mut unclaimed);
            }
        }

        let mut result = if self.show_unowned {
            unclaimed
        } else {
            Vec::new()
        };
        result.extend(index.into_nodes());
        Ok(result)
    }
}

/// Build an application from the recommended labels of a resource
pub fn synthesize(node: &Node) -> Option<Node> {
    let node_labels = node.labels();
    let label = |key: &str| node_labels.get(key).filter(|v| !v.is_empty()).cloned();

    let mut name = label(labels::APP_NAME);
    let mut version = label(labels::APP_VERSION);
    let instance = label(labels::APP_INSTANCE);
    let part_of = label(labels::APP_PART_OF);

    if name.is_none() || version.is_none() {
        if let Some(chart) = label(labels::HELM_CHART) {
            let (chart_name, chart_version) = split_helm_chart(&chart);
            name = name.or(Some(chart_name));
            if !chart_version.is_empty() {
                version = version.or(Some(chart_version));
            }
        }
    }

    let (app_name, descriptor_type) = match (&instance, &name) {
        (Some(instance), _) => (instance.clone(), part_of.or_else(|| name.clone())),
        (None, Some(name)) => (name.clone(), part_of),
        (None, None) => return None,
    };

    let mut match_labels = Mapping::new();
    for key in [labels::APP_NAME, labels::APP_INSTANCE] {
        if let Some(value) = label(key) {
            match_labels.insert(key.into(), value.into());
        }
    }
    // Named from the chart alone: select on the chart label
    if match_labels.is_empty() {
        if let Some(chart) = label(labels::HELM_CHART) {
            match_labels.insert(labels::HELM_CHART.into(), chart.into());
        }
    }

    let mut component_kind = Mapping::new();
    component_kind.insert("group".into(), node.group().into());
    component_kind.insert("kind".into(), node.kind().into());

    let mut descriptor = Mapping::new();
    if let Some(descriptor_type) = descriptor_type {
        descriptor.insert("type".into(), descriptor_type.into());
    }
    if let Some(version) = version {
        descriptor.insert("version".into(), version.into());
    }

    let mut selector = Mapping::new();
    selector.insert("matchLabels".into(), Value::Mapping(match_labels));

    let mut spec = Mapping::new();
    spec.insert("selector".into(), Value::Mapping(selector));
    spec.insert(
        "componentKinds".into(),
        Value::Sequence(vec![Value::Mapping(component_kind)]),
    );
    if !descriptor.is_empty() {
        spec.insert("descriptor".into(), Value::Mapping(descriptor));
    }

    let mut metadata = Mapping::new();
    metadata.insert("name".into(), app_name.into());
    if !node.namespace().is_empty() {
        metadata.insert("namespace".into(), node.namespace().into());
    }

    let mut application = Mapping::new();
    application.insert("apiVersion".into(), APPLICATION_API_VERSION.into());
    application.insert("kind".into(), APPLICATION_KIND.into());
    application.insert("metadata".into(), Value::Mapping(metadata));
    application.insert("spec".into(), Value::Mapping(spec));

    Some(Node::new(Value::Mapping(application)))
}
