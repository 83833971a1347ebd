//! Typed Konjure specs
//!
//! A Konjure spec is a document whose `apiVersion` belongs to the Konjure
//! group. It describes *where* resources come from rather than a resource to
//! deploy; the expansion engine replaces every spec node with the nodes its
//! reader produces.

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::error::{CoreError, Result};
use crate::node::{Node, split_api_version};
use crate::secrets::{PasswordOptions, PasswordRecipe};

/// API group of Konjure specs
pub const GROUP: &str = "konjure.stormforge.io";

/// API version written on every spec produced by this crate
pub const API_VERSION: &str = "konjure.stormforge.io/v1beta2";

/// All recognized spec kinds
pub const KINDS: &[&str] = &[
    "Resource",
    "File",
    "Git",
    "HTTP",
    "Helm",
    "Jsonnet",
    "Kubernetes",
    "Kustomize",
    "Secret",
];

/// A typed expansion input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Spec {
    Resource(ResourceSpec),
    File(FileSpec),
    Git(GitSpec),
    #[serde(rename = "HTTP")]
    Http(HttpSpec),
    Helm(HelmSpec),
    Jsonnet(JsonnetSpec),
    Kubernetes(KubernetesSpec),
    Kustomize(KustomizeSpec),
    Secret(SecretSpec),
}

impl Spec {
    /// The `kind` this spec serializes with
    pub fn kind(&self) -> &'static str {
        match self {
            Spec::Resource(_) => "Resource",
            Spec::File(_) => "File",
            Spec::Git(_) => "Git",
            Spec::Http(_) => "HTTP",
            Spec::Helm(_) => "Helm",
            Spec::Jsonnet(_) => "Jsonnet",
            Spec::Kubernetes(_) => "Kubernetes",
            Spec::Kustomize(_) => "Kustomize",
            Spec::Secret(_) => "Secret",
        }
    }

    /// Is this node a Konjure spec (any version of the Konjure group)?
    pub fn is_spec_node(node: &Node) -> bool {
        split_api_version(node.api_version()).0 == GROUP
    }

    /// Decode a spec node
    ///
    /// Returns `Ok(None)` for nodes that are not Konjure specs.
    pub fn from_node(node: &Node) -> Result<Option<Spec>> {
        if !Self::is_spec_node(node) {
            return Ok(None);
        }

        let kind = node.kind();
        if !KINDS.contains(&kind) {
            return Err(CoreError::UnknownKind {
                kind: kind.to_string(),
                suggestion: suggest_kind(kind),
            });
        }

        let mut value = node.value().clone();
        if let Value::Mapping(map) = &mut value {
            map.remove("apiVersion");
            map.remove("metadata");
        }

        serde_yaml::from_value(value)
            .map(Some)
            .map_err(|e| CoreError::MalformedSpec {
                spec: node.display_name(),
                message: e.to_string(),
            })
    }

    /// Encode the spec as a node carrying the Konjure `apiVersion` and `kind`
    pub fn to_node(&self) -> Result<Node> {
        let Value::Mapping(fields) = serde_yaml::to_value(self)? else {
            return Err(CoreError::MalformedSpec {
                spec: self.kind().to_string(),
                message: "spec did not serialize to a mapping".to_string(),
            });
        };

        let mut map = Mapping::new();
        map.insert("apiVersion".into(), API_VERSION.into());
        map.insert("kind".into(), self.kind().into());
        for (k, v) in fields {
            if k.as_str() != Some("kind") {
                map.insert(k, v);
            }
        }
        Ok(Node::from(map))
    }
}

fn suggest_kind(kind: &str) -> Option<String> {
    KINDS
        .iter()
        .map(|k| (k, strsim::jaro_winkler(&kind.to_lowercase(), &k.to_lowercase())))
        .filter(|(_, score)| *score > 0.8)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(k, _)| k.to_string())
}

fn is_false(b: &bool) -> bool {
    !*b
}

// =============================================================================
// RESOURCE / FILE / GIT / HTTP / KUSTOMIZE
// =============================================================================

/// Source-level sugar: a list of spec strings to parse again
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSpec {
    #[serde(default)]
    pub resources: Vec<String>,
}

/// A local file or directory
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSpec {
    pub path: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub recurse: bool,
}

impl FileSpec {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            recurse: false,
        }
    }
}

/// A Git repository checkout
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitSpec {
    pub repository: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub refspec: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub context: String,
}

impl GitSpec {
    /// The refspec to fetch, `HEAD` when unset
    pub fn refspec_or_head(&self) -> &str {
        if self.refspec.is_empty() {
            "HEAD"
        } else {
            &self.refspec
        }
    }
}

/// A document stream served over HTTP(S)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpSpec {
    pub url: String,
}

/// A Kustomize root directory
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KustomizeSpec {
    pub root: String,
}

// =============================================================================
// HELM
// =============================================================================

/// A Helm chart rendered with `helm template`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelmSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub release_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub release_namespace: String,
    pub chart: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repository: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<HelmValue>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub include_tests: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_cache: Option<String>,
}

/// One ordered Helm value directive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawHelmValue", into = "RawHelmValue")]
pub enum HelmValue {
    /// `--values <file>` (glob expandable)
    File(String),
    /// `--set name=value`
    Set { name: String, value: Value },
    /// `--set-string name=value`
    SetString { name: String, value: String },
    /// `--set-file name=path`
    SetFile { name: String, path: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawHelmValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<Value>,
    #[serde(default, skip_serializing_if = "is_false")]
    force_string: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    load_file: bool,
}

impl TryFrom<RawHelmValue> for HelmValue {
    type Error = String;

    fn try_from(raw: RawHelmValue) -> std::result::Result<Self, Self::Error> {
        match (raw.file, raw.name) {
            (Some(file), None) => Ok(HelmValue::File(file)),
            (None, Some(name)) => {
                let value = raw.value.unwrap_or(Value::Null);
                if raw.force_string && raw.load_file {
                    return Err(format!(
                        "value '{}' cannot set both forceString and loadFile",
                        name
                    ));
                }
                if raw.load_file || raw.force_string {
                    let text = crate::node::scalar_to_string(&value).ok_or_else(|| {
                        format!("value '{}' must be a scalar", name)
                    })?;
                    if raw.load_file {
                        return Ok(HelmValue::SetFile { name, path: text });
                    }
                    return Ok(HelmValue::SetString { name, value: text });
                }
                Ok(HelmValue::Set { name, value })
            }
            (Some(_), Some(_)) => Err("value sets both 'file' and 'name'".to_string()),
            (None, None) => Err("value requires either 'file' or 'name'".to_string()),
        }
    }
}

impl From<HelmValue> for RawHelmValue {
    fn from(value: HelmValue) -> Self {
        match value {
            HelmValue::File(file) => RawHelmValue {
                file: Some(file),
                ..Default::default()
            },
            HelmValue::Set { name, value } => RawHelmValue {
                name: Some(name),
                value: Some(value),
                ..Default::default()
            },
            HelmValue::SetString { name, value } => RawHelmValue {
                name: Some(name),
                value: Some(Value::String(value)),
                force_string: true,
                ..Default::default()
            },
            HelmValue::SetFile { name, path } => RawHelmValue {
                name: Some(name),
                value: Some(Value::String(path)),
                load_file: true,
                ..Default::default()
            },
        }
    }
}

// =============================================================================
// JSONNET
// =============================================================================

/// A Jsonnet program
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonnetSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub filename: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub code: String,
    #[serde(default, rename = "jpath", skip_serializing_if = "Vec::is_empty")]
    pub library_paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub external_variables: Vec<JsonnetParameter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub top_level_arguments: Vec<JsonnetParameter>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub jsonnet_bundler_package_home: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub jsonnet_bundler_refresh: bool,
}

/// An external variable or top-level argument
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonnetParameter {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_file: Option<String>,
}

impl JsonnetParameter {
    /// Command line arguments for this parameter, `prefix` is `ext` or `tla`
    pub fn args(&self, prefix: &str) -> Vec<String> {
        let (suffix, value) = if let Some(v) = &self.string {
            ("str", v)
        } else if let Some(v) = &self.string_file {
            ("str-file", v)
        } else if let Some(v) = &self.code {
            ("code", v)
        } else if let Some(v) = &self.code_file {
            ("code-file", v)
        } else {
            // Without a value jsonnet reads the variable from the environment
            return vec![format!("--{}-str", prefix), self.name.clone()];
        };
        vec![
            format!("--{}-{}", prefix, suffix),
            format!("{}={}", self.name, value),
        ]
    }
}

// =============================================================================
// KUBERNETES
// =============================================================================

/// Resources read from a live cluster with `kubectl get`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub namespaces: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace_selector: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label_selector: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub field_selector: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kubeconfig: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub context: String,
}

// =============================================================================
// SECRET
// =============================================================================

/// A generated `v1/Secret`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretSpec {
    pub secret_name: String,
    #[serde(default, rename = "type", skip_serializing_if = "String::is_empty")]
    pub secret_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub literals: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub envs: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uuids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ulids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub passwords: Vec<PasswordRecipe>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_options: Option<PasswordOptions>,
}
