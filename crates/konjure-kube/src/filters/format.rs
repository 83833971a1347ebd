use serde_yaml::{Mapping, Value};

use konjure_core::Node;

use super::Filter;
use crate::error::Result;

/// Field order of a resource document
const RESOURCE_FIELDS: &[&str] = &[
    "apiVersion",
    "kind",
    "metadata",
    "type",
    "immutable",
    "spec",
    "data",
    "binaryData",
    "stringData",
    "rules",
    "subjects",
    "roleRef",
    "items",
    "status",
];

const METADATA_FIELDS: &[&str] = &[
    "name",
    "generateName",
    "namespace",
    "labels",
    "annotations",
    "ownerReferences",
    "finalizers",
];

const CONTAINER_FIELDS: &[&str] = &[
    "name",
    "image",
    "imagePullPolicy",
    "command",
    "args",
    "workingDir",
    "ports",
    "env",
    "envFrom",
    "resources",
    "volumeMounts",
    "livenessProbe",
    "readinessProbe",
    "startupProbe",
    "securityContext",
];

/// Pod spec paths (relative to the document root) whose containers are ordered
const POD_SPEC_PATHS: &[&[&str]] = &[
    &["spec"],
    &["spec", "template", "spec"],
    &["spec", "jobTemplate", "spec", "template", "spec"],
];

/// Canonical Kubernetes field ordering
///
/// Known fields come first in conventional order, the remaining fields
/// follow sorted by name. Labels and annotations are sorted by key.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatFilter;

impl FormatFilter {
    pub fn format(&self, node: &mut Node) {
        let value = node.value_mut();
        order_fields(value, RESOURCE_FIELDS);

        if let Some(metadata) = value.get_mut("metadata") {
            order_fields(metadata, METADATA_FIELDS);
            for key in ["labels", "annotations"] {
                if let Some(map) = metadata.get_mut(key) {
                    order_fields(map, &[]);
                }
            }
        }

        for path in POD_SPEC_PATHS {
            let Some(pod_spec) = path.iter().try_fold(&mut *value, |v, key| v.get_mut(*key)) else {
                continue;
            };
            for list in ["initContainers", "containers"] {
                if let Some(Value::Sequence(containers)) = pod_spec.get_mut(list) {
                    for container in containers {
                        order_fields(container, CONTAINER_FIELDS);
                    }
                }
            }
        }
    }
}

impl Filter for FormatFilter {
    fn filter(&self, mut nodes: Vec<Node>) -> Result<Vec<Node>> {
        for node in &mut nodes {
            self.format(node);
        }
        Ok(nodes)
    }
}

/// Reorder a mapping: `known` keys first, the rest by name
fn order_fields(value: &mut Value, known: &[&str]) {
    let Value::Mapping(map) = value else {
        return;
    };

    let mut entries: Vec<(Value, Value)> = std::mem::take(map).into_iter().collect();
    entries.sort_by(|(a, _), (b, _)| {
        let rank = |k: &Value| {
            k.as_str()
                .and_then(|k| known.iter().position(|f| *f == k))
                .unwrap_or(known.len())
        };
        rank(a)
            .cmp(&rank(b))
            .then_with(|| a.as_str().unwrap_or_default().cmp(b.as_str().unwrap_or_default()))
    });

    let mut ordered = Mapping::with_capacity(entries.len());
    for (k, v) in entries {
        ordered.insert(k, v);
    }
    *map = ordered;
}

#[cfg(test)]
mod tests {
    use super::*;
    use konjure_core::yaml::to_yaml;

    #[test]
    fn test_canonical_order() {
        let node = Node::from_yaml(
            r#"spec:
  replicas: 1
  template:
    spec:
      containers:
      - image: nginx
        ports:
        - containerPort: 80
        name: web
status:
  readyReplicas: 1
metadata:
  labels:
    tier: web
    app: nginx
  name: web
kind: Deployment
apiVersion: apps/v1
zeta: true
"#,
        )
        .unwrap();

        let formatted = FormatFilter.filter(vec![node]).unwrap();
        insta::assert_snapshot!(to_yaml(&formatted[0]).unwrap(), @r"
        apiVersion: apps/v1
        kind: Deployment
        metadata:
          name: web
          labels:
            app: nginx
            tier: web
        spec:
          replicas: 1
          template:
            spec:
              containers:
              - name: web
                image: nginx
                ports:
                - containerPort: 80
        status:
          readyReplicas: 1
        zeta: true
        ");

        // Formatting is idempotent
        assert_eq!(FormatFilter.filter(formatted.clone()).unwrap(), formatted);
    }
}
