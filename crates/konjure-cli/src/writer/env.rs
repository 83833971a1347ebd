//! `env` output
//!
//! Collects environment variables from ConfigMap and Secret data and from the
//! container `env` entries of workloads, resolving key references against
//! the ConfigMaps and Secrets present in the same stream.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use indexmap::IndexMap;
use serde_yaml::Value;
use std::collections::HashMap;
use std::io::Write;

use konjure_core::Node;
use konjure_core::node::scalar_to_string;

use crate::error::Result;

const CONTAINER_PATHS: &[&[&str]] = &[
    &["spec", "containers"],
    &["spec", "initContainers"],
    &["spec", "template", "spec", "initContainers"],
    &["spec", "template", "spec", "containers"],
    &["spec", "jobTemplate", "spec", "template", "spec", "initContainers"],
    &["spec", "jobTemplate", "spec", "template", "spec", "containers"],
];

/// Dialect of the `env` output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnvOptions {
    /// `export KEY="VALUE"` instead of `KEY=VALUE`
    pub shell: bool,
    /// Write statements that clear the variables instead
    pub unset: bool,
}

type DataKey = (String, String);

/// Decoded `data` of the ConfigMaps and Secrets in the stream
#[derive(Default)]
struct DataSources {
    config_maps: HashMap<DataKey, IndexMap<String, String>>,
    secrets: HashMap<DataKey, IndexMap<String, String>>,
}

impl DataSources {
    fn collect(nodes: &[Node]) -> Self {
        let mut sources = Self::default();
        for node in nodes.iter().filter(|n| n.group().is_empty()) {
            let key = (node.namespace().to_string(), node.name().to_string());
            match node.kind() {
                "ConfigMap" => {
                    sources.config_maps.insert(key, data(node, false));
                }
                "Secret" => {
                    sources.secrets.insert(key, data(node, true));
                }
                _ => {}
            }
        }
        sources
    }

    fn lookup(&self, secret: bool, namespace: &str, reference: &Value) -> Option<String> {
        let name = reference.get("name").and_then(Value::as_str)?;
        let key = reference.get("key").and_then(Value::as_str)?;
        let sources = if secret { &self.secrets } else { &self.config_maps };
        sources
            .get(&(namespace.to_string(), name.to_string()))?
            .get(key)
            .cloned()
    }
}

fn usable(key: &str, value: &str) -> bool {
    !key.contains('.') && !value.contains('\n')
}

/// String entries of `.data`, base64 decoded for Secrets
fn data(node: &Node, encoded: bool) -> IndexMap<String, String> {
    let Some(Value::Mapping(map)) = node.lookup(&["data"]) else {
        return IndexMap::new();
    };
    let mut entries = IndexMap::new();
    for (key, value) in map {
        let (Some(key), Some(value)) = (scalar_to_string(key), scalar_to_string(value)) else {
            continue;
        };
        let value = if encoded {
            match STANDARD.decode(value.as_bytes()) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(err) => {
                    tracing::warn!(resource = %node.display_name(), %key, %err, "skipping undecodable secret value");
                    continue;
                }
            }
        } else {
            value
        };
        entries.insert(key, value);
    }
    entries
}

fn container_env(node: &Node, sources: &DataSources, vars: &mut IndexMap<String, String>) {
    let containers = CONTAINER_PATHS
        .iter()
        .filter_map(|path| node.lookup(path))
        .filter_map(Value::as_sequence)
        .flatten();

    for container in containers {
        let Some(env) = container.get("env").and_then(Value::as_sequence) else {
            continue;
        };
        for entry in env {
            let Some(name) = entry.get("name").and_then(Value::as_str) else {
                continue;
            };
            let value = if let Some(value) = entry.get("value") {
                scalar_to_string(value)
            } else if let Some(from) = entry.get("valueFrom") {
                if let Some(reference) = from.get("configMapKeyRef") {
                    sources.lookup(false, node.namespace(), reference)
                } else if let Some(reference) = from.get("secretKeyRef") {
                    sources.lookup(true, node.namespace(), reference)
                } else {
                    None
                }
            } else {
                Some(String::new())
            };

            match value {
                Some(value) if usable(name, &value) => {
                    vars.insert(name.to_string(), value);
                }
                Some(_) => {}
                None => tracing::debug!(resource = %node.display_name(), variable = name, "unresolved environment variable"),
            }
        }
    }
}

fn shell_quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Write the variables of the stream, later definitions winning
pub fn write_env(nodes: &[Node], options: &EnvOptions, out: &mut impl Write) -> Result<()> {
    let sources = DataSources::collect(nodes);
    let mut vars: IndexMap<String, String> = IndexMap::new();

    for node in nodes {
        match (node.group(), node.kind()) {
            ("", "ConfigMap") | ("", "Secret") => {
                let entries = data(node, node.kind() == "Secret");
                for (key, value) in entries {
                    if usable(&key, &value) {
                        vars.insert(key, value);
                    }
                }
            }
            _ => container_env(node, &sources, &mut vars),
        }
    }

    for (key, value) in &vars {
        match (options.shell, options.unset) {
            (true, true) => writeln!(out, "unset {}", key)?,
            (false, true) => writeln!(out, "{}=", key)?,
            (true, false) => writeln!(out, "export {}={}", key, shell_quote(value))?,
            (false, false) => writeln!(out, "{}={}", key, value)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use konjure_core::parse_documents;

    fn stream() -> Vec<Node> {
        parse_documents(
            r#"apiVersion: v1
kind: ConfigMap
metadata:
  name: settings
  namespace: web
data:
  LOG_LEVEL: debug
  app.properties: "ignored"
  BANNER: "line one\nline two"
---
apiVersion: v1
kind: Secret
metadata:
  name: creds
  namespace: web
data:
  DB_PASSWORD: czNjcjN0
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: api
  namespace: web
spec:
  template:
    spec:
      containers:
      - name: api
        env:
        - name: GREETING
          value: say "hi" for $5
        - name: LEVEL
          valueFrom:
            configMapKeyRef:
              name: settings
              key: LOG_LEVEL
        - name: PASSWORD
          valueFrom:
            secretKeyRef:
              name: creds
              key: DB_PASSWORD
        - name: MISSING
          valueFrom:
            secretKeyRef:
              name: creds
              key: nope
"#,
        )
        .unwrap()
    }

    fn render(options: EnvOptions) -> String {
        let mut out = Vec::new();
        write_env(&stream(), &options, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_plain() {
        assert_eq!(
            render(EnvOptions::default()),
            "LOG_LEVEL=debug\nDB_PASSWORD=s3cr3t\nGREETING=say \"hi\" for $5\nLEVEL=debug\nPASSWORD=s3cr3t\n"
        );
    }

    #[test]
    fn test_shell() {
        let out = render(EnvOptions {
            shell: true,
            unset: false,
        });
        assert!(out.contains("export GREETING=\"say \\\"hi\\\" for \\$5\"\n"));
        assert!(out.starts_with("export LOG_LEVEL=\"debug\"\n"));
    }

    #[test]
    fn test_unset() {
        let plain = render(EnvOptions {
            shell: false,
            unset: true,
        });
        assert!(plain.starts_with("LOG_LEVEL=\nDB_PASSWORD=\n"));

        let shell = render(EnvOptions {
            shell: true,
            unset: true,
        });
        assert!(shell.starts_with("unset LOG_LEVEL\nunset DB_PASSWORD\n"));
    }
}
