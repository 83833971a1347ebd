use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_yaml::{Mapping, Value};
use std::path::Path;

use konjure_core::Node;
use konjure_core::secrets::PasswordGenerator;
use konjure_core::spec::SecretSpec;

use super::Reader;
use crate::error::{EngineError, Result};
use crate::options::ReaderOptions;

const DEFAULT_SECRET_TYPE: &str = "Opaque";

/// Generates a `v1/Secret`
///
/// Data is merged in a fixed order: literals, files, env files, UUIDs,
/// ULIDs, then passwords. A later source overwrites an earlier key.
pub struct SecretReader<'a> {
    spec: SecretSpec,
    options: &'a ReaderOptions,
}

impl<'a> SecretReader<'a> {
    pub fn new(spec: SecretSpec, options: &'a ReaderOptions) -> Self {
        Self { spec, options }
    }

    fn malformed(&self, message: String) -> EngineError {
        EngineError::MalformedSpec {
            spec: format!("Secret/{}", self.spec.secret_name),
            message,
        }
    }

    /// Plain text secret data, keyed in insertion order
    pub fn string_data(&self) -> Result<Vec<(String, String)>> {
        let mut data = DataBuilder::default();

        for literal in &self.spec.literals {
            let (key, value) = literal
                .split_once('=')
                .ok_or_else(|| self.malformed(format!("literal '{}' is not key=value", literal)))?;
            data.insert(key, value.to_string());
        }

        for source in &self.spec.files {
            let (key, path) = match source.split_once('=') {
                Some((key, path)) => (key.to_string(), path),
                None => (file_key(source), source.as_str()),
            };
            data.insert(&key, read_file(&self.options.resolve(path))?);
        }

        for env in &self.spec.envs {
            let content = read_file(&self.options.resolve(env))?;
            for (key, value) in parse_env_file(&content) {
                data.insert(&key, value);
            }
        }

        for key in &self.spec.uuids {
            data.insert(key, uuid::Uuid::new_v4().to_string());
        }
        for key in &self.spec.ulids {
            data.insert(key, ulid::Ulid::new().to_string());
        }

        if !self.spec.passwords.is_empty() {
            let mut generator = match &self.spec.password_options {
                Some(options) => PasswordGenerator::with_options(options),
                None => PasswordGenerator::new(),
            };
            for recipe in &self.spec.passwords {
                data.insert(&recipe.key, generator.generate(recipe)?);
            }
        }

        Ok(data.0)
    }

    /// The secret resource with base64 encoded data
    pub fn secret(&self) -> Result<Node> {
        if self.spec.secret_name.is_empty() {
            return Err(self.malformed("secretName is required".to_string()));
        }
        let secret_type = if self.spec.secret_type.is_empty() {
            DEFAULT_SECRET_TYPE
        } else {
            self.spec.secret_type.as_str()
        };

        let mut data = Mapping::new();
        for (key, value) in self.string_data()? {
            data.insert(Value::from(key), Value::from(STANDARD.encode(value)));
        }

        let mut metadata = Mapping::new();
        metadata.insert("name".into(), self.spec.secret_name.clone().into());

        let mut secret = Mapping::new();
        secret.insert("apiVersion".into(), "v1".into());
        secret.insert("kind".into(), "Secret".into());
        secret.insert("metadata".into(), Value::Mapping(metadata));
        secret.insert("type".into(), secret_type.into());
        if !data.is_empty() {
            secret.insert("data".into(), Value::Mapping(data));
        }

        Ok(Node::new(Value::Mapping(secret)))
    }
}

impl Reader for SecretReader<'_> {
    fn read(&mut self) -> Result<Vec<Node>> {
        tracing::debug!(name = %self.spec.secret_name, "generating secret");
        Ok(vec![self.secret()?])
    }
}

/// Ordered key/value pairs where a repeated key replaces the value in place
#[derive(Default)]
struct DataBuilder(Vec<(String, String)>);

impl DataBuilder {
    fn insert(&mut self, key: &str, value: String) {
        match self.0.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key.to_string(), value)),
        }
    }
}

fn file_key(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => EngineError::FileNotFound {
            path: path.display().to_string(),
        },
        _ => EngineError::Io(e),
    })
}

/// `KEY=VALUE` lines; blank lines and `#` comments are skipped and a bare
/// `KEY` takes its value from the process environment
fn parse_env_file(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(|line| match line.split_once('=') {
            Some((key, value)) => Some((key.trim().to_string(), value.to_string())),
            None => std::env::var(line).ok().map(|value| (line.to_string(), value)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use konjure_core::secrets::PasswordRecipe;

    fn decoded(node: &Node, key: &str) -> String {
        let encoded = node.lookup_str(&["data", key]).unwrap();
        String::from_utf8(STANDARD.decode(encoded).unwrap()).unwrap()
    }

    #[test]
    fn test_sources_in_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tls.crt"), "CERT").unwrap();
        std::fs::write(dir.path().join("app.env"), "# settings\n\nMODE=prod\nuser=env\n").unwrap();
        let options = ReaderOptions::in_dir(dir.path());

        let reader = SecretReader::new(
            SecretSpec {
                secret_name: "app".into(),
                literals: vec!["user=admin".into(), "token=a=b".into()],
                files: vec!["tls.crt".into(), "ca=tls.crt".into()],
                envs: vec!["app.env".into()],
                uuids: vec!["id".into()],
                ulids: vec!["sortable".into()],
                passwords: vec![PasswordRecipe {
                    length: Some(12),
                    ..PasswordRecipe::new("password")
                }],
                ..Default::default()
            },
            &options,
        );

        let keys: Vec<String> = reader.string_data().unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec!["user", "token", "tls.crt", "ca", "MODE", "id", "sortable", "password"]
        );

        let node = reader.secret().unwrap();
        assert_eq!(node.api_version(), "v1");
        assert_eq!(node.kind(), "Secret");
        assert_eq!(node.lookup_str(&["type"]), Some("Opaque"));
        assert_eq!(decoded(&node, "user"), "env");
        assert_eq!(decoded(&node, "token"), "a=b");
        assert_eq!(decoded(&node, "ca"), "CERT");
        assert_eq!(decoded(&node, "id").len(), 36);
        assert_eq!(decoded(&node, "sortable").len(), 26);
        assert_eq!(decoded(&node, "password").chars().count(), 12);
    }

    #[test]
    fn test_name_required() {
        let options = ReaderOptions::default();
        let reader = SecretReader::new(SecretSpec::default(), &options);
        assert!(matches!(reader.secret(), Err(EngineError::MalformedSpec { .. })));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let options = ReaderOptions::in_dir(dir.path());
        let reader = SecretReader::new(
            SecretSpec {
                secret_name: "s".into(),
                secret_type: "kubernetes.io/tls".into(),
                files: vec!["missing.pem".into()],
                ..Default::default()
            },
            &options,
        );
        assert!(matches!(reader.secret(), Err(EngineError::FileNotFound { .. })));
    }

    #[test]
    fn test_empty_secret_has_no_data() {
        let options = ReaderOptions::default();
        let reader = SecretReader::new(
            SecretSpec {
                secret_name: "empty".into(),
                secret_type: "kubernetes.io/dockerconfigjson".into(),
                ..Default::default()
            },
            &options,
        );
        let node = reader.secret().unwrap();
        assert_eq!(node.lookup_str(&["type"]), Some("kubernetes.io/dockerconfigjson"));
        assert!(node.lookup(&["data"]).is_none());
    }
}
