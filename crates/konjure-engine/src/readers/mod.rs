//! Resource readers
//!
//! Every typed spec maps to a [`Reader`] producing resource nodes. Readers
//! that allocate scoped resources (Git checkouts) hand back a [`Cleaner`]
//! which the expansion engine releases once it is done with the iteration
//! that created it.

mod file;
mod git;
mod helm;
mod http;
mod jsonnet;
mod kubernetes;
mod kustomize;
mod resource;
mod secret;
mod stream;

pub use file::{FileReader, is_kustomize_root};
pub use git::GitReader;
pub use helm::{HelmReader, is_test_hook};
pub use http::HttpReader;
pub use jsonnet::{JsonnetReader, parse_jsonnet_output};
pub use kubernetes::KubernetesReader;
pub use kustomize::KustomizeReader;
pub use resource::ResourceReader;
pub use secret::SecretReader;
pub use stream::StreamReader;

use tempfile::TempDir;

use konjure_core::{Node, Spec};

use crate::error::Result;
use crate::options::ReaderOptions;
use crate::parser::SpecParser;

/// Produces resource nodes
pub trait Reader {
    /// Read the nodes; called once
    fn read(&mut self) -> Result<Vec<Node>>;

    /// Resources to release once the nodes are no longer needed
    fn cleaner(self: Box<Self>) -> Option<Box<dyn Cleaner>> {
        None
    }
}

/// Releases resources allocated by a reader
pub trait Cleaner {
    fn clean(self: Box<Self>) -> Result<()>;
}

/// Removes a temporary directory
#[derive(Debug)]
pub struct TempDirCleaner(pub TempDir);

impl Cleaner for TempDirCleaner {
    fn clean(self: Box<Self>) -> Result<()> {
        tracing::debug!(path = %self.0.path().display(), "removing temporary directory");
        self.0.close()?;
        Ok(())
    }
}

/// Create the reader for a spec, with the reader options applied
pub fn reader_for<'a>(
    spec: Spec,
    options: &'a ReaderOptions,
    parser: &'a SpecParser,
) -> Box<dyn Reader + 'a> {
    match spec {
        Spec::Resource(spec) => Box::new(ResourceReader::new(spec, parser)),
        Spec::File(spec) => Box::new(FileReader::new(spec, options)),
        Spec::Git(spec) => Box::new(GitReader::new(spec, options)),
        Spec::Http(spec) => Box::new(HttpReader::new(spec)),
        Spec::Helm(spec) => Box::new(HelmReader::new(spec, options)),
        Spec::Jsonnet(spec) => Box::new(JsonnetReader::new(spec, options)),
        Spec::Kubernetes(spec) => Box::new(KubernetesReader::new(spec, options)),
        Spec::Kustomize(spec) => Box::new(KustomizeReader::new(spec, options)),
        Spec::Secret(spec) => Box::new(SecretReader::new(spec, options)),
    }
}

/// Replace `List` documents with their items
pub(crate) fn flatten_lists(nodes: Vec<Node>) -> Vec<Node> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        if !node.is_list() {
            out.push(node);
            continue;
        }
        if let Some(serde_yaml::Value::Sequence(items)) = node.lookup(&["items"]) {
            out.extend(items.iter().cloned().map(Node::new));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use konjure_core::yaml::parse_documents;

    #[test]
    fn test_flatten_lists() {
        let nodes = parse_documents(
            r#"apiVersion: v1
kind: List
items:
- apiVersion: v1
  kind: ConfigMap
  metadata:
    name: a
- apiVersion: v1
  kind: Secret
  metadata:
    name: b
---
apiVersion: v1
kind: Service
metadata:
  name: c
"#,
        )
        .unwrap();

        let flat = flatten_lists(nodes);
        let names: Vec<&str> = flat.iter().map(|n| n.name()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_temp_dir_cleaner() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_path_buf();
        std::fs::write(path.join("f"), "x").unwrap();

        Box::new(TempDirCleaner(dir)).clean().unwrap();
        assert!(!path.exists());
    }
}
