use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use konjure_core::spec::{FileSpec, JsonnetSpec, KustomizeSpec};
use konjure_core::yaml::parse_documents;
use konjure_core::{INDEX_ANNOTATION, Node, PATH_ANNOTATION, Spec};

use super::Reader;
use crate::error::{EngineError, Result};
use crate::options::ReaderOptions;

/// File names marking a Kustomize root
const KUSTOMIZATION_FILES: &[&str] = &["kustomization.yaml", "kustomization.yml", "Kustomization"];

/// Does the directory contain a Kustomization?
pub fn is_kustomize_root(dir: &Path) -> bool {
    KUSTOMIZATION_FILES.iter().any(|f| dir.join(f).is_file())
}

/// Reads a file, or the files of a directory
pub struct FileReader<'a> {
    spec: FileSpec,
    options: &'a ReaderOptions,
}

impl<'a> FileReader<'a> {
    pub fn new(spec: FileSpec, options: &'a ReaderOptions) -> Self {
        Self { spec, options }
    }

    fn read_dir(&self, root: &Path) -> Result<Vec<Node>> {
        if is_kustomize_root(root) {
            return Ok(vec![kustomize_node(root)?]);
        }

        let recurse = self.spec.recurse || self.options.recurse;
        let mut nodes = Vec::new();
        let mut entries = WalkDir::new(root)
            .min_depth(1)
            .max_depth(if recurse { usize::MAX } else { 1 })
            .sort_by_file_name()
            .into_iter();

        while let Some(entry) = entries.next() {
            let entry = entry.map_err(std::io::Error::from)?;
            let hidden = entry.file_name().to_string_lossy().starts_with('.');

            if entry.file_type().is_dir() {
                // Subdirectories are only considered when recursing
                if hidden {
                    entries.skip_current_dir();
                } else if recurse && is_kustomize_root(entry.path()) {
                    nodes.push(kustomize_node(entry.path())?);
                    entries.skip_current_dir();
                }
                continue;
            }
            if hidden {
                continue;
            }

            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            match extension(entry.path()) {
                Some("jsonnet") => nodes.push(jsonnet_node(entry.path())?),
                Some("yaml" | "yml") => nodes.extend(read_documents(entry.path(), relative)?),
                _ => tracing::trace!(path = %entry.path().display(), "skipping file"),
            }
        }

        Ok(nodes)
    }

    fn read_file(&self, path: &Path) -> Result<Vec<Node>> {
        if extension(path) == Some("jsonnet") {
            return Ok(vec![jsonnet_node(path)?]);
        }
        let name = path.file_name().map(PathBuf::from).unwrap_or_default();
        read_documents(path, &name)
    }
}

impl Reader for FileReader<'_> {
    fn read(&mut self) -> Result<Vec<Node>> {
        let path = self.options.resolve(&self.spec.path);
        let metadata = std::fs::metadata(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => EngineError::FileNotFound {
                path: path.display().to_string(),
            },
            _ => EngineError::Io(e),
        })?;

        tracing::debug!(path = %path.display(), "reading files");
        if metadata.is_dir() {
            self.read_dir(&path)
        } else {
            self.read_file(&path)
        }
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|e| e.to_str())
}

fn kustomize_node(root: &Path) -> Result<Node> {
    Ok(Spec::Kustomize(KustomizeSpec {
        root: root.display().to_string(),
    })
    .to_node()?)
}

fn jsonnet_node(path: &Path) -> Result<Node> {
    Ok(Spec::Jsonnet(JsonnetSpec {
        filename: path.display().to_string(),
        ..Default::default()
    })
    .to_node()?)
}

/// Parse a YAML file, keeping only documents that look like resources
fn read_documents(path: &Path, relative: &Path) -> Result<Vec<Node>> {
    let content = std::fs::read_to_string(path)?;
    let documents = parse_documents(&content).map_err(|e| EngineError::MalformedSpec {
        spec: path.display().to_string(),
        message: e.to_string(),
    })?;

    let relative = relative.to_string_lossy().replace('\\', "/");
    let mut nodes = Vec::with_capacity(documents.len());
    for (index, mut node) in documents.into_iter().enumerate() {
        if !is_resource(&node) {
            tracing::debug!(path = %path.display(), index, "skipping document that is not a resource");
            continue;
        }
        node.set_annotation(PATH_ANNOTATION, &relative);
        node.set_annotation(INDEX_ANNOTATION, &index.to_string());
        nodes.push(node);
    }
    Ok(nodes)
}

/// A kind is required; so is a name, except for lists and Konjure specs
fn is_resource(node: &Node) -> bool {
    !node.kind().is_empty()
        && (!node.name().is_empty() || node.is_list() || Spec::is_spec_node(node))
}
