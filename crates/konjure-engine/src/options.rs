//! Reader configuration
//!
//! Defaults the engine applies to every reader it creates: where the
//! external tools live, how relative paths resolve, and the cluster and
//! cache settings that individual specs may leave unset.

use std::path::{Path, PathBuf};

/// Options applied to readers before they are invoked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Directory relative paths are resolved against
    pub working_dir: PathBuf,

    /// Default for `File` specs that do not set `recurse`
    pub recurse: bool,

    /// External executables
    pub tools: ToolPaths,

    /// Kubeconfig used when a `Kubernetes` spec leaves it unset
    pub kubeconfig: Option<String>,

    /// Kubeconfig context used when a `Kubernetes` spec leaves it unset
    pub kube_context: Option<String>,

    /// Helm repository cache used when a `Helm` spec leaves it unset
    pub helm_repository_cache: Option<PathBuf>,
}

/// Paths (or names on `PATH`) of the external tools readers invoke
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub git: PathBuf,
    pub helm: PathBuf,
    pub jsonnet: PathBuf,
    pub jb: PathBuf,
    pub kubectl: PathBuf,
    pub kustomize: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            git: "git".into(),
            helm: "helm".into(),
            jsonnet: "jsonnet".into(),
            jb: "jb".into(),
            kubectl: "kubectl".into(),
            kustomize: "kustomize".into(),
        }
    }
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            recurse: false,
            tools: ToolPaths::default(),
            kubeconfig: None,
            kube_context: None,
            helm_repository_cache: default_helm_repository_cache(),
        }
    }
}

impl ReaderOptions {
    /// Options rooted at a specific working directory
    pub fn in_dir(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            ..Default::default()
        }
    }

    /// Resolve a possibly relative path against the working directory
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.working_dir.join(path)
        }
    }
}

/// Default Helm repository cache under the user cache directory
pub fn default_helm_repository_cache() -> Option<PathBuf> {
    dirs::cache_dir().map(|d| d.join("konjure").join("helm").join("repository"))
}
