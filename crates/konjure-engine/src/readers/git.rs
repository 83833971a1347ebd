use std::path::Path;
use tempfile::TempDir;

use konjure_core::Node;
use konjure_core::spec::{FileSpec, GitSpec, Spec};

use super::{Cleaner, Reader, TempDirCleaner};
use crate::error::Result;
use crate::exec::ExternalCommand;
use crate::options::ReaderOptions;

/// Shallow clones a repository and emits a `File` spec for the checkout
pub struct GitReader<'a> {
    spec: GitSpec,
    options: &'a ReaderOptions,
    checkout: Option<TempDir>,
}

impl<'a> GitReader<'a> {
    pub fn new(spec: GitSpec, options: &'a ReaderOptions) -> Self {
        Self {
            spec,
            options,
            checkout: None,
        }
    }

    /// The commands that populate `dir`, in order
    pub fn commands(&self, dir: &Path) -> Vec<ExternalCommand> {
        let git = || {
            ExternalCommand::new("git", &self.options.tools.git)
                .current_dir(dir)
                .env("GIT_TERMINAL_PROMPT", "0")
        };
        vec![
            git().args(["init", "--quiet"]),
            git().args(["remote", "add", "origin", self.spec.repository.as_str()]),
            git().args(["fetch", "--quiet", "--depth", "1", "origin", self.spec.refspec_or_head()]),
            git().args(["checkout", "--quiet", "FETCH_HEAD"]),
            git().args(["submodule", "update", "--quiet", "--init", "--recursive", "--depth", "1"]),
        ]
    }
}

impl Reader for GitReader<'_> {
    fn read(&mut self) -> Result<Vec<Node>> {
        let dir = tempfile::Builder::new().prefix("konjure-git-").tempdir()?;
        let path = dir.path().to_path_buf();
        // Owned before cloning so a failed clone is still removed
        self.checkout = Some(dir);

        tracing::debug!(
            repository = %self.spec.repository,
            refspec = %self.spec.refspec_or_head(),
            path = %path.display(),
            "cloning repository"
        );
        for command in self.commands(&path) {
            command.output()?;
        }

        let target = if self.spec.context.is_empty() {
            path
        } else {
            path.join(&self.spec.context)
        };
        let file = Spec::File(FileSpec::new(target.display().to_string()));
        Ok(vec![file.to_node()?])
    }

    fn cleaner(self: Box<Self>) -> Option<Box<dyn Cleaner>> {
        self.checkout
            .map(|dir| Box::new(TempDirCleaner(dir)) as Box<dyn Cleaner>)
    }
}
