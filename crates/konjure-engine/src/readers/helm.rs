use konjure_core::spec::HelmSpec;
use konjure_core::yaml::parse_documents;
use konjure_core::{Node, ValuesMerger};

use super::Reader;
use crate::error::Result;
use crate::exec::ExternalCommand;
use crate::options::ReaderOptions;

/// Release name used when a spec leaves it unset
pub const DEFAULT_RELEASE_NAME: &str = "RELEASE-NAME";

const HOOK_ANNOTATION: &str = "helm.sh/hook";

/// Is this node a Helm test hook?
pub fn is_test_hook(node: &Node) -> bool {
    node.annotations()
        .get(HOOK_ANNOTATION)
        .is_some_and(|hooks| hooks.split(',').any(|h| h.trim().starts_with("test")))
}

/// Renders a chart with `helm template`
pub struct HelmReader<'a> {
    spec: HelmSpec,
    options: &'a ReaderOptions,
}

impl<'a> HelmReader<'a> {
    pub fn new(spec: HelmSpec, options: &'a ReaderOptions) -> Self {
        Self { spec, options }
    }

    /// The `helm template` invocation, merged values go to stdin
    pub fn command(&self) -> Result<ExternalCommand> {
        let spec = &self.spec;
        let release_name = if spec.release_name.is_empty() {
            DEFAULT_RELEASE_NAME
        } else {
            spec.release_name.as_str()
        };

        let mut command = ExternalCommand::new("helm", &self.options.tools.helm)
            .current_dir(&self.options.working_dir)
            .args(["template", release_name, spec.chart.as_str()])
            .flag("--version", &spec.version)
            .flag("--repo", &spec.repository)
            .flag("--namespace", &spec.release_namespace)
            .arg("--include-crds");

        let values = ValuesMerger::new(&self.options.working_dir).merge(&spec.values)?;
        if !values.is_empty() {
            command = command.args(["--values", "-"]).stdin(values.to_yaml()?);
        }

        let cache = spec
            .repository_cache
            .as_ref()
            .map(|c| self.options.resolve(c))
            .or_else(|| self.options.helm_repository_cache.clone());
        if let Some(cache) = cache {
            command = command.env("HELM_REPOSITORY_CACHE", cache);
        }

        Ok(command)
    }
}

impl Reader for HelmReader<'_> {
    fn read(&mut self) -> Result<Vec<Node>> {
        tracing::debug!(chart = %self.spec.chart, version = %self.spec.version, "rendering chart");
        let output = self.command()?.output_string()?;

        let mut nodes = parse_documents(&output)?;
        if !self.spec.include_tests {
            nodes.retain(|n| !is_test_hook(n));
        }
        Ok(nodes)
    }
}
