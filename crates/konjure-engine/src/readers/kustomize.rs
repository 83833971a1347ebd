use konjure_core::Node;
use konjure_core::spec::KustomizeSpec;
use konjure_core::yaml::parse_documents;

use super::Reader;
use crate::error::Result;
use crate::exec::ExternalCommand;
use crate::options::ReaderOptions;

/// Builds a Kustomize root with `kustomize build`
pub struct KustomizeReader<'a> {
    spec: KustomizeSpec,
    options: &'a ReaderOptions,
}

impl<'a> KustomizeReader<'a> {
    pub fn new(spec: KustomizeSpec, options: &'a ReaderOptions) -> Self {
        Self { spec, options }
    }

    pub fn command(&self) -> ExternalCommand {
        ExternalCommand::new("kustomize", &self.options.tools.kustomize)
            .current_dir(&self.options.working_dir)
            .arg("build")
            .arg(self.options.resolve(&self.spec.root))
    }
}

impl Reader for KustomizeReader<'_> {
    fn read(&mut self) -> Result<Vec<Node>> {
        tracing::debug!(root = %self.spec.root, "building kustomization");
        let output = self.command().output_string()?;
        Ok(parse_documents(&output)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_command() {
        let options = ReaderOptions::in_dir("/work");
        let reader = KustomizeReader::new(
            KustomizeSpec {
                root: "overlays/prod".into(),
            },
            &options,
        );
        assert_eq!(
            reader.command().arg_strings(),
            vec!["build", "/work/overlays/prod"]
        );
    }
}
