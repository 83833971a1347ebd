use konjure_core::Node;
use konjure_core::spec::KubernetesSpec;
use konjure_core::yaml::parse_documents;

use super::{Reader, flatten_lists};
use crate::error::Result;
use crate::exec::ExternalCommand;
use crate::options::ReaderOptions;

/// Resource types fetched when a spec names none
const DEFAULT_TYPES: &str = "all";

/// Reads live resources with `kubectl get`
pub struct KubernetesReader<'a> {
    spec: KubernetesSpec,
    options: &'a ReaderOptions,
}

impl<'a> KubernetesReader<'a> {
    pub fn new(spec: KubernetesSpec, options: &'a ReaderOptions) -> Self {
        Self { spec, options }
    }

    fn kubectl(&self) -> ExternalCommand {
        let kubeconfig = non_empty(&self.spec.kubeconfig).or(self.options.kubeconfig.as_deref());
        let context = non_empty(&self.spec.context).or(self.options.kube_context.as_deref());

        ExternalCommand::new("kubectl", &self.options.tools.kubectl)
            .flag("--kubeconfig", kubeconfig.unwrap_or_default())
            .flag("--context", context.unwrap_or_default())
    }

    /// `kubectl get namespaces` for the namespace selector
    pub fn namespaces_command(&self) -> ExternalCommand {
        self.kubectl()
            .args(["get", "namespaces"])
            .flag("--selector", &self.spec.namespace_selector)
            .args(["--output", "name"])
    }

    /// `kubectl get` for a single namespace (empty means the current one)
    pub fn get_command(&self, namespace: &str) -> ExternalCommand {
        let types = if self.spec.types.is_empty() {
            DEFAULT_TYPES.to_string()
        } else {
            self.spec.types.join(",")
        };

        self.kubectl()
            .args(["get", types.as_str()])
            .flag("--namespace", namespace)
            .flag("--selector", &self.spec.label_selector)
            .flag("--field-selector", &self.spec.field_selector)
            .args(["--output", "yaml"])
    }

    fn namespaces(&self) -> Result<Vec<String>> {
        if !self.spec.namespace_selector.is_empty() {
            let output = self.namespaces_command().output_string()?;
            return Ok(parse_namespace_names(&output));
        }
        if self.spec.namespaces.is_empty() {
            return Ok(vec![String::new()]);
        }
        Ok(self.spec.namespaces.clone())
    }
}

impl Reader for KubernetesReader<'_> {
    fn read(&mut self) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        for namespace in self.namespaces()? {
            tracing::debug!(%namespace, types = ?self.spec.types, "reading cluster resources");
            let output = self.get_command(&namespace).output_string()?;
            nodes.extend(flatten_lists(parse_documents(&output)?));
        }
        Ok(nodes)
    }
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

/// Names from `kubectl get namespaces -o name` (`namespace/<name>` lines)
fn parse_namespace_names(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| l.rsplit_once('/').map(|(_, name)| name).unwrap_or(l).to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_command() {
        let options = ReaderOptions {
            kubeconfig: Some("/home/me/.kube/config".into()),
            ..Default::default()
        };
        let reader = KubernetesReader::new(
            KubernetesSpec {
                namespaces: vec!["default".into()],
                types: vec!["deployments".into(), "services".into()],
                label_selector: "app=foo".into(),
                context: "staging".into(),
                ..Default::default()
            },
            &options,
        );

        assert_eq!(
            reader.get_command("default").arg_strings(),
            vec![
                "--kubeconfig",
                "/home/me/.kube/config",
                "--context",
                "staging",
                "get",
                "deployments,services",
                "--namespace",
                "default",
                "--selector",
                "app=foo",
                "--output",
                "yaml",
            ]
        );
    }

    #[test]
    fn test_current_namespace_and_default_types() {
        let options = ReaderOptions::default();
        let reader = KubernetesReader::new(KubernetesSpec::default(), &options);

        assert_eq!(reader.namespaces().unwrap(), vec![String::new()]);
        assert_eq!(
            reader.get_command("").arg_strings(),
            vec!["get", "all", "--output", "yaml"]
        );
    }

    #[test]
    fn test_namespace_selector() {
        let options = ReaderOptions::default();
        let reader = KubernetesReader::new(
            KubernetesSpec {
                namespace_selector: "team=web".into(),
                ..Default::default()
            },
            &options,
        );
        assert_eq!(
            reader.namespaces_command().arg_strings(),
            vec!["get", "namespaces", "--selector", "team=web", "--output", "name"]
        );
        assert_eq!(
            parse_namespace_names("namespace/web-a\nnamespace/web-b\n\n"),
            vec!["web-a", "web-b"]
        );
    }
}
