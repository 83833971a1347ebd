use konjure_core::Node;
use konjure_core::spec::ResourceSpec;

use super::Reader;
use crate::error::Result;
use crate::parser::{Parsed, SpecParser};

/// Re-parses each spec string of a `Resource` spec
pub struct ResourceReader<'a> {
    spec: ResourceSpec,
    parser: &'a SpecParser,
}

impl<'a> ResourceReader<'a> {
    pub fn new(spec: ResourceSpec, parser: &'a SpecParser) -> Self {
        Self { spec, parser }
    }
}

impl Reader for ResourceReader<'_> {
    fn read(&mut self) -> Result<Vec<Node>> {
        let mut nodes = Vec::with_capacity(self.spec.resources.len());
        for resource in &self.spec.resources {
            match self.parser.decode(resource)? {
                Some(Parsed::Spec(spec)) => nodes.push(spec.to_node()?),
                Some(Parsed::Reader(mut reader)) => nodes.extend(reader.read()?),
                None => tracing::debug!(%resource, "no default reader configured, skipping"),
            }
        }
        Ok(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use konjure_core::Spec;

    #[test]
    fn test_resources_become_spec_nodes() {
        let parser = SpecParser::new();
        let mut reader = ResourceReader::new(
            ResourceSpec {
                resources: vec![
                    "github.com/org/repo".into(),
                    "k8s:default/services".into(),
                    "-".into(),
                ],
            },
            &parser,
        );

        let nodes = reader.read().unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].kind(), "Git");
        assert_eq!(nodes[1].kind(), "Kubernetes");
        assert!(nodes.iter().all(Spec::is_spec_node));
    }
}
