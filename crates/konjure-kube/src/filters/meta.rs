use regex::Regex;

use konjure_core::Node;

use super::Filter;
use crate::error::{FilterError, Result};

/// Keeps nodes whose group, version, kind, namespace and name match
/// anchored regular expressions
///
/// Every dimension is optional; an unset pattern matches anything.
#[derive(Debug, Clone, Default)]
pub struct ResourceMetaFilter {
    group: Option<Regex>,
    version: Option<Regex>,
    kind: Option<Regex>,
    namespace: Option<Regex>,
    name: Option<Regex>,
}

fn anchored(field: &'static str, pattern: &str) -> Result<Option<Regex>> {
    if pattern.is_empty() {
        return Ok(None);
    }
    Regex::new(&format!("^(?:{})$", pattern))
        .map(Some)
        .map_err(|source| FilterError::InvalidPattern {
            field,
            pattern: pattern.to_string(),
            source,
        })
}

impl ResourceMetaFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(mut self, pattern: &str) -> Result<Self> {
        self.group = anchored("group", pattern)?;
        Ok(self)
    }

    pub fn version(mut self, pattern: &str) -> Result<Self> {
        self.version = anchored("version", pattern)?;
        Ok(self)
    }

    pub fn kind(mut self, pattern: &str) -> Result<Self> {
        self.kind = anchored("kind", pattern)?;
        Ok(self)
    }

    pub fn namespace(mut self, pattern: &str) -> Result<Self> {
        self.namespace = anchored("namespace", pattern)?;
        Ok(self)
    }

    pub fn name(mut self, pattern: &str) -> Result<Self> {
        self.name = anchored("name", pattern)?;
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        [&self.group, &self.version, &self.kind, &self.namespace, &self.name]
            .iter()
            .all(|p| p.is_none())
    }

    pub fn matches(&self, node: &Node) -> bool {
        let check = |pattern: &Option<Regex>, value: &str| {
            pattern.as_ref().is_none_or(|re| re.is_match(value))
        };
        check(&self.group, node.group())
            && check(&self.version, node.version())
            && check(&self.kind, node.kind())
            && check(&self.namespace, node.namespace())
            && check(&self.name, node.name())
    }
}

impl Filter for ResourceMetaFilter {
    fn filter(&self, mut nodes: Vec<Node>) -> Result<Vec<Node>> {
        if !self.is_empty() {
            nodes.retain(|n| self.matches(n));
        }
        Ok(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use konjure_core::yaml::parse_documents;

    fn stream() -> Vec<Node> {
        parse_documents(
            r#"apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
  namespace: prod
---
apiVersion: apps/v1
kind: DeploymentConfig
metadata:
  name: web-legacy
  namespace: prod
---
apiVersion: v1
kind: Service
metadata:
  name: web
  namespace: staging
"#,
        )
        .unwrap()
    }

    fn ids(nodes: &[Node]) -> Vec<String> {
        nodes.iter().map(|n| n.display_name()).collect()
    }

    #[test]
    fn test_patterns_are_anchored() {
        let filter = ResourceMetaFilter::new().kind("Deployment").unwrap();
        assert_eq!(ids(&filter.filter(stream()).unwrap()), vec!["prod/Deployment/web"]);

        let filter = ResourceMetaFilter::new().name("web.*").unwrap();
        assert_eq!(filter.filter(stream()).unwrap().len(), 3);
    }

    #[test]
    fn test_dimensions_combine() {
        let filter = ResourceMetaFilter::new()
            .group("")
            .unwrap()
            .namespace("prod|staging")
            .unwrap()
            .version("v1")
            .unwrap()
            .name("web")
            .unwrap();
        assert_eq!(
            ids(&filter.filter(stream()).unwrap()),
            vec!["prod/Deployment/web", "staging/Service/web"]
        );

        // The core group is the empty string
        let filter = ResourceMetaFilter::new().group("apps").unwrap();
        assert_eq!(filter.filter(stream()).unwrap().len(), 2);
    }

    #[test]
    fn test_invalid_pattern() {
        let err = ResourceMetaFilter::new().kind("Deploy(").unwrap_err();
        assert!(matches!(err, FilterError::InvalidPattern { field: "kind", .. }));
    }
}
