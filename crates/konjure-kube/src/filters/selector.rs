use konjure_core::{Node, Selector};

use super::Filter;
use crate::error::Result;

/// Keeps nodes whose labels and annotations match selector expressions
///
/// An empty expression matches everything.
#[derive(Debug, Clone, Default)]
pub struct SelectorFilter {
    labels: Selector,
    annotations: Selector,
}

impl SelectorFilter {
    pub fn new(label_selector: &str, annotation_selector: &str) -> Result<Self> {
        Ok(Self {
            labels: Selector::parse(label_selector)?,
            annotations: Selector::parse(annotation_selector)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty() && self.annotations.is_empty()
    }

    pub fn matches(&self, node: &Node) -> bool {
        self.labels.matches(&node.labels()) && self.annotations.matches(&node.annotations())
    }
}

impl Filter for SelectorFilter {
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
            r#"apiVersion: v1
kind: ConfigMap
metadata:
  name: a
  labels:
    tier: web
  annotations:
    team: blue
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: b
  labels:
    tier: db
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: c
"#,
        )
        .unwrap()
    }

    fn names(nodes: &[Node]) -> Vec<&str> {
        nodes.iter().map(|n| n.name()).collect()
    }

    #[test]
    fn test_label_selector() {
        let filter = SelectorFilter::new("tier in (web,db)", "").unwrap();
        assert_eq!(names(&filter.filter(stream()).unwrap()), vec!["a", "b"]);

        let filter = SelectorFilter::new("!tier", "").unwrap();
        assert_eq!(names(&filter.filter(stream()).unwrap()), vec!["c"]);
    }

    #[test]
    fn test_annotation_selector() {
        let filter = SelectorFilter::new("tier", "team=blue").unwrap();
        assert_eq!(names(&filter.filter(stream()).unwrap()), vec!["a"]);
    }

    #[test]
    fn test_empty_matches_all() {
        let filter = SelectorFilter::new("", " ").unwrap();
        assert!(filter.is_empty());
        assert_eq!(filter.filter(stream()).unwrap().len(), 3);
    }

    #[test]
    fn test_invalid_expression() {
        assert!(SelectorFilter::new("tier in (", "").is_err());
    }
}
