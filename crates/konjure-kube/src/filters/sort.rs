use std::cmp::Ordering;
use std::str::FromStr;

use konjure_core::Node;

use super::Filter;
use crate::error::{FilterError, Result};

/// Kind order used by Helm when installing a release
pub const INSTALL_ORDER: &[&str] = &[
    "PriorityClass",
    "Namespace",
    "NetworkPolicy",
    "ResourceQuota",
    "LimitRange",
    "PodSecurityPolicy",
    "PodDisruptionBudget",
    "ServiceAccount",
    "Secret",
    "SecretList",
    "ConfigMap",
    "StorageClass",
    "PersistentVolume",
    "PersistentVolumeClaim",
    "CustomResourceDefinition",
    "ClusterRole",
    "ClusterRoleList",
    "ClusterRoleBinding",
    "ClusterRoleBindingList",
    "Role",
    "RoleList",
    "RoleBinding",
    "RoleBindingList",
    "Service",
    "DaemonSet",
    "Pod",
    "ReplicationController",
    "ReplicaSet",
    "Deployment",
    "HorizontalPodAutoscaler",
    "StatefulSet",
    "Job",
    "CronJob",
    "IngressClass",
    "Ingress",
    "APIService",
];

/// Kind order used by Helm when uninstalling a release
pub const UNINSTALL_ORDER: &[&str] = &[
    "APIService",
    "Ingress",
    "IngressClass",
    "Service",
    "CronJob",
    "Job",
    "StatefulSet",
    "HorizontalPodAutoscaler",
    "Deployment",
    "ReplicaSet",
    "ReplicationController",
    "Pod",
    "DaemonSet",
    "RoleBindingList",
    "RoleBinding",
    "RoleList",
    "Role",
    "ClusterRoleBindingList",
    "ClusterRoleBinding",
    "ClusterRoleList",
    "ClusterRole",
    "CustomResourceDefinition",
    "PersistentVolumeClaim",
    "PersistentVolume",
    "StorageClass",
    "ConfigMap",
    "SecretList",
    "Secret",
    "ServiceAccount",
    "PodDisruptionBudget",
    "PodSecurityPolicy",
    "LimitRange",
    "ResourceQuota",
    "NetworkPolicy",
    "Namespace",
    "PriorityClass",
];

/// Which kind ordering to sort by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Install,
    Uninstall,
}

impl SortOrder {
    pub fn kinds(&self) -> &'static [&'static str] {
        match self {
            SortOrder::Install => INSTALL_ORDER,
            SortOrder::Uninstall => UNINSTALL_ORDER,
        }
    }
}

impl FromStr for SortOrder {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "install" | "" => Ok(SortOrder::Install),
            "uninstall" => Ok(SortOrder::Uninstall),
            other => Err(FilterError::UnknownSortOrder(other.to_string())),
        }
    }
}

/// Stable sort by kind order; unknown kinds go last, ties break on kind
/// then name
#[derive(Debug, Clone, Copy, Default)]
pub struct SortFilter {
    pub order: SortOrder,
}

impl SortFilter {
    pub fn new(order: SortOrder) -> Self {
        Self { order }
    }

    fn compare(&self, a: &Node, b: &Node) -> Ordering {
        let kinds = self.order.kinds();
        let rank = |n: &Node| kinds.iter().position(|k| *k == n.kind()).unwrap_or(kinds.len());
        rank(a)
            .cmp(&rank(b))
            .then_with(|| a.kind().cmp(b.kind()))
            .then_with(|| a.name().cmp(b.name()))
    }
}

impl Filter for SortFilter {
    fn filter(&self, mut nodes: Vec<Node>) -> Result<Vec<Node>> {
        nodes.sort_by(|a, b| self.compare(a, b));
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
kind: Service
metadata:
  name: web
---
apiVersion: example.com/v1
kind: Widget
metadata:
  name: w
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: b
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: a
---
apiVersion: v1
kind: Namespace
metadata:
  name: web
"#,
        )
        .unwrap()
    }

    fn ids(nodes: &[Node]) -> Vec<String> {
        nodes.iter().map(|n| format!("{}/{}", n.kind(), n.name())).collect()
    }

    #[test]
    fn test_install_order() {
        let sorted = SortFilter::new(SortOrder::Install).filter(stream()).unwrap();
        assert_eq!(
            ids(&sorted),
            vec![
                "Namespace/web",
                "ConfigMap/a",
                "ConfigMap/b",
                "Service/web",
                "Deployment/web",
                "Widget/w",
            ]
        );
    }

    #[test]
    fn test_uninstall_order() {
        let sorted = SortFilter::new(SortOrder::Uninstall).filter(stream()).unwrap();
        assert_eq!(
            ids(&sorted),
            vec![
                "Service/web",
                "Deployment/web",
                "ConfigMap/a",
                "ConfigMap/b",
                "Namespace/web",
                "Widget/w",
            ]
        );
    }

    #[test]
    fn test_parse_order() {
        assert_eq!("Uninstall".parse::<SortOrder>().unwrap(), SortOrder::Uninstall);
        assert!("random".parse::<SortOrder>().is_err());
    }
}
