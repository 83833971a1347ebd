//! Workload detection
//!
//! A workload is the top of a controller chain that ends in a Pod: the
//! Deployment behind a ReplicaSet, the CronJob behind a Job. Every resource
//! with containers is followed up its controller owner references while the
//! owner is in the stream; the highest resource on that path that carries
//! containers itself is the workload. An operator's custom resource at the
//! top of the chain therefore leaves the StatefulSet it controls as the
//! workload, and running the filter on its own output changes nothing.
//! Rendered manifests without Pods resolve the same way.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use std::collections::{HashMap, HashSet};

use konjure_core::Node;
use konjure_core::node::split_api_version;

use crate::error::Result;
use crate::filters::Filter;

const AUTOSCALING_GROUP: &str = "autoscaling";

/// Paths (relative to the document root) that hold a pod's containers
const CONTAINER_PATHS: &[&[&str]] = &[
    &["spec", "containers"],
    &["spec", "template", "spec", "containers"],
    &["spec", "jobTemplate", "spec", "template", "spec", "containers"],
];

/// Identity of a resource within a stream
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ResourceId {
    group: String,
    kind: String,
    namespace: String,
    name: String,
}

impl ResourceId {
    fn of(node: &Node) -> Self {
        Self {
            group: node.group().to_string(),
            kind: node.kind().to_string(),
            namespace: node.namespace().to_string(),
            name: node.name().to_string(),
        }
    }

    fn cluster_scoped(&self) -> Self {
        Self {
            namespace: String::new(),
            ..self.clone()
        }
    }
}

/// The controller owner reference of a node, if any
fn controller(node: &Node) -> Option<OwnerReference> {
    let refs = node.lookup(&["metadata", "ownerReferences"])?;
    let refs: Vec<OwnerReference> = match serde_yaml::from_value(refs.clone()) {
        Ok(refs) => refs,
        Err(err) => {
            tracing::warn!(resource = %node.display_name(), %err, "ignoring malformed owner references");
            return None;
        }
    };
    refs.into_iter().find(|r| r.controller == Some(true))
}

fn has_containers(node: &Node) -> bool {
    CONTAINER_PATHS.iter().any(|path| node.lookup(path).is_some())
}

fn is_autoscaling(node: &Node) -> bool {
    node.group() == AUTOSCALING_GROUP
}

/// Keeps only the workload resources of a stream
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkloadFilter {
    /// Keep autoscalers targeting a workload
    pub capture_autoscaling: bool,
}

impl WorkloadFilter {
    pub fn new(capture_autoscaling: bool) -> Self {
        Self {
            capture_autoscaling,
        }
    }

    /// Identities of the workloads in the stream
    fn workloads(&self, nodes: &[Node]) -> HashSet<ResourceId> {
        let present: HashSet<ResourceId> = nodes.iter().map(ResourceId::of).collect();
        let with_containers: HashSet<ResourceId> = nodes
            .iter()
            .filter(|n| has_containers(n))
            .map(ResourceId::of)
            .collect();

        let mut owners: HashMap<ResourceId, ResourceId> = HashMap::new();
        for node in nodes {
            let Some(owner) = controller(node) else {
                continue;
            };
            let id = ResourceId::of(node);
            let owner_id = ResourceId {
                group: split_api_version(&owner.api_version).0.to_string(),
                kind: owner.kind,
                namespace: id.namespace.clone(),
                name: owner.name,
            };
            // Namespaced resources may be owned by cluster scoped ones
            let owner_id = if present.contains(&owner_id.cluster_scoped()) {
                owner_id.cluster_scoped()
            } else {
                owner_id
            };
            owners.insert(id, owner_id);
        }

        let mut workloads = HashSet::new();
        for start in &with_containers {
            let mut current = start;
            let mut top = start;
            let mut seen = HashSet::new();
            while let Some(owner) = owners.get(current) {
                if !present.contains(owner) || !seen.insert(current) {
                    break;
                }
                current = owner;
                if with_containers.contains(current) {
                    top = current;
                }
            }
            workloads.insert(top.clone());
        }
        workloads
    }

    /// Is this autoscaler scaling one of the workloads?
    ///
    /// The target group is not compared, `scaleTargetRef` often carries a
    /// legacy API version.
    fn targets_workload(node: &Node, workloads: &HashSet<ResourceId>) -> bool {
        let target = |field: &str| node.lookup_str(&["spec", "scaleTargetRef", field]);
        let (Some(kind), Some(name)) = (target("kind"), target("name")) else {
            return false;
        };
        workloads
            .iter()
            .any(|w| w.kind == kind && w.name == name && w.namespace == node.namespace())
    }
}

impl Filter for WorkloadFilter {
    fn filter(&self, nodes: Vec<Node>) -> Result<Vec<Node>> {
        let workloads = self.workloads(&nodes);
        tracing::debug!(count = workloads.len(), "detected workloads");

        Ok(nodes
            .into_iter()
            .filter(|node| {
                if is_autoscaling(node) {
                    self.capture_autoscaling && Self::targets_workload(node, &workloads)
                } else {
                    workloads.contains(&ResourceId::of(node))
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use konjure_core::yaml::parse_documents;

    fn ids(nodes: &[Node]) -> Vec<String> {
        nodes.iter().map(|n| format!("{}/{}", n.kind(), n.name())).collect()
    }

    fn live_stream() -> Vec<Node> {
        parse_documents(
            r#"apiVersion: v1
kind: Pod
metadata:
  name: dep-abc-123
  namespace: web
  ownerReferences:
  - apiVersion: apps/v1
    kind: ReplicaSet
    name: rs-1
    uid: "1"
    controller: true
spec:
  containers:
  - name: app
    image: nginx
---
apiVersion: apps/v1
kind: ReplicaSet
metadata:
  name: rs-1
  namespace: web
  ownerReferences:
  - apiVersion: apps/v1
    kind: Deployment
    name: dep
    uid: "2"
    controller: true
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: dep
  namespace: web
spec:
  template:
    spec:
      containers:
      - name: app
        image: nginx
---
apiVersion: v1
kind: Service
metadata:
  name: svc
  namespace: web
---
apiVersion: autoscaling/v2
kind: HorizontalPodAutoscaler
metadata:
  name: dep
  namespace: web
spec:
  scaleTargetRef:
    apiVersion: apps/v1
    kind: Deployment
    name: dep
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_walks_controller_chain() {
        let out = WorkloadFilter::new(false).filter(live_stream()).unwrap();
        assert_eq!(ids(&out), vec!["Deployment/dep"]);
    }

    #[test]
    fn test_capture_autoscaling() {
        let out = WorkloadFilter::new(true).filter(live_stream()).unwrap();
        assert_eq!(ids(&out), vec!["Deployment/dep", "HorizontalPodAutoscaler/dep"]);
    }

    #[test]
    fn test_filter_is_idempotent() {
        for capture in [false, true] {
            let filter = WorkloadFilter::new(capture);
            let once = filter.filter(live_stream()).unwrap();
            let twice = filter.filter(once.clone()).unwrap();
            assert_eq!(twice, once);
        }
    }

    fn operator_stream() -> Vec<Node> {
        parse_documents(
            r#"apiVersion: v1
kind: Pod
metadata:
  name: db-0
  namespace: data
  ownerReferences:
  - apiVersion: apps/v1
    kind: StatefulSet
    name: db
    uid: "4"
    controller: true
spec:
  containers:
  - name: postgres
    image: postgres
---
apiVersion: apps/v1
kind: StatefulSet
metadata:
  name: db
  namespace: data
  ownerReferences:
  - apiVersion: example.com/v1
    kind: Cluster
    name: db
    uid: "5"
    controller: true
spec:
  template:
    spec:
      containers:
      - name: postgres
        image: postgres
---
apiVersion: example.com/v1
kind: Cluster
metadata:
  name: db
  namespace: data
spec:
  instances: 1
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_chain_stops_below_owner_without_containers() {
        let filter = WorkloadFilter::default();
        let once = filter.filter(operator_stream()).unwrap();
        assert_eq!(ids(&once), vec!["StatefulSet/db"]);

        let twice = filter.filter(once.clone()).unwrap();
        assert_eq!(twice, once);
    }

    #[test]
    fn test_mixed_stream_is_stable() {
        let mut nodes = live_stream();
        nodes.extend(
            parse_documents(
                "apiVersion: v1\nkind: Pod\nmetadata:\n  name: debug\n  namespace: web\nspec:\n  containers:\n  - name: sh\n    image: busybox\n",
            )
            .unwrap(),
        );
        let filter = WorkloadFilter::default();
        let once = filter.filter(nodes).unwrap();
        assert_eq!(ids(&once), vec!["Deployment/dep", "Pod/debug"]);
        assert_eq!(filter.filter(once.clone()).unwrap(), once);
    }

    #[test]
    fn test_pod_less_fallback() {
        let nodes = parse_documents(
            r#"apiVersion: batch/v1
kind: CronJob
metadata:
  name: backup
spec:
  jobTemplate:
    spec:
      template:
        spec:
          containers:
          - name: backup
            image: busybox
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: settings
---
apiVersion: batch/v1
kind: Job
metadata:
  name: backup-123
  ownerReferences:
  - apiVersion: batch/v1
    kind: CronJob
    name: backup
    uid: "3"
    controller: true
spec:
  template:
    spec:
      containers:
      - name: backup
        image: busybox
"#,
        )
        .unwrap();

        let out = WorkloadFilter::default().filter(nodes).unwrap();
        assert_eq!(ids(&out), vec!["CronJob/backup"]);
    }

    #[test]
    fn test_unowned_pod_is_its_own_workload() {
        let nodes = parse_documents(
            "apiVersion: v1\nkind: Pod\nmetadata:\n  name: debug\n  namespace: default\nspec:\n  containers:\n  - name: sh\n    image: busybox\n",
        )
        .unwrap();
        let out = WorkloadFilter::default().filter(nodes).unwrap();
        assert_eq!(ids(&out), vec!["Pod/debug"]);
    }
}
