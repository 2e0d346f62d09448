//! Nodes eligible for backend pools

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use kube::api::ListParams;
use kube::{Api, Client};
use lb_sync_common::NodeRef;
use tracing::debug;

use crate::config::labels;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NodeLister: Send + Sync {
    /// Ready nodes that may receive load balancer traffic
    async fn eligible_nodes(&self) -> Result<Vec<NodeRef>, kube::Error>;
}

/// Lists nodes through the Kubernetes API
pub struct KubeNodeLister {
    api: Api<Node>,
}

impl KubeNodeLister {
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

#[async_trait]
impl NodeLister for KubeNodeLister {
    async fn eligible_nodes(&self) -> Result<Vec<NodeRef>, kube::Error> {
        let nodes = self.api.list(&ListParams::default()).await?;
        let eligible: Vec<NodeRef> = nodes.items.iter().filter_map(node_ref).collect();
        debug!(
            total = nodes.items.len(),
            eligible = eligible.len(),
            "Listed nodes"
        );
        Ok(eligible)
    }
}

fn is_excluded(node: &Node) -> bool {
    node.metadata.labels.as_ref().is_some_and(|node_labels| {
        [
            labels::EXCLUDE_FROM_EXTERNAL_LB,
            labels::CONTROL_PLANE_ROLE,
            labels::MASTER_ROLE,
        ]
        .iter()
        .any(|label| node_labels.contains_key(*label))
    })
}

fn is_ready(node: &Node) -> bool {
    node.status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .and_then(|conditions| conditions.iter().find(|c| c.type_ == "Ready"))
        .is_some_and(|ready| ready.status == "True")
}

/// Engine view of a node, or `None` when it must stay out of the pools
pub fn node_ref(node: &Node) -> Option<NodeRef> {
    let name = node.metadata.name.as_deref()?;
    if is_excluded(node) || !is_ready(node) {
        debug!(node = %name, "Skipping ineligible node");
        return None;
    }

    let mut node_ref = NodeRef::new(name);
    node_ref.provider_id = node.spec.as_ref().and_then(|spec| spec.provider_id.clone());
    Some(node_ref)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{NodeCondition, NodeSpec, NodeStatus};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    fn test_node(name: &str, node_labels: &[&str], ready: &str) -> Node {
        Node {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                labels: Some(
                    node_labels
                        .iter()
                        .map(|l| (l.to_string(), String::new()))
                        .collect::<BTreeMap<_, _>>(),
                ),
                ..Default::default()
            },
            spec: Some(NodeSpec {
                provider_id: Some(format!("cloud:///vm/{name}")),
                ..Default::default()
            }),
            status: Some(NodeStatus {
                conditions: Some(vec![NodeCondition {
                    type_: "Ready".to_string(),
                    status: ready.to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_ready_worker_is_eligible() {
        let node = node_ref(&test_node("worker-1", &[], "True")).unwrap();
        assert_eq!(node.name, "worker-1");
        assert_eq!(node.provider_id.as_deref(), Some("cloud:///vm/worker-1"));
    }

    #[test]
    fn test_excluded_labels() {
        for label in [
            labels::EXCLUDE_FROM_EXTERNAL_LB,
            labels::CONTROL_PLANE_ROLE,
            labels::MASTER_ROLE,
        ] {
            assert!(node_ref(&test_node("n", &[label], "True")).is_none());
        }
    }

    #[test]
    fn test_unready_node_is_skipped() {
        assert!(node_ref(&test_node("n", &[], "False")).is_none());
        assert!(node_ref(&test_node("n", &[], "Unknown")).is_none());

        let mut node = test_node("n", &[], "True");
        node.status = None;
        assert!(node_ref(&node).is_none());
    }
}
