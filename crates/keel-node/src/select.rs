//! Grouping live nodes by role

use std::sync::Arc;

use keel_common::{NodeRole, Result};

use crate::Node;

/// Live nodes split by role, each list sorted by node name
#[derive(Default)]
pub struct NodesByRole {
    /// Control-plane nodes
    pub control_planes: Vec<Arc<dyn Node>>,
    /// Worker nodes
    pub workers: Vec<Arc<dyn Node>>,
}

/// Ask every node for its role and group them
///
/// Names sort as plain strings, so `kind-worker10` comes before
/// `kind-worker2`. Callers that need declaration order reorder by the
/// node's config entry.
pub async fn select_by_role(nodes: &[Arc<dyn Node>]) -> Result<NodesByRole> {
    let mut selected = NodesByRole::default();
    for node in nodes {
        let role = node.role().await.map_err(|e| e.for_node(node.name()))?;
        match role {
            NodeRole::ControlPlane => selected.control_planes.push(Arc::clone(node)),
            NodeRole::Worker => selected.workers.push(Arc::clone(node)),
        }
    }
    selected.control_planes.sort_by_key(|n| n.name());
    selected.workers.sort_by_key(|n| n.name());
    Ok(selected)
}
