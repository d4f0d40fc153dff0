//! kubeadm config synthesis for keel nodes
//!
//! Everything here is pure computation: address selection, node naming and
//! matching, building the per-node [`ConfigData`], rendering it, and running
//! the patch pipeline over the result. Node I/O lives in `keel-node` and the
//! concurrent fan-out in the `keel` crate.

#![deny(missing_docs)]

pub mod address;
pub mod config_data;
pub mod naming;
pub mod template;
pub mod version;

pub use address::resolve_node_address;
pub use config_data::{ConfigData, NodeOverrides, BOOTSTRAP_TOKEN};
pub use naming::{match_node_spec, node_names, NodeNamer};
pub use template::ConfigRenderer;
pub use version::KubeVersion;

use keel_common::{ClusterSpec, NodeSpec, Result};
use tracing::debug;

/// Render and patch one node's final kubeadm config
///
/// Cluster-wide patches are applied before the node's own patches, so the
/// node scope wins. The synthetic `metadata.name: config` marker is removed
/// last.
pub fn kubeadm_config(
    renderer: &ConfigRenderer,
    cluster: &ClusterSpec,
    node: &NodeSpec,
    data: &ConfigData,
) -> Result<String> {
    let rendered = renderer.render(data)?;

    let patched = keel_patch::patch_kube_yaml(
        &rendered,
        &cluster.config_patches,
        &cluster.config_patches_structured,
    )?;

    let patched = if node.has_patches() {
        debug!(node = %data.node_name, "applying node kubeadm patches");
        keel_patch::patch_kube_yaml(
            &patched,
            &node.kubeadm_config_patches,
            &node.kubeadm_config_patches_json6902,
        )?
    } else {
        patched
    };

    Ok(keel_patch::strip_config_marker(&patched))
}
