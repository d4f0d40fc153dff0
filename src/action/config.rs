//! Writes the kubeadm config to every node and re-patches containerd
//!
//! Phases:
//! 1. Pair every live node with the config entry it was created from and
//!    order each role by the position of that entry.
//! 2. Generate and write the config on every control-plane node.
//! 3. Same for workers, with the control-plane flag off.
//! 4. Join 2 and 3; the first error in launch order wins, successful
//!    writes on other nodes are left in place.
//! 5. If the cluster carries containerd patches, patch
//!    `/etc/containerd/config.toml` on every node and restart containerd.

use std::sync::Arc;

use keel_common::{
    ClusterSpec, Error, NodeSpec, ProviderInfo, Result, CONTAINERD_CONFIG_PATH,
    KUBEADM_CONFIG_PATH,
};
use keel_kubeadm::{
    kubeadm_config, match_node_spec, resolve_node_address, ConfigData, ConfigRenderer,
    NodeOverrides,
};
use keel_node::{argv, select_by_role, Node};
use tracing::{debug, info};

use super::run_concurrently;

/// Restarts containerd unless systemd is not running yet
pub const RESTART_CONTAINERD: &str =
    "! systemctl is-system-running || systemctl restart containerd";

/// One node's share of the kubeadm phase
struct NodeUnit<'a> {
    node: &'a Arc<dyn Node>,
    index: Option<usize>,
    spec: Result<&'a NodeSpec>,
    control_plane: bool,
}

impl NodeUnit<'_> {
    /// Position of the node's config entry; unmatched nodes go last
    fn declared_order(&self) -> usize {
        self.index.unwrap_or(usize::MAX)
    }
}

/// Generates per-node kubeadm configs and applies containerd patches
pub struct ConfigAction {
    cluster: ClusterSpec,
    provider: ProviderInfo,
    renderer: ConfigRenderer,
}

impl ConfigAction {
    /// Action for a validated cluster on the given provider
    pub fn new(cluster: ClusterSpec, provider: ProviderInfo) -> Self {
        Self {
            cluster,
            provider,
            renderer: ConfigRenderer::new(),
        }
    }

    /// The cluster this action configures
    pub fn cluster(&self) -> &ClusterSpec {
        &self.cluster
    }

    /// Run every phase against the cluster's live nodes
    pub async fn execute(&self, nodes: &[Arc<dyn Node>]) -> Result<()> {
        let by_role = select_by_role(nodes).await?;
        let template = ConfigData::template(&self.cluster, &self.provider);

        let mut units: Vec<NodeUnit<'_>> = by_role
            .control_planes
            .iter()
            .map(|node| self.pair(node, true))
            .collect();
        units.sort_by_key(|unit| unit.declared_order());
        let mut workers: Vec<NodeUnit<'_>> = by_role
            .workers
            .iter()
            .map(|node| self.pair(node, false))
            .collect();
        workers.sort_by_key(|unit| unit.declared_order());
        units.extend(workers);
        let ordered: Vec<&Arc<dyn Node>> = units.iter().map(|unit| unit.node).collect();

        info!(
            cluster = %self.cluster.name,
            control_planes = by_role.control_planes.len(),
            workers = by_role.workers.len(),
            "creating kubeadm config"
        );
        run_concurrently(
            units
                .into_iter()
                .map(|unit| self.write_kubeadm_config(unit, &template)),
        )
        .await?;

        if self.cluster.has_containerd_patches() {
            info!(cluster = %self.cluster.name, "patching containerd config");
            run_concurrently(ordered.into_iter().map(|node| self.patch_containerd(node))).await?;
        } else {
            debug!(cluster = %self.cluster.name, "no containerd patches, skipping");
        }

        info!(cluster = %self.cluster.name, "node configuration complete");
        Ok(())
    }

    fn pair<'a>(&'a self, node: &'a Arc<dyn Node>, control_plane: bool) -> NodeUnit<'a> {
        let index = match_node_spec(&node.name(), &self.cluster.nodes);
        NodeUnit {
            node,
            index: index.as_ref().ok().copied(),
            spec: index.map(|index| &self.cluster.nodes[index]),
            control_plane,
        }
    }

    async fn write_kubeadm_config(&self, unit: NodeUnit<'_>, template: &ConfigData) -> Result<()> {
        let name = unit.node.name();
        self.generate_kubeadm_config(&name, unit, template)
            .await
            .map_err(|e| e.for_node(&name))
    }

    async fn generate_kubeadm_config(
        &self,
        name: &str,
        unit: NodeUnit<'_>,
        template: &ConfigData,
    ) -> Result<()> {
        let spec = unit.spec?;

        let addresses = unit.node.addresses().await?;
        let address = resolve_node_address(
            self.cluster.networking.address_family,
            &addresses.ipv4,
            &addresses.ipv6,
        )?;
        let version = unit.node.kube_version().await?;

        let data = template.for_node(
            NodeOverrides {
                name,
                control_plane: unit.control_plane,
                labels: &spec.labels,
            },
            address,
            version,
        );
        let config = kubeadm_config(&self.renderer, &self.cluster, spec, &data)?;
        debug!(node = %name, config = %config, "using kubeadm config");

        unit.node.write_file(KUBEADM_CONFIG_PATH, &config).await
    }

    async fn patch_containerd(&self, node: &Arc<dyn Node>) -> Result<()> {
        let name = node.name();
        self.repatch_containerd(node.as_ref())
            .await
            .map_err(|e| e.for_node(&name))
    }

    async fn repatch_containerd(&self, node: &dyn Node) -> Result<()> {
        let current = node.run(&argv(["cat", CONTAINERD_CONFIG_PATH])).await?;
        let current = String::from_utf8(current).map_err(|e| {
            Error::serialization(format!("{CONTAINERD_CONFIG_PATH} is not UTF-8: {e}"))
        })?;

        let patched = keel_patch::patch_toml(
            &current,
            &self.cluster.containerd_patches,
            &self.cluster.containerd_patches_structured,
        )?;
        node.write_file(CONTAINERD_CONFIG_PATH, &patched).await?;

        node.run(&argv(["bash", "-c", RESTART_CONTAINERD])).await?;
        debug!(node = %node.name(), "restarted containerd");
        Ok(())
    }
}
