//! Declarative cluster model
//!
//! The shape follows the kind `Cluster` config file so existing configs load
//! unchanged: per-node `kubeadmConfigPatches`, cluster-wide
//! `containerdConfigPatches`, and so on. Unknown keys (`kind`, `apiVersion`,
//! `extraMounts`, ...) are ignored.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{AddressFamily, NodeRole, OverlayPatch, ProxyMode, StructuredPatch};
use crate::{Error, Result};

/// Cluster name used when the config does not set one
pub const DEFAULT_CLUSTER_NAME: &str = "kind";

const DEFAULT_POD_SUBNET_V4: &str = "10.244.0.0/16";
const DEFAULT_POD_SUBNET_V6: &str = "fd00:10:244::/56";
const DEFAULT_SERVICE_SUBNET_V4: &str = "10.96.0.0/16";
const DEFAULT_SERVICE_SUBNET_V6: &str = "fd00:10:96::/112";

/// A multi-node cluster description
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// Cluster name, used as the node name prefix
    #[serde(default)]
    pub name: String,

    /// Cluster networking parameters
    #[serde(default)]
    pub networking: Networking,

    /// Kubernetes feature gates applied to every component
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub feature_gates: BTreeMap<String, bool>,

    /// API server `--runtime-config` entries
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub runtime_config: BTreeMap<String, String>,

    /// Nodes in declaration order
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,

    /// Overlays applied to every node's kubeadm config
    #[serde(default, rename = "kubeadmConfigPatches")]
    pub config_patches: Vec<OverlayPatch>,

    /// RFC 6902 patches applied to every node's kubeadm config
    #[serde(default, rename = "kubeadmConfigPatchesJSON6902")]
    pub config_patches_structured: Vec<StructuredPatch>,

    /// Overlays applied to every node's containerd config
    #[serde(default, rename = "containerdConfigPatches")]
    pub containerd_patches: Vec<OverlayPatch>,

    /// RFC 6902 patches applied to every node's containerd config
    #[serde(default, rename = "containerdConfigPatchesJSON6902")]
    pub containerd_patches_structured: Vec<StructuredPatch>,
}

/// Cluster networking parameters
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Networking {
    /// Address family nodes are configured for
    #[serde(default, rename = "ipFamily", alias = "addressFamily")]
    pub address_family: AddressFamily,

    /// Address the API server is exposed on from the host
    #[serde(default)]
    pub api_server_address: String,

    /// Pod CIDR(s), comma separated for dual-stack
    #[serde(default)]
    pub pod_subnet: String,

    /// Service CIDR(s), comma separated for dual-stack
    #[serde(default)]
    pub service_subnet: String,

    /// kube-proxy mode
    #[serde(default, rename = "kubeProxyMode", alias = "proxyMode")]
    pub proxy_mode: ProxyMode,
}

/// Declarative entry for one node
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpec {
    /// Node role
    #[serde(default)]
    pub role: NodeRole,

    /// Kubelet node labels, in the order they were declared
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub labels: IndexMap<String, String>,

    /// Overlays applied to this node's kubeadm config after the cluster's
    #[serde(default)]
    pub kubeadm_config_patches: Vec<OverlayPatch>,

    /// RFC 6902 patches applied to this node's kubeadm config after the cluster's
    #[serde(default, rename = "kubeadmConfigPatchesJSON6902")]
    pub kubeadm_config_patches_json6902: Vec<StructuredPatch>,
}

impl NodeSpec {
    /// A node with the given role and no labels or patches
    pub fn new(role: NodeRole) -> Self {
        Self {
            role,
            ..Default::default()
        }
    }

    /// Add a kubelet label
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// True when the node carries its own kubeadm patches
    pub fn has_patches(&self) -> bool {
        !self.kubeadm_config_patches.is_empty() || !self.kubeadm_config_patches_json6902.is_empty()
    }
}

impl ClusterSpec {
    /// Parse a cluster config file, fill defaults, and validate it
    pub fn from_yaml(input: &str) -> Result<Self> {
        let mut spec: ClusterSpec = serde_yaml::from_str(input)?;
        spec.set_defaults();
        spec.validate()?;
        Ok(spec)
    }

    /// Fill unset fields with kind's defaults
    pub fn set_defaults(&mut self) {
        if self.name.is_empty() {
            self.name = DEFAULT_CLUSTER_NAME.to_string();
        }
        if self.nodes.is_empty() {
            self.nodes.push(NodeSpec::new(NodeRole::ControlPlane));
        }

        let net = &mut self.networking;
        if net.api_server_address.is_empty() {
            net.api_server_address = match net.address_family {
                AddressFamily::IPv6 => "::1",
                _ => "127.0.0.1",
            }
            .to_string();
        }
        if net.pod_subnet.is_empty() {
            net.pod_subnet = match net.address_family {
                AddressFamily::IPv4 => DEFAULT_POD_SUBNET_V4.to_string(),
                AddressFamily::IPv6 => DEFAULT_POD_SUBNET_V6.to_string(),
                AddressFamily::DualStack => {
                    format!("{DEFAULT_POD_SUBNET_V4},{DEFAULT_POD_SUBNET_V6}")
                }
            };
        }
        if net.service_subnet.is_empty() {
            net.service_subnet = match net.address_family {
                AddressFamily::IPv4 => DEFAULT_SERVICE_SUBNET_V4.to_string(),
                AddressFamily::IPv6 => DEFAULT_SERVICE_SUBNET_V6.to_string(),
                AddressFamily::DualStack => {
                    format!("{DEFAULT_SERVICE_SUBNET_V4},{DEFAULT_SERVICE_SUBNET_V6}")
                }
            };
        }
        debug!(cluster = %self.name, nodes = self.nodes.len(), "applied cluster defaults");
    }

    /// Check the invariants the pipeline relies on
    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(Error::validation(format!(
                "cluster {} must declare at least one node",
                self.name
            )));
        }
        if !self.nodes.iter().any(|n| n.role == NodeRole::ControlPlane) {
            return Err(Error::validation(format!(
                "cluster {} must declare at least one control-plane node",
                self.name
            )));
        }
        Ok(())
    }

    /// True when the containerd config needs re-patching on every node
    pub fn has_containerd_patches(&self) -> bool {
        !self.containerd_patches.is_empty() || !self.containerd_patches_structured.is_empty()
    }

    /// Number of declared nodes with the given role
    pub fn count_role(&self, role: NodeRole) -> usize {
        self.nodes.iter().filter(|n| n.role == role).count()
    }
}
