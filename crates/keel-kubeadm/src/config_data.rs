//! Per-node configuration data fed to the kubeadm template

use std::collections::BTreeMap;

use indexmap::IndexMap;
use keel_common::{
    AddressFamily, ClusterSpec, ProviderInfo, ProxyMode, APISERVER_INTERNAL_PORT,
};
use serde::Serialize;

/// Well-known bootstrap token shared by every node of a cluster
pub const BOOTSTRAP_TOKEN: &str = "abcdef.0123456789abcdef";

/// Flat record rendered into one node's kubeadm config
///
/// Built fresh for every node: [`ConfigData::template`] captures the
/// cluster-wide fields once and [`ConfigData::for_node`] returns an owned
/// copy with the node's own fields filled in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConfigData {
    /// Cluster name
    pub cluster_name: String,
    /// Provider name used in the node's provider-id
    pub node_provider: String,
    /// Whether the provider is rootless
    pub rootless: bool,
    /// Node name
    pub node_name: String,
    /// True for control-plane nodes
    pub control_plane: bool,
    /// API server endpoint nodes join through
    pub control_plane_endpoint: String,
    /// Port the API server binds on control-plane nodes
    pub api_bind_port: u16,
    /// Host-side API server address, added to the serving cert SANs
    pub api_server_address: String,
    /// Bootstrap token
    pub token: String,
    /// Pod CIDR(s)
    pub pod_subnet: String,
    /// Service CIDR(s)
    pub service_subnet: String,
    /// kube-proxy mode
    pub kube_proxy_mode: ProxyMode,
    /// Cluster address family
    pub ip_family: AddressFamily,
    /// Feature gates for every component
    pub feature_gates: BTreeMap<String, bool>,
    /// API server runtime-config entries
    pub runtime_config: BTreeMap<String, String>,
    /// Node address, comma separated for dual-stack
    pub node_address: String,
    /// Kubelet node labels as `k=v,k2=v2`
    pub node_labels: String,
    /// Kubernetes version running on the node
    pub kubernetes_version: String,
}

/// Fields that differ between nodes
#[derive(Clone, Copy, Debug)]
pub struct NodeOverrides<'a> {
    /// Node name
    pub name: &'a str,
    /// True for control-plane nodes
    pub control_plane: bool,
    /// The node's labels from its config entry
    pub labels: &'a IndexMap<String, String>,
}

impl ConfigData {
    /// Cluster-wide fields; node fields are left empty
    pub fn template(cluster: &ClusterSpec, provider: &ProviderInfo) -> Self {
        let net = &cluster.networking;
        Self {
            cluster_name: cluster.name.clone(),
            node_provider: provider.name.clone(),
            rootless: provider.rootless,
            node_name: String::new(),
            control_plane: true,
            control_plane_endpoint: provider.control_plane_endpoint.clone(),
            api_bind_port: APISERVER_INTERNAL_PORT,
            api_server_address: net.api_server_address.clone(),
            token: BOOTSTRAP_TOKEN.to_string(),
            pod_subnet: net.pod_subnet.clone(),
            service_subnet: net.service_subnet.clone(),
            kube_proxy_mode: net.proxy_mode,
            ip_family: net.address_family,
            feature_gates: cluster.feature_gates.clone(),
            runtime_config: cluster.runtime_config.clone(),
            node_address: String::new(),
            node_labels: String::new(),
            kubernetes_version: String::new(),
        }
    }

    /// A copy of this template filled in for one node
    pub fn for_node(
        &self,
        node: NodeOverrides<'_>,
        node_address: impl Into<String>,
        kubernetes_version: impl Into<String>,
    ) -> Self {
        Self {
            node_name: node.name.to_string(),
            control_plane: node.control_plane,
            node_labels: labels_arg(node.labels),
            node_address: node_address.into(),
            kubernetes_version: kubernetes_version.into(),
            ..self.clone()
        }
    }

    /// Build one node's data straight from the cluster model
    pub fn build(
        cluster: &ClusterSpec,
        provider: &ProviderInfo,
        node: NodeOverrides<'_>,
        node_address: impl Into<String>,
        kubernetes_version: impl Into<String>,
    ) -> Self {
        Self::template(cluster, provider).for_node(node, node_address, kubernetes_version)
    }

    /// First address of the node, used as the API advertise address
    pub fn advertise_address(&self) -> &str {
        self.node_address.split(',').next().unwrap_or_default()
    }

    /// True when components should bind IPv6 wildcard addresses
    pub fn ipv6(&self) -> bool {
        self.ip_family == AddressFamily::IPv6
    }
}

/// Join labels as `k=v` pairs separated by commas, in declaration order
///
/// Keys and values are not escaped; a `,` or `=` inside one produces an
/// ambiguous argument.
pub fn labels_arg(labels: &IndexMap<String, String>) -> String {
    join_pairs(labels.iter().map(|(k, v)| (k.as_str(), v.clone())))
}

/// `--feature-gates` argument value, sorted by gate name
pub fn feature_gates_arg(gates: &BTreeMap<String, bool>) -> String {
    join_pairs(gates.iter().map(|(k, v)| (k.as_str(), v.to_string())))
}

/// `--runtime-config` argument value, sorted by key
pub fn runtime_config_arg(config: &BTreeMap<String, String>) -> String {
    join_pairs(config.iter().map(|(k, v)| (k.as_str(), v.clone())))
}

fn join_pairs<'a>(pairs: impl Iterator<Item = (&'a str, String)>) -> String {
    pairs
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_common::{NodeRole, NodeSpec};

    fn cluster() -> ClusterSpec {
        let mut cluster = ClusterSpec {
            name: "dev".to_string(),
            nodes: vec![NodeSpec::new(NodeRole::ControlPlane)],
            ..Default::default()
        };
        cluster.feature_gates.insert("B".to_string(), false);
        cluster.feature_gates.insert("A".to_string(), true);
        cluster.set_defaults();
        cluster
    }

    #[test]
    fn labels_join_without_trailing_separator() {
        let mut labels = IndexMap::new();
        assert_eq!(labels_arg(&labels), "");

        labels.insert("tier".to_string(), "frontend".to_string());
        labels.insert("app".to_string(), "web".to_string());
        assert_eq!(labels_arg(&labels), "tier=frontend,app=web");
    }

    #[test]
    fn labels_follow_the_cluster_config_order() {
        let cluster = ClusterSpec::from_yaml(
            "nodes:\n- role: control-plane\n  labels:\n    zone: a\n    app: web\n",
        )
        .unwrap();
        assert_eq!(labels_arg(&cluster.nodes[0].labels), "zone=a,app=web");
    }

    #[test]
    fn labels_are_not_escaped() {
        let mut labels = IndexMap::new();
        labels.insert("a".to_string(), "x,y=z".to_string());
        assert_eq!(labels_arg(&labels), "a=x,y=z");
    }

    #[test]
    fn feature_gates_sorted() {
        assert_eq!(feature_gates_arg(&cluster().feature_gates), "A=true,B=false");
    }

    #[test]
    fn for_node_fills_node_fields_only() {
        let provider = ProviderInfo::container("docker", "dev", 1);
        let template = ConfigData::template(&cluster(), &provider);
        let mut labels = IndexMap::new();
        labels.insert("role".to_string(), "edge".to_string());

        let data = template.for_node(
            NodeOverrides {
                name: "dev-worker",
                control_plane: false,
                labels: &labels,
            },
            "172.18.0.3",
            "v1.29.2",
        );

        assert_eq!(data.node_name, "dev-worker");
        assert!(!data.control_plane);
        assert_eq!(data.node_labels, "role=edge");
        assert_eq!(data.node_address, "172.18.0.3");
        assert_eq!(data.kubernetes_version, "v1.29.2");
        assert_eq!(data.control_plane_endpoint, "dev-control-plane:6443");
        assert_eq!(data.pod_subnet, "10.244.0.0/16");
        // the template itself is untouched
        assert!(template.node_name.is_empty());
        assert!(template.control_plane);
    }

    #[test]
    fn advertise_address_is_first_of_dual_stack() {
        let provider = ProviderInfo::container("docker", "dev", 1);
        let labels = IndexMap::new();
        let data = ConfigData::build(
            &cluster(),
            &provider,
            NodeOverrides {
                name: "dev-control-plane",
                control_plane: true,
                labels: &labels,
            },
            "10.0.0.1,fd00::1",
            "v1.29.2",
        );
        assert_eq!(data.advertise_address(), "10.0.0.1");
        assert!(!data.ipv6());
    }
}
