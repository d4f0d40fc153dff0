//! kubeadm config rendering
//!
//! The template is compiled into the binary and rendered with strict
//! undefined handling, so a field missing from the context is a render error
//! instead of an empty string in the output.

use keel_common::{Error, Result};
use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;

use crate::config_data::{feature_gates_arg, runtime_config_arg, ConfigData};
use crate::version::KubeVersion;

const KUBEADM_TEMPLATE_NAME: &str = "kubeadm.yaml";
const KUBEADM_TEMPLATE: &str = include_str!("templates/kubeadm.yaml.j2");

/// Values derived from [`ConfigData`] at render time
#[derive(Serialize)]
struct RenderContext<'a> {
    #[serde(flatten)]
    data: &'a ConfigData,
    kubeadm_api_version: &'static str,
    advertise_address: &'a str,
    ipv6: bool,
    feature_gates_arg: String,
    runtime_config_arg: String,
}

/// Renders [`ConfigData`] into the multi-document kubeadm config
///
/// Every document carries a `metadata.name: config` block so patches can
/// address it; strip it with [`keel_patch::strip_config_marker`] once
/// patching is done.
pub struct ConfigRenderer {
    env: Environment<'static>,
}

impl Default for ConfigRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigRenderer {
    /// Create a renderer with the built-in kubeadm template
    ///
    /// # Panics
    ///
    /// Panics if the embedded template fails to compile, which a unit test
    /// rules out.
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_keep_trailing_newline(true);
        env.add_template(KUBEADM_TEMPLATE_NAME, KUBEADM_TEMPLATE)
            .expect("kubeadm template is hardcoded and valid");
        Self { env }
    }

    /// Render one node's kubeadm config
    ///
    /// # Errors
    ///
    /// Returns `VersionDiscovery` if the node's Kubernetes version does not
    /// parse, and `Template` if rendering fails.
    pub fn render(&self, data: &ConfigData) -> Result<String> {
        let version = KubeVersion::parse(&data.kubernetes_version)?;
        let ctx = RenderContext {
            data,
            kubeadm_api_version: version.kubeadm_api_version(),
            advertise_address: data.advertise_address(),
            ipv6: data.ipv6(),
            feature_gates_arg: feature_gates_arg(&data.feature_gates),
            runtime_config_arg: runtime_config_arg(&data.runtime_config),
        };

        self.env
            .get_template(KUBEADM_TEMPLATE_NAME)
            .and_then(|t| t.render(&ctx))
            .map_err(|e| Error::template(format!("failed to render kubeadm config: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::*;
    use crate::config_data::NodeOverrides;
    use keel_common::{AddressFamily, ClusterSpec, NodeRole, NodeSpec, ProviderInfo};
    use keel_patch::CONFIG_MARKER;

    fn render(cluster: &ClusterSpec, control_plane: bool, address: &str, version: &str) -> String {
        let provider = ProviderInfo::container("docker", &cluster.name, 1);
        let labels = IndexMap::from([("tier".to_string(), "edge".to_string())]);
        let data = ConfigData::build(
            cluster,
            &provider,
            NodeOverrides {
                name: "kind-control-plane",
                control_plane,
                labels: &labels,
            },
            address,
            version,
        );
        ConfigRenderer::new().render(&data).unwrap()
    }

    fn cluster(family: AddressFamily) -> ClusterSpec {
        let mut cluster = ClusterSpec {
            nodes: vec![NodeSpec::new(NodeRole::ControlPlane)],
            ..Default::default()
        };
        cluster.networking.address_family = family;
        cluster.set_defaults();
        cluster
    }

    fn documents(rendered: &str) -> Vec<serde_yaml::Value> {
        rendered
            .split("---\n")
            .map(|doc| serde_yaml::from_str(doc).unwrap())
            .collect()
    }

    fn kinds(rendered: &str) -> Vec<String> {
        documents(rendered)
            .iter()
            .map(|d| d["kind"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn renders_five_documents_each_with_marker() {
        let out = render(&cluster(AddressFamily::IPv4), true, "172.18.0.2", "v1.29.2");
        assert_eq!(
            kinds(&out),
            vec![
                "ClusterConfiguration",
                "InitConfiguration",
                "JoinConfiguration",
                "KubeletConfiguration",
                "KubeProxyConfiguration",
            ]
        );
        assert_eq!(out.matches(CONFIG_MARKER).count(), 5);
        assert!(out.ends_with('\n'));
    }

    #[test]
    fn node_fields_are_rendered() {
        let out = render(&cluster(AddressFamily::IPv4), true, "172.18.0.2", "v1.29.2");
        let docs = documents(&out);

        assert_eq!(docs[0]["apiVersion"], "kubeadm.k8s.io/v1beta3");
        assert_eq!(docs[0]["networking"]["podSubnet"], "10.244.0.0/16");
        assert_eq!(docs[0]["controlPlaneEndpoint"], "kind-control-plane:6443");
        assert_eq!(docs[1]["localAPIEndpoint"]["advertiseAddress"], "172.18.0.2");
        assert_eq!(
            docs[1]["nodeRegistration"]["kubeletExtraArgs"]["provider-id"],
            "kind://docker/kind/kind-control-plane"
        );
        assert_eq!(
            docs[1]["nodeRegistration"]["kubeletExtraArgs"]["node-labels"],
            "tier=edge"
        );
        assert_eq!(docs[4]["mode"], "iptables");
    }

    #[test]
    fn join_configuration_only_has_control_plane_for_control_plane_nodes() {
        let cp = documents(&render(&cluster(AddressFamily::IPv4), true, "10.0.0.2", "v1.29.2"));
        let worker = documents(&render(&cluster(AddressFamily::IPv4), false, "10.0.0.3", "v1.29.2"));

        assert_eq!(
            cp[2]["controlPlane"]["localAPIEndpoint"]["advertiseAddress"],
            "10.0.0.2"
        );
        assert!(worker[2].get("controlPlane").is_none());
    }

    #[test]
    fn old_kubernetes_uses_v1beta2() {
        let out = render(&cluster(AddressFamily::IPv4), true, "10.0.0.2", "v1.22.17");
        assert!(out.starts_with("apiVersion: kubeadm.k8s.io/v1beta2\n"));
    }

    #[test]
    fn ipv6_binds_wildcard_and_uses_v6_subnets() {
        let out = render(&cluster(AddressFamily::IPv6), true, "fd00::2", "v1.29.2");
        let docs = documents(&out);

        assert_eq!(docs[0]["networking"]["podSubnet"], "fd00:10:244::/56");
        assert_eq!(docs[0]["controllerManager"]["extraArgs"]["bind-address"], "::");
        assert_eq!(docs[3]["address"], "::");
        assert_eq!(docs[1]["localAPIEndpoint"]["advertiseAddress"], "fd00::2");
    }

    #[test]
    fn dual_stack_advertises_first_address() {
        let out = render(
            &cluster(AddressFamily::DualStack),
            true,
            "10.0.0.2,fd00::2",
            "v1.29.2",
        );
        let docs = documents(&out);

        assert_eq!(docs[1]["localAPIEndpoint"]["advertiseAddress"], "10.0.0.2");
        assert_eq!(
            docs[1]["nodeRegistration"]["kubeletExtraArgs"]["node-ip"],
            "10.0.0.2,fd00::2"
        );
        assert!(docs[3].get("address").is_none());
    }

    #[test]
    fn feature_gates_reach_every_component() {
        let mut c = cluster(AddressFamily::IPv4);
        c.feature_gates.insert("Zeta".to_string(), false);
        c.feature_gates.insert("Alpha".to_string(), true);
        let docs = documents(&render(&c, true, "10.0.0.2", "v1.29.2"));

        assert_eq!(
            docs[0]["apiServer"]["extraArgs"]["feature-gates"],
            "Alpha=true,Zeta=false"
        );
        assert_eq!(docs[3]["featureGates"]["Alpha"], true);
        assert_eq!(docs[4]["featureGates"]["Zeta"], false);
    }

    #[test]
    fn invalid_version_is_rejected_before_rendering() {
        let provider = ProviderInfo::container("docker", "kind", 1);
        let data = ConfigData::template(&cluster(AddressFamily::IPv4), &provider);
        let err = ConfigRenderer::new().render(&data).unwrap_err();
        assert!(matches!(err, Error::VersionDiscovery { .. }));
    }

    #[test]
    fn rendering_is_deterministic() {
        let c = cluster(AddressFamily::DualStack);
        assert_eq!(
            render(&c, true, "10.0.0.2,fd00::2", "v1.29.2"),
            render(&c, true, "10.0.0.2,fd00::2", "v1.29.2")
        );
    }
}
