//! Node provider context supplied by the caller

use crate::APISERVER_INTERNAL_PORT;

/// Facts about the provider hosting the nodes
///
/// The orchestrator does not discover these itself; they come from the
/// provider that created the node containers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderInfo {
    /// Provider name, embedded in each node's `provider-id` (e.g. "docker")
    pub name: String,
    /// Whether the provider runs without root (relaxes conntrack sysctls)
    pub rootless: bool,
    /// Endpoint nodes use to reach the API server (host:port)
    pub control_plane_endpoint: String,
}

impl ProviderInfo {
    /// Provider info for a container-engine provider
    ///
    /// Clusters with more than one control-plane node sit behind the
    /// `<cluster>-external-load-balancer` container; single control-plane
    /// clusters talk to `<cluster>-control-plane` directly.
    pub fn container(engine: impl Into<String>, cluster: &str, control_planes: usize) -> Self {
        let host = if control_planes > 1 {
            format!("{cluster}-external-load-balancer")
        } else {
            format!("{cluster}-control-plane")
        };
        Self {
            name: engine.into(),
            rootless: false,
            control_plane_endpoint: format!("{host}:{APISERVER_INTERNAL_PORT}"),
        }
    }

    /// Mark the provider as rootless
    pub fn with_rootless(mut self, rootless: bool) -> Self {
        self.rootless = rootless;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_control_plane_uses_node_endpoint() {
        let info = ProviderInfo::container("docker", "kind", 1);
        assert_eq!(info.control_plane_endpoint, "kind-control-plane:6443");
        assert!(!info.rootless);
    }

    #[test]
    fn ha_control_plane_uses_load_balancer() {
        let info = ProviderInfo::container("podman", "ha", 3).with_rootless(true);
        assert_eq!(info.control_plane_endpoint, "ha-external-load-balancer:6443");
        assert_eq!(info.name, "podman");
        assert!(info.rootless);
    }
}
