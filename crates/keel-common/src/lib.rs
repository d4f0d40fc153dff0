//! Common types for keel: the cluster model, errors, and shared constants

#![deny(missing_docs)]

pub mod cluster;
pub mod error;
pub mod provider;
pub mod types;

pub use cluster::{ClusterSpec, Networking, NodeSpec};
pub use error::Error;
pub use provider::ProviderInfo;
pub use types::{AddressFamily, NodeRole, OverlayPatch, ProxyMode, StructuredPatch};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Port the API server binds inside each control-plane node
pub const APISERVER_INTERNAL_PORT: u16 = 6443;

/// Where each node's kubeadm config is written
pub const KUBEADM_CONFIG_PATH: &str = "/kind/kubeadm.conf";

/// Where each node's containerd config lives
pub const CONTAINERD_CONFIG_PATH: &str = "/etc/containerd/config.toml";

/// File holding the node image's Kubernetes version
pub const KUBE_VERSION_PATH: &str = "/kind/version";
