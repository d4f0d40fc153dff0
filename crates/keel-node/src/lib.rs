//! Node capabilities used by the config pipeline
//!
//! The pipeline never talks to a container runtime directly. It asks a
//! [`Node`] to run a command, write a file, report its addresses, or report
//! its Kubernetes version. [`ContainerNode`] implements this for nodes that
//! are containers managed by `docker` or `podman`.

#![deny(missing_docs)]

pub mod container;
pub mod select;

pub use container::{list_cluster_nodes, ContainerNode};
pub use select::{select_by_role, NodesByRole};

use async_trait::async_trait;
use keel_common::{Error, NodeRole, Result, KUBE_VERSION_PATH};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Addresses a node reports; either may be empty
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeAddresses {
    /// IPv4 address, or empty
    pub ipv4: String,
    /// IPv6 address, or empty
    pub ipv6: String,
}

impl NodeAddresses {
    /// Addresses from their string forms
    pub fn new(ipv4: impl Into<String>, ipv6: impl Into<String>) -> Self {
        Self {
            ipv4: ipv4.into(),
            ipv6: ipv6.into(),
        }
    }
}

/// A live cluster node
///
/// Implementations own timeouts and retries; callers treat every error as
/// final for that node.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait Node: Send + Sync {
    /// The node's display name, e.g. `kind-worker2`
    fn name(&self) -> String;

    /// The role the node was provisioned with
    async fn role(&self) -> Result<NodeRole>;

    /// The node's IPv4 and IPv6 addresses
    async fn addresses(&self) -> Result<NodeAddresses>;

    /// Run a command on the node and capture its stdout
    async fn run(&self, argv: &[String]) -> Result<Vec<u8>>;

    /// Write `contents` to `path` on the node, creating parent directories
    async fn write_file(&self, path: &str, contents: &str) -> Result<()>;

    /// The Kubernetes version installed on the node
    async fn kube_version(&self) -> Result<String> {
        read_kube_version(self).await
    }
}

/// Read the node image's Kubernetes version from [`KUBE_VERSION_PATH`]
pub async fn read_kube_version<N: Node + ?Sized>(node: &N) -> Result<String> {
    let out = node
        .run(&["cat".to_string(), KUBE_VERSION_PATH.to_string()])
        .await
        .map_err(|e| {
            Error::version_discovery(format!("failed to read {KUBE_VERSION_PATH}: {e}"))
        })?;

    let version = String::from_utf8_lossy(&out).trim().to_string();
    if version.is_empty() {
        return Err(Error::version_discovery(format!(
            "{KUBE_VERSION_PATH} on {} is empty",
            node.name()
        )));
    }
    Ok(version)
}

/// Build an argv from string literals
pub fn argv<I, S>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    args.into_iter().map(Into::into).collect()
}
