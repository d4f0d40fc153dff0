//! Nodes backed by containers of a local container engine

use std::process::Stdio;

use async_trait::async_trait;
use keel_common::{Error, NodeRole, Result};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::{Node, NodeAddresses};

/// Container label carrying the node's role
pub const ROLE_LABEL: &str = "io.x-k8s.kind.role";

/// Container label carrying the cluster name
pub const CLUSTER_LABEL: &str = "io.x-k8s.kind.cluster";

/// A node running as a `docker` or `podman` container
#[derive(Clone, Debug)]
pub struct ContainerNode {
    name: String,
    engine: String,
}

impl ContainerNode {
    /// Node for container `name` managed by `engine` (`docker`, `podman`)
    pub fn new(engine: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            engine: engine.into(),
        }
    }

    async fn engine_output(&self, args: &[&str]) -> Result<Vec<u8>> {
        let context = format!("{} {}", self.engine, args.join(" "));
        let output = Command::new(&self.engine)
            .args(args)
            .output()
            .await
            .map_err(|e| Error::io(&context, e.to_string()))?;

        if !output.status.success() {
            return Err(Error::io(
                context,
                format!(
                    "{}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }
        Ok(output.stdout)
    }

    async fn inspect(&self, format: &str) -> Result<String> {
        let out = self
            .engine_output(&["inspect", "--format", format, self.name.as_str()])
            .await?;
        Ok(String::from_utf8_lossy(&out).trim().to_string())
    }
}

#[async_trait]
impl Node for ContainerNode {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn role(&self) -> Result<NodeRole> {
        let label = self
            .inspect(&format!("{{{{ index .Config.Labels \"{ROLE_LABEL}\" }}}}"))
            .await?;
        label.parse()
    }

    async fn addresses(&self) -> Result<NodeAddresses> {
        let out = self
            .inspect("{{range .NetworkSettings.Networks}}{{.IPAddress}},{{.GlobalIPv6Address}}{{end}}")
            .await?;
        parse_addresses(&out).ok_or_else(|| {
            Error::io(
                format!("{} inspect {}", self.engine, self.name),
                format!("unexpected network addresses {out:?}, expected exactly one network"),
            )
        })
    }

    async fn run(&self, argv: &[String]) -> Result<Vec<u8>> {
        debug!(node = %self.name, command = %argv.join(" "), "running command on node");
        let mut args = vec!["exec", "--privileged", self.name.as_str()];
        args.extend(argv.iter().map(String::as_str));
        self.engine_output(&args).await
    }

    async fn write_file(&self, path: &str, contents: &str) -> Result<()> {
        let context = format!("write {path} on {}", self.name);

        if let Some(dir) = parent_dir(path) {
            self.engine_output(&["exec", "--privileged", self.name.as_str(), "mkdir", "-p", dir])
                .await?;
        }

        let mut child = Command::new(&self.engine)
            .args(["exec", "--privileged", "-i", self.name.as_str(), "cp", "/dev/stdin", path])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::io(&context, e.to_string()))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(contents.as_bytes())
                .await
                .map_err(|e| Error::io(&context, e.to_string()))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| Error::io(&context, e.to_string()))?;
        if !output.status.success() {
            return Err(Error::io(
                context,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        debug!(node = %self.name, path, bytes = contents.len(), "wrote file");
        Ok(())
    }
}

/// Every control-plane and worker container of a cluster
///
/// Other containers carrying the cluster label, such as the external load
/// balancer, are skipped.
pub async fn list_cluster_nodes(engine: &str, cluster: &str) -> Result<Vec<ContainerNode>> {
    let filter = format!("label={CLUSTER_LABEL}={cluster}");
    let format = format!("{{{{.Names}}}}\t{{{{.Label \"{ROLE_LABEL}\"}}}}");
    let context = format!("{engine} ps --filter {filter}");

    let output = Command::new(engine)
        .args(["ps", "-a", "--filter", filter.as_str(), "--format", format.as_str()])
        .output()
        .await
        .map_err(|e| Error::io(&context, e.to_string()))?;
    if !output.status.success() {
        return Err(Error::io(
            context,
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    let nodes: Vec<ContainerNode> = parse_node_list(&String::from_utf8_lossy(&output.stdout))
        .into_iter()
        .map(|name| ContainerNode::new(engine, name))
        .collect();
    debug!(cluster, count = nodes.len(), "listed cluster nodes");
    Ok(nodes)
}

/// Names from `name<TAB>role` lines whose role is a node role
fn parse_node_list(out: &str) -> Vec<String> {
    out.lines()
        .filter_map(|line| line.split_once('\t'))
        .filter(|(_, role)| role.parse::<NodeRole>().is_ok())
        .map(|(name, _)| name.trim().to_string())
        .collect()
}

/// Split `inspect` output of the form `ipv4,ipv6`
fn parse_addresses(out: &str) -> Option<NodeAddresses> {
    let (ipv4, ipv6) = out.trim().split_once(',')?;
    if ipv6.contains(',') {
        return None;
    }
    Some(NodeAddresses::new(ipv4, ipv6))
}

fn parent_dir(path: &str) -> Option<&str> {
    let (dir, _) = path.rsplit_once('/')?;
    (!dir.is_empty()).then_some(dir)
}
