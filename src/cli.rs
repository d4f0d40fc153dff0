//! `keel` command line

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use keel_common::{ClusterSpec, Error, NodeRole, ProviderInfo, Result};
use keel_kubeadm::{
    kubeadm_config, match_node_spec, node_names, resolve_node_address, ConfigData,
    ConfigRenderer, NodeOverrides,
};
use keel_node::{list_cluster_nodes, Node};
use tracing::info;

use crate::action::ConfigAction;

/// keel - kubeadm and containerd config synthesis for kind-style clusters
#[derive(Parser, Debug)]
#[command(name = "keel")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the final kubeadm config for one node without touching it
    Render(RenderArgs),
    /// Apply the cluster's containerd patches to a local config.toml
    PatchToml(PatchTomlArgs),
    /// Configure every node of a running cluster
    Apply(ApplyArgs),
}

/// Arguments for `keel render`
#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Cluster config file
    #[arg(short, long, env = "KEEL_CONFIG")]
    pub config: PathBuf,

    /// Node name, e.g. `kind-worker2`; defaults to the first control plane
    #[arg(long)]
    pub node: Option<String>,

    /// Node IPv4 address
    #[arg(long, default_value = "")]
    pub ipv4: String,

    /// Node IPv6 address
    #[arg(long, default_value = "")]
    pub ipv6: String,

    /// Kubernetes version installed on the node
    #[arg(long, default_value = "v1.29.2")]
    pub kubernetes_version: String,

    /// Container engine used in the node provider-id
    #[arg(long, default_value = "docker")]
    pub engine: String,

    /// Render for a rootless provider
    #[arg(long)]
    pub rootless: bool,
}

/// Arguments for `keel patch-toml`
#[derive(Args, Debug)]
pub struct PatchTomlArgs {
    /// Cluster config file
    #[arg(short, long, env = "KEEL_CONFIG")]
    pub config: PathBuf,

    /// containerd config to patch
    #[arg(short, long)]
    pub input: PathBuf,
}

/// Arguments for `keel apply`
#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Cluster config file
    #[arg(short, long, env = "KEEL_CONFIG")]
    pub config: PathBuf,

    /// Container engine the nodes run on
    #[arg(long, default_value = "docker")]
    pub engine: String,

    /// The engine runs rootless
    #[arg(long)]
    pub rootless: bool,
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Render(args) => {
                print!("{}", render(&args).await?);
                Ok(())
            }
            Commands::PatchToml(args) => {
                print!("{}", patch_toml(&args).await?);
                Ok(())
            }
            Commands::Apply(args) => apply(&args).await,
        }
    }
}

async fn load_cluster(path: &Path) -> Result<ClusterSpec> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::io(format!("read {}", path.display()), e.to_string()))?;
    ClusterSpec::from_yaml(&raw)
}

fn provider_for(cluster: &ClusterSpec, engine: &str, rootless: bool) -> ProviderInfo {
    ProviderInfo::container(engine, &cluster.name, cluster.count_role(NodeRole::ControlPlane))
        .with_rootless(rootless)
}

async fn render(args: &RenderArgs) -> Result<String> {
    let cluster = load_cluster(&args.config).await?;
    let provider = provider_for(&cluster, &args.engine, args.rootless);

    let name = match &args.node {
        Some(name) => name.clone(),
        None => node_names(&cluster.name, &cluster.nodes)
            .into_iter()
            .next()
            .ok_or_else(|| Error::validation("cluster has no nodes"))?,
    };
    let spec = &cluster.nodes[match_node_spec(&name, &cluster.nodes)?];

    let address = resolve_node_address(cluster.networking.address_family, &args.ipv4, &args.ipv6)?;
    let data = ConfigData::build(
        &cluster,
        &provider,
        NodeOverrides {
            name: &name,
            control_plane: spec.role == NodeRole::ControlPlane,
            labels: &spec.labels,
        },
        address,
        args.kubernetes_version.as_str(),
    );

    kubeadm_config(&ConfigRenderer::new(), &cluster, spec, &data).map_err(|e| e.for_node(name))
}

async fn patch_toml(args: &PatchTomlArgs) -> Result<String> {
    let cluster = load_cluster(&args.config).await?;
    let current = tokio::fs::read_to_string(&args.input)
        .await
        .map_err(|e| Error::io(format!("read {}", args.input.display()), e.to_string()))?;

    keel_patch::patch_toml(
        &current,
        &cluster.containerd_patches,
        &cluster.containerd_patches_structured,
    )
}

async fn apply(args: &ApplyArgs) -> Result<()> {
    let cluster = load_cluster(&args.config).await?;
    let provider = provider_for(&cluster, &args.engine, args.rootless);

    let nodes: Vec<Arc<dyn Node>> = list_cluster_nodes(&args.engine, &cluster.name)
        .await?
        .into_iter()
        .map(|node| Arc::new(node) as Arc<dyn Node>)
        .collect();
    if nodes.is_empty() {
        return Err(Error::validation(format!(
            "no nodes found for cluster {}",
            cluster.name
        )));
    }
    info!(cluster = %cluster.name, nodes = nodes.len(), "found cluster nodes");

    ConfigAction::new(cluster, provider).execute(&nodes).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_render_flags() {
        let cli = Cli::parse_from([
            "keel",
            "render",
            "--config",
            "cluster.yaml",
            "--node",
            "kind-worker",
            "--ipv4",
            "172.18.0.3",
        ]);
        match cli.command {
            Commands::Render(args) => {
                assert_eq!(args.config, PathBuf::from("cluster.yaml"));
                assert_eq!(args.node.as_deref(), Some("kind-worker"));
                assert_eq!(args.ipv4, "172.18.0.3");
                assert_eq!(args.kubernetes_version, "v1.29.2");
                assert_eq!(args.engine, "docker");
            }
            other => panic!("expected render, got {other:?}"),
        }
    }

    #[test]
    fn parses_patch_toml_flags() {
        let cli = Cli::parse_from(["keel", "patch-toml", "-c", "c.yaml", "-i", "config.toml"]);
        assert!(matches!(
            cli.command,
            Commands::PatchToml(PatchTomlArgs { ref input, .. }) if input == Path::new("config.toml")
        ));
    }

    #[test]
    fn provider_endpoint_follows_control_plane_count() {
        let cluster = ClusterSpec::from_yaml(
            "name: dev\nnodes:\n- role: control-plane\n- role: control-plane\n- role: worker\n",
        )
        .unwrap();
        let provider = provider_for(&cluster, "podman", true);
        assert_eq!(provider.control_plane_endpoint, "dev-external-load-balancer:6443");
        assert!(provider.rootless);
    }
}
