//! Supporting types for the cluster model

use serde::{Deserialize, Serialize};

/// Role a node plays in the cluster
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum NodeRole {
    /// Runs the Kubernetes control plane
    #[default]
    ControlPlane,
    /// Runs workloads only
    Worker,
}

impl NodeRole {
    /// The role as it appears in node names and container labels
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ControlPlane => "control-plane",
            Self::Worker => "worker",
        }
    }
}

impl std::str::FromStr for NodeRole {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "control-plane" => Ok(Self::ControlPlane),
            "worker" => Ok(Self::Worker),
            other => Err(crate::Error::validation(format!(
                "invalid node role: {other:?}, expected one of: control-plane, worker"
            ))),
        }
    }
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// IP address family used by the cluster
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum AddressFamily {
    /// IPv4 only
    #[default]
    #[serde(rename = "ipv4")]
    IPv4,
    /// IPv6 only
    #[serde(rename = "ipv6")]
    IPv6,
    /// IPv4 and IPv6
    #[serde(rename = "dual", alias = "dualstack")]
    DualStack,
}

impl std::fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IPv4 => write!(f, "ipv4"),
            Self::IPv6 => write!(f, "ipv6"),
            Self::DualStack => write!(f, "dual"),
        }
    }
}

/// kube-proxy mode
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProxyMode {
    /// iptables rules (kube-proxy default)
    #[default]
    Iptables,
    /// IPVS load balancing
    Ipvs,
    /// nftables rules
    Nftables,
    /// kube-proxy disabled
    None,
}

impl std::fmt::Display for ProxyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Iptables => write!(f, "iptables"),
            Self::Ipvs => write!(f, "ipvs"),
            Self::Nftables => write!(f, "nftables"),
            Self::None => write!(f, "none"),
        }
    }
}

/// An overlay fragment in the same format as the document it patches
///
/// Merged with RFC 7386 semantics: mapping keys override or extend the
/// base, arrays are replaced wholesale, `null` deletes a key.
pub type OverlayPatch = String;

/// An RFC 6902 patch, optionally targeted at one document kind
///
/// `patch` holds a YAML or JSON list of operations. For multi-document
/// targets (kubeadm YAML) the `group`/`version`/`kind` fields select which
/// documents it applies to; empty `group` or `version` match anything. The
/// TOML target is a single document and ignores the selector.
///
/// Deserializes from either the targeted mapping form or a bare string
/// (the form containerd patches use).
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(from = "StructuredPatchRepr")]
pub struct StructuredPatch {
    /// API group of the target document (e.g. "kubeadm.k8s.io")
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub group: String,
    /// API version of the target document (e.g. "v1beta3")
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    /// Kind of the target document (e.g. "ClusterConfiguration")
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    /// The list of operations
    pub patch: String,
}

impl StructuredPatch {
    /// Patch applying to documents of the given kind, in any group or version
    pub fn for_kind(kind: impl Into<String>, patch: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            patch: patch.into(),
            ..Default::default()
        }
    }

    /// Untargeted patch (single-document formats)
    pub fn untargeted(patch: impl Into<String>) -> Self {
        Self {
            patch: patch.into(),
            ..Default::default()
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StructuredPatchRepr {
    Bare(String),
    Targeted {
        #[serde(default)]
        group: String,
        #[serde(default)]
        version: String,
        #[serde(default)]
        kind: String,
        patch: String,
    },
}

impl From<StructuredPatchRepr> for StructuredPatch {
    fn from(repr: StructuredPatchRepr) -> Self {
        match repr {
            StructuredPatchRepr::Bare(patch) => Self::untargeted(patch),
            StructuredPatchRepr::Targeted {
                group,
                version,
                kind,
                patch,
            } => Self {
                group,
                version,
                kind,
                patch,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_role_round_trips_through_label_form() {
        for role in [NodeRole::ControlPlane, NodeRole::Worker] {
            assert_eq!(role.as_str().parse::<NodeRole>().unwrap(), role);
        }
        assert!("etcd".parse::<NodeRole>().is_err());
        assert_eq!("worker\n".parse::<NodeRole>().unwrap(), NodeRole::Worker);
    }

    #[test]
    fn address_family_accepts_kind_spelling() {
        let family: AddressFamily = serde_yaml::from_str("dual").unwrap();
        assert_eq!(family, AddressFamily::DualStack);
        let family: AddressFamily = serde_yaml::from_str("ipv6").unwrap();
        assert_eq!(family, AddressFamily::IPv6);
    }

    #[test]
    fn structured_patch_from_targeted_mapping() {
        let yaml = r#"
group: kubeadm.k8s.io
version: v1beta3
kind: ClusterConfiguration
patch: |
  - op: add
    path: /apiServer/certSANs/-
    value: my-hostname
"#;
        let patch: StructuredPatch = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(patch.group, "kubeadm.k8s.io");
        assert_eq!(patch.kind, "ClusterConfiguration");
        assert!(patch.patch.contains("certSANs"));
    }

    #[test]
    fn structured_patch_from_bare_string() {
        let yaml = "\"- op: remove\\n  path: /version\\n\"";
        let patch: StructuredPatch = serde_yaml::from_str(yaml).unwrap();
        assert!(patch.kind.is_empty());
        assert!(patch.patch.contains("op: remove"));
    }
}
