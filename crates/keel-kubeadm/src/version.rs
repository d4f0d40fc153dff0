//! Kubernetes version parsing and kubeadm API selection

use keel_common::{Error, Result};

/// kubeadm config API for Kubernetes older than 1.23
pub const KUBEADM_API_V1BETA2: &str = "kubeadm.k8s.io/v1beta2";

/// kubeadm config API for Kubernetes 1.23 and newer
pub const KUBEADM_API_V1BETA3: &str = "kubeadm.k8s.io/v1beta3";

/// Major/minor/patch of a Kubernetes release
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct KubeVersion {
    /// Major version
    pub major: u32,
    /// Minor version
    pub minor: u32,
    /// Patch version
    pub patch: u32,
}

impl KubeVersion {
    /// Parse `v1.29.2`, `1.29.2`, or `v1.30.0-alpha.1+abcdef`
    pub fn parse(version: &str) -> Result<Self> {
        let trimmed = version.trim();
        let core = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let core = core.split(['-', '+']).next().unwrap_or_default();

        let parts: Vec<&str> = core.split('.').collect();
        let [major, minor, patch] = parts.as_slice() else {
            return Err(Error::version_discovery(format!(
                "invalid Kubernetes version {version:?}, expected vMAJOR.MINOR.PATCH"
            )));
        };
        let number = |s: &str| {
            s.parse::<u32>().map_err(|_| {
                Error::version_discovery(format!("invalid Kubernetes version {version:?}"))
            })
        };
        Ok(Self {
            major: number(*major)?,
            minor: number(*minor)?,
            patch: number(*patch)?,
        })
    }

    /// The kubeadm config API this release understands
    pub fn kubeadm_api_version(&self) -> &'static str {
        if (self.major, self.minor) < (1, 23) {
            KUBEADM_API_V1BETA2
        } else {
            KUBEADM_API_V1BETA3
        }
    }
}

impl std::fmt::Display for KubeVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)
    }
}
