//! Error types for keel
//!
//! Errors carry the context needed to attribute a failure to a node or a
//! pipeline stage. Per-node work wraps whatever it returns in
//! [`Error::Node`], so an aggregated failure always names the node it came
//! from.

use thiserror::Error;

/// Main error type for keel operations
#[derive(Debug, Error)]
pub enum Error {
    /// The cluster model is malformed
    #[error("validation error: {message}")]
    Validation {
        /// Description of what's invalid
        message: String,
    },

    /// A node address required by the cluster's address family is missing or invalid
    #[error("address unavailable: {message}")]
    AddressUnavailable {
        /// Description of which address could not be produced
        message: String,
    },

    /// No declarative node entry matches a live node
    #[error("failed to match node {node:?} to config")]
    NodeSpecMismatch {
        /// Display name of the live node
        node: String,
    },

    /// More than one declarative node entry matches a live node
    #[error("node {node:?} matches more than one config entry (indices {indices:?})")]
    AmbiguousNodeMatch {
        /// Display name of the live node
        node: String,
        /// Positions in the cluster's node list that matched
        indices: Vec<usize>,
    },

    /// An overlay or structured patch could not be applied
    #[error("patch error: {message}")]
    PatchApplication {
        /// Description of what failed
        message: String,
    },

    /// Rendering the base configuration document failed
    #[error("template error: {message}")]
    Template {
        /// Description of what failed
        message: String,
    },

    /// Running a command on a node or writing a file into it failed
    #[error("io error [{context}]: {message}")]
    Io {
        /// Operation that failed (e.g. "write /kind/kubeadm.conf")
        context: String,
        /// Description of what failed
        message: String,
    },

    /// The node's Kubernetes version could not be determined
    #[error("version discovery error: {message}")]
    VersionDiscovery {
        /// Description of what failed
        message: String,
    },

    /// Decoding or encoding a configuration file failed
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
    },

    /// Failure inside one node's pipeline
    #[error("node {node}: {source}")]
    Node {
        /// Display name of the node
        node: String,
        /// The underlying failure
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create an address error with the given message
    pub fn address_unavailable(msg: impl Into<String>) -> Self {
        Self::AddressUnavailable {
            message: msg.into(),
        }
    }

    /// Create a node mismatch error for a live node
    pub fn node_spec_mismatch(node: impl Into<String>) -> Self {
        Self::NodeSpecMismatch { node: node.into() }
    }

    /// Create a patch error with the given message
    pub fn patch(msg: impl Into<String>) -> Self {
        Self::PatchApplication {
            message: msg.into(),
        }
    }

    /// Create a template error with the given message
    pub fn template(msg: impl Into<String>) -> Self {
        Self::Template {
            message: msg.into(),
        }
    }

    /// Create an I/O error for the given operation
    pub fn io(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Io {
            context: context.into(),
            message: msg.into(),
        }
    }

    /// Create a version discovery error with the given message
    pub fn version_discovery(msg: impl Into<String>) -> Self {
        Self::VersionDiscovery {
            message: msg.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
        }
    }

    /// Attribute this error to a node
    ///
    /// Errors already attributed to the same node are returned unchanged.
    pub fn for_node(self, node: impl Into<String>) -> Self {
        let node = node.into();
        if let Self::Node { node: existing, .. } = &self {
            if *existing == node {
                return self;
            }
        }
        Self::Node {
            node,
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping node attribution
    pub fn root(&self) -> &Error {
        match self {
            Self::Node { source, .. } => source.root(),
            other => other,
        }
    }

    /// Name of the node this error is attributed to, if any
    pub fn node(&self) -> Option<&str> {
        match self {
            Self::Node { node, .. } => Some(node),
            _ => None,
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}
