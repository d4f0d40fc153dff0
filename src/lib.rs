//! keel - node configuration for kind-style clusters
//!
//! Generates each node's kubeadm config from a declarative cluster
//! description, layers user patches over it, writes it to the node, and
//! re-patches containerd when the cluster asks for it.
//!
//! # Crates
//!
//! - `keel-common` - cluster model, errors, shared constants
//! - `keel-patch` - overlay and RFC 6902 patch pipelines for YAML and TOML
//! - `keel-kubeadm` - addressing, node matching, config data, rendering
//! - `keel-node` - the [`Node`](keel_node::Node) capability trait and the
//!   container-backed implementation
//!
//! This crate holds the concurrent [`action::ConfigAction`] and the CLI.

#![deny(missing_docs)]

pub mod action;
pub mod cli;

pub use cli::Cli;
pub use keel_common::{Error, Result};
