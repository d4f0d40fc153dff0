//! Patch pipeline for node configuration documents
//!
//! Two instantiations share the same contract: overlays (RFC 7386 deep
//! merge) are applied first, then structured RFC 6902 operations, each in
//! the order given.
//!
//! - [`patch_kube_yaml`] handles multi-document kubeadm YAML, selecting
//!   documents by `kind`/`apiVersion`.
//! - [`patch_toml`] handles single-document TOML such as containerd's
//!   `config.toml`.
//!
//! Callers layer scopes by calling a pipeline once per scope (cluster, then
//! node). [`strip_config_marker`] removes the synthetic `metadata.name`
//! block the renderer adds so patches can address each document.

#![deny(missing_docs)]

mod kube_yaml;
mod ops;
mod resource;
mod toml_config;

pub use kube_yaml::patch_kube_yaml;
pub use toml_config::patch_toml;

/// Synthetic block the renderer places in every kubeadm document
pub const CONFIG_MARKER: &str = "metadata:\n  name: config\n";

/// Remove every occurrence of [`CONFIG_MARKER`]
///
/// This is a literal text removal, not a structural edit, so the rest of
/// the document keeps its exact formatting. kubeadm rejects the marker.
pub fn strip_config_marker(document: &str) -> String {
    document.replace(CONFIG_MARKER, "")
}
