//! Node naming and matching live nodes back to their config entries
//!
//! Nodes are named `<cluster>-<role><n>` where `n` counts nodes of the same
//! role in declaration order and is omitted for the first one:
//! `kind-control-plane`, `kind-control-plane2`, `kind-worker`, `kind-worker2`.
//! Matching replays the same naming over the config entries and compares
//! suffixes.

use std::collections::HashMap;

use keel_common::{Error, NodeRole, NodeSpec, Result};

/// Produces node names in declaration order
#[derive(Debug, Default)]
pub struct NodeNamer {
    prefix: String,
    counters: HashMap<NodeRole, usize>,
}

impl NodeNamer {
    /// Namer for the given cluster; an empty cluster yields bare suffixes
    /// such as `-worker2`
    pub fn new(cluster: impl Into<String>) -> Self {
        Self {
            prefix: cluster.into(),
            counters: HashMap::new(),
        }
    }

    /// Name of the next node with this role
    pub fn next_name(&mut self, role: NodeRole) -> String {
        let count = self.counters.entry(role).or_insert(0);
        *count += 1;
        if *count > 1 {
            format!("{}-{}{}", self.prefix, role, count)
        } else {
            format!("{}-{}", self.prefix, role)
        }
    }
}

/// Names for every node of a cluster, in declaration order
pub fn node_names(cluster: &str, nodes: &[NodeSpec]) -> Vec<String> {
    let mut namer = NodeNamer::new(cluster);
    nodes.iter().map(|n| namer.next_name(n.role)).collect()
}

/// Index of the config entry a live node was created from
///
/// Exactly one entry's name suffix must match the live node's name. No match
/// is a [`Error::NodeSpecMismatch`]; more than one is an
/// [`Error::AmbiguousNodeMatch`].
pub fn match_node_spec(node_name: &str, nodes: &[NodeSpec]) -> Result<usize> {
    let mut namer = NodeNamer::new("");
    match_suffix(node_name, nodes.iter().map(|n| namer.next_name(n.role)))
}

fn match_suffix(node_name: &str, suffixes: impl IntoIterator<Item = String>) -> Result<usize> {
    let matches: Vec<usize> = suffixes
        .into_iter()
        .enumerate()
        .filter_map(|(i, suffix)| node_name.ends_with(&suffix).then_some(i))
        .collect();

    match matches.len() {
        0 => Err(Error::node_spec_mismatch(node_name)),
        1 => Ok(matches[0]),
        _ => Err(Error::AmbiguousNodeMatch {
            node: node_name.to_string(),
            indices: matches,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes(roles: &[NodeRole]) -> Vec<NodeSpec> {
        roles.iter().map(|r| NodeSpec::new(*r)).collect()
    }

    #[test]
    fn names_follow_kind_convention() {
        let spec = nodes(&[
            NodeRole::ControlPlane,
            NodeRole::Worker,
            NodeRole::ControlPlane,
            NodeRole::Worker,
            NodeRole::Worker,
        ]);
        assert_eq!(
            node_names("kind", &spec),
            vec![
                "kind-control-plane",
                "kind-worker",
                "kind-control-plane2",
                "kind-worker2",
                "kind-worker3",
            ]
        );
    }

    #[test]
    fn matches_each_live_node_to_its_entry() {
        let spec = nodes(&[NodeRole::ControlPlane, NodeRole::Worker, NodeRole::Worker]);
        let live = ["x-control-plane", "x-worker", "x-worker2"];

        let indices: Vec<usize> = live
            .iter()
            .map(|name| match_node_spec(name, &spec).unwrap())
            .collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn double_digit_counters_do_not_collide() {
        let mut roles = vec![NodeRole::ControlPlane];
        roles.extend(std::iter::repeat(NodeRole::Worker).take(12));
        let spec = nodes(&roles);

        assert_eq!(match_node_spec("kind-worker12", &spec).unwrap(), 12);
        assert_eq!(match_node_spec("kind-worker2", &spec).unwrap(), 2);
        assert_eq!(match_node_spec("kind-worker", &spec).unwrap(), 1);
    }

    #[test]
    fn unknown_node_is_a_mismatch() {
        let spec = nodes(&[NodeRole::ControlPlane, NodeRole::Worker]);
        let err = match_node_spec("kind-worker2", &spec).unwrap_err();
        assert!(matches!(err, Error::NodeSpecMismatch { node } if node == "kind-worker2"));
    }

    #[test]
    fn ambiguous_match_reports_every_candidate() {
        let suffixes = ["-worker", "-control-plane", "-worker"].map(String::from);
        let err = match_suffix("kind-worker", suffixes).unwrap_err();

        match err {
            Error::AmbiguousNodeMatch { node, indices } => {
                assert_eq!(node, "kind-worker");
                assert_eq!(indices, vec![0, 2]);
            }
            other => panic!("expected AmbiguousNodeMatch, got {other:?}"),
        }
    }
}
