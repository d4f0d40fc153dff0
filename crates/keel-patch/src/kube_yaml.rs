//! Patching multi-document Kubernetes-style YAML

use keel_common::{OverlayPatch, Result, StructuredPatch};
use tracing::debug;

use crate::ops::{parse_yaml_overlays, Operations};
use crate::resource::{join_documents, split_documents, Resource};

/// Apply overlays, then structured patches, to every matching document
///
/// Documents are selected by `kind` (and `apiVersion`/`group`/`version`
/// where the patch gives them). All overlays are applied before any
/// structured patch. Any parse failure or unresolvable structured-patch path
/// fails the call; no partially patched output is returned.
pub fn patch_kube_yaml(
    document: &str,
    overlays: &[OverlayPatch],
    structured: &[StructuredPatch],
) -> Result<String> {
    if overlays.is_empty() && structured.is_empty() {
        return Ok(document.to_string());
    }

    let mut resources = split_documents(document)
        .into_iter()
        .map(Resource::parse)
        .collect::<Result<Vec<_>>>()?;

    let mut parsed_overlays = Vec::new();
    for overlay in overlays {
        parsed_overlays.extend(parse_yaml_overlays(overlay)?);
    }
    let parsed_ops = structured
        .iter()
        .map(Operations::parse)
        .collect::<Result<Vec<_>>>()?;

    let mut overlay_hits = vec![0usize; parsed_overlays.len()];
    let mut ops_hits = vec![0usize; parsed_ops.len()];

    for resource in &mut resources {
        for (i, overlay) in parsed_overlays.iter().enumerate() {
            if resource.apply_overlay(overlay) {
                overlay_hits[i] += 1;
            }
        }
        for (i, ops) in parsed_ops.iter().enumerate() {
            if resource.apply_operations(ops)? {
                ops_hits[i] += 1;
            }
        }
    }

    for (overlay, hits) in parsed_overlays.iter().zip(&overlay_hits) {
        if *hits == 0 {
            debug!(selector = %overlay.selector, "overlay patch matched no document");
        }
    }
    for (ops, hits) in parsed_ops.iter().zip(&ops_hits) {
        if *hits == 0 {
            debug!(selector = %ops.selector, "structured patch matched no document");
        }
    }

    let encoded = resources
        .iter()
        .map(Resource::encode)
        .collect::<Result<Vec<_>>>()?;
    Ok(join_documents(&encoded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_common::Error;
    use serde_json::Value;

    const BASE: &str = "\
apiVersion: kubeadm.k8s.io/v1beta3
kind: ClusterConfiguration
metadata:
  name: config
A: 1
networking:
  podSubnet: \"10.244.0.0/16\"
---
apiVersion: kubeadm.k8s.io/v1beta3
kind: InitConfiguration
metadata:
  name: config
# untouched comment
localAPIEndpoint:
  bindPort: 6443
";

    fn docs(stream: &str) -> Vec<Value> {
        split_documents(stream)
            .iter()
            .map(|d| serde_yaml::from_str(d).unwrap())
            .collect()
    }

    // ==========================================================================
    // Story: patches target documents by kind
    // ==========================================================================

    #[test]
    fn overlay_changes_only_matching_document() {
        let out = patch_kube_yaml(
            BASE,
            &["kind: ClusterConfiguration\nnetworking:\n  dnsDomain: example.local\n".to_string()],
            &[],
        )
        .unwrap();

        let docs = docs(&out);
        assert_eq!(docs[0]["networking"]["dnsDomain"], "example.local");
        assert_eq!(docs[0]["networking"]["podSubnet"], "10.244.0.0/16");
        // second document is carried over verbatim, comment included
        assert!(out.contains("# untouched comment\n"));
    }

    #[test]
    fn structured_patch_targets_kind() {
        let patch = StructuredPatch::for_kind(
            "InitConfiguration",
            "- op: replace\n  path: /localAPIEndpoint/bindPort\n  value: 7443\n",
        );
        let out = patch_kube_yaml(BASE, &[], &[patch]).unwrap();

        let docs = docs(&out);
        assert_eq!(docs[1]["localAPIEndpoint"]["bindPort"], 7443);
        assert_eq!(docs[0]["A"], 1);
    }

    #[test]
    fn structured_patches_run_after_overlays() {
        // the structured patch removes a key that only the overlay adds
        let out = patch_kube_yaml(
            BASE,
            &["kind: ClusterConfiguration\nextra: yes-please\n".to_string()],
            &[StructuredPatch::for_kind(
                "ClusterConfiguration",
                "- op: remove\n  path: /extra\n",
            )],
        )
        .unwrap();

        assert!(docs(&out)[0].get("extra").is_none());
    }

    #[test]
    fn unresolvable_path_fails_without_output() {
        let err = patch_kube_yaml(
            BASE,
            &[],
            &[StructuredPatch::for_kind(
                "ClusterConfiguration",
                "- op: replace\n  path: /does/not/exist\n  value: 1\n",
            )],
        )
        .unwrap_err();

        assert!(matches!(err, Error::PatchApplication { .. }));
        assert!(err.to_string().contains("Kind=ClusterConfiguration"));
    }

    #[test]
    fn malformed_overlay_fails() {
        let err = patch_kube_yaml(BASE, &["kind: [unclosed".to_string()], &[]).unwrap_err();
        assert!(matches!(err, Error::PatchApplication { .. }));
    }

    #[test]
    fn test_operation_guards_the_patch() {
        let ops = "- op: test\n  path: /A\n  value: 2\n- op: replace\n  path: /A\n  value: 5\n";
        let err = patch_kube_yaml(
            BASE,
            &[],
            &[StructuredPatch::for_kind("ClusterConfiguration", ops)],
        )
        .unwrap_err();
        assert!(matches!(err, Error::PatchApplication { .. }));
    }

    #[test]
    fn no_patches_returns_input_unchanged() {
        let input = "---\nkind: A\n";
        assert_eq!(patch_kube_yaml(input, &[], &[]).unwrap(), input);
    }

    // ==========================================================================
    // Story: re-applying satisfied patches is a no-op
    // ==========================================================================

    #[test]
    fn reapplying_patches_is_byte_identical() {
        let overlays = vec!["kind: ClusterConfiguration\nA: 2\n".to_string()];
        let structured = vec![StructuredPatch::for_kind(
            "ClusterConfiguration",
            "- op: add\n  path: /networking/serviceSubnet\n  value: 10.96.0.0/16\n",
        )];

        let first = patch_kube_yaml(BASE, &overlays, &structured).unwrap();
        let second = patch_kube_yaml(&first, &overlays, &structured).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn move_and_copy_operations() {
        let ops = "\
- op: copy
  from: /networking/podSubnet
  path: /copied
- op: move
  from: /A
  path: /moved
";
        let out = patch_kube_yaml(
            BASE,
            &[],
            &[StructuredPatch::for_kind("ClusterConfiguration", ops)],
        )
        .unwrap();

        let doc = &docs(&out)[0];
        assert_eq!(doc["copied"], "10.244.0.0/16");
        assert_eq!(doc["moved"], 1);
        assert!(doc.get("A").is_none());
    }
}
