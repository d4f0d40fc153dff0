//! Parsing and applying the two patch dialects
//!
//! Overlays merge with RFC 7386 semantics (`json_patch::merge`); structured
//! patches are RFC 6902 operation lists (`json_patch::patch`). Both operate
//! on `serde_json::Value`, whichever format the document came from.

use keel_common::{Error, Result, StructuredPatch};
use serde::Deserialize;
use serde_json::Value;

/// Selects the YAML documents a patch applies to
///
/// `kind` must always match. `group` and `version` only constrain the match
/// when the patch sets them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Selector {
    pub group: Option<String>,
    pub version: Option<String>,
    pub kind: String,
}

/// Identity of a parsed document
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct MatchInfo {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl MatchInfo {
    pub fn from_document(doc: &Value) -> Self {
        let (group, version) = split_api_version(str_field(doc, "apiVersion"));
        Self {
            group: group.to_string(),
            version: version.to_string(),
            kind: str_field(doc, "kind").to_string(),
        }
    }
}

impl Selector {
    /// Selector taken from an overlay's own `apiVersion` and `kind`
    pub fn from_overlay(overlay: &Value) -> Self {
        let api_version = str_field(overlay, "apiVersion");
        let (group, version) = if api_version.is_empty() {
            (None, None)
        } else {
            let (g, v) = split_api_version(api_version);
            (Some(g.to_string()), Some(v.to_string()))
        };
        Self {
            group,
            version,
            kind: str_field(overlay, "kind").to_string(),
        }
    }

    /// Selector taken from a structured patch's target fields
    pub fn from_structured(patch: &StructuredPatch) -> Self {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        Self {
            group: non_empty(&patch.group),
            version: non_empty(&patch.version),
            kind: patch.kind.clone(),
        }
    }

    pub fn matches(&self, info: &MatchInfo) -> bool {
        self.kind == info.kind
            && self.group.as_ref().map_or(true, |g| *g == info.group)
            && self.version.as_ref().map_or(true, |v| *v == info.version)
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.group, &self.version) {
            (Some(g), Some(v)) if !g.is_empty() => write!(f, "{}/{}, Kind={}", g, v, self.kind),
            (_, Some(v)) => write!(f, "{}, Kind={}", v, self.kind),
            _ => write!(f, "Kind={}", self.kind),
        }
    }
}

/// An overlay document together with the documents it targets
#[derive(Clone, Debug)]
pub(crate) struct Overlay {
    pub selector: Selector,
    pub value: Value,
}

/// A parsed RFC 6902 operation list together with the documents it targets
#[derive(Clone, Debug)]
pub(crate) struct Operations {
    pub selector: Selector,
    pub patch: json_patch::Patch,
}

impl Operations {
    pub fn parse(patch: &StructuredPatch) -> Result<Self> {
        Ok(Self {
            selector: Selector::from_structured(patch),
            patch: parse_operations(&patch.patch)?,
        })
    }
}

/// Parse a YAML overlay, which may hold several documents
pub(crate) fn parse_yaml_overlays(patch: &str) -> Result<Vec<Overlay>> {
    let mut overlays = Vec::new();
    for document in serde_yaml::Deserializer::from_str(patch) {
        let value = Value::deserialize(document)
            .map_err(|e| Error::patch(format!("failed to parse overlay patch: {e}")))?;
        match value {
            Value::Null => continue,
            Value::Object(_) => overlays.push(Overlay {
                selector: Selector::from_overlay(&value),
                value,
            }),
            other => {
                return Err(Error::patch(format!(
                    "overlay patch must be a mapping, got: {other}"
                )))
            }
        }
    }
    Ok(overlays)
}

/// Parse an RFC 6902 operation list written as YAML or JSON
pub(crate) fn parse_operations(patch: &str) -> Result<json_patch::Patch> {
    let value: Value = serde_yaml::from_str(patch)
        .map_err(|e| Error::patch(format!("failed to parse structured patch: {e}")))?;
    serde_json::from_value(value)
        .map_err(|e| Error::patch(format!("invalid structured patch operations: {e}")))
}

/// Deep-merge an overlay into a document
pub(crate) fn merge_overlay(doc: &mut Value, overlay: &Value) {
    json_patch::merge(doc, overlay);
}

/// Apply an operation list; a path that does not resolve fails the whole list
pub(crate) fn apply_operations(doc: &mut Value, patch: &json_patch::Patch) -> Result<()> {
    json_patch::patch(doc, &patch.0)
        .map_err(|e| Error::patch(format!("failed to apply structured patch: {e}")))
}

fn str_field<'a>(doc: &'a Value, key: &str) -> &'a str {
    doc.get(key).and_then(Value::as_str).unwrap_or_default()
}

/// Split "group/version" into its parts; core-group versions have no slash
fn split_api_version(api_version: &str) -> (&str, &str) {
    match api_version.rsplit_once('/') {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    }
}
