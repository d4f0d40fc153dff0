//! Multi-document YAML handling
//!
//! Each document keeps its original text. A document is only re-serialized
//! when a patch actually changed its value, so unpatched documents (and
//! documents whose patches were no-ops) come out byte-for-byte as they went
//! in.

use keel_common::{Error, Result};
use serde_json::Value;

use crate::ops::{apply_operations, merge_overlay, MatchInfo, Operations, Overlay};

/// One document of a multi-document YAML stream
#[derive(Clone, Debug)]
pub(crate) struct Resource {
    raw: String,
    original: Value,
    value: Value,
    info: MatchInfo,
}

impl Resource {
    pub fn parse(raw: String) -> Result<Self> {
        let original: Value = serde_yaml::from_str(&raw)
            .map_err(|e| Error::patch(format!("failed to parse document to patch: {e}")))?;
        let info = MatchInfo::from_document(&original);
        Ok(Self {
            raw,
            value: original.clone(),
            original,
            info,
        })
    }

    /// Merge the overlay if it targets this document; returns whether it did
    pub fn apply_overlay(&mut self, overlay: &Overlay) -> bool {
        if !overlay.selector.matches(&self.info) {
            return false;
        }
        merge_overlay(&mut self.value, &overlay.value);
        true
    }

    /// Apply the operations if they target this document; returns whether they did
    pub fn apply_operations(&mut self, ops: &Operations) -> Result<bool> {
        if !ops.selector.matches(&self.info) {
            return Ok(false);
        }
        apply_operations(&mut self.value, &ops.patch).map_err(|e| match e {
            Error::PatchApplication { message } => {
                Error::patch(format!("{message} (document {})", ops.selector))
            }
            other => other,
        })?;
        Ok(true)
    }

    /// The document text: original if unchanged, re-serialized otherwise
    pub fn encode(&self) -> Result<String> {
        if self.value == self.original {
            return Ok(self.raw.clone());
        }
        serde_yaml::to_string(&self.value)
            .map_err(|e| Error::patch(format!("failed to encode patched document: {e}")))
    }
}

/// Split a YAML stream on `---` separator lines
///
/// Blank documents are dropped and every document ends with a newline.
pub(crate) fn split_documents(stream: &str) -> Vec<String> {
    let mut documents = Vec::new();
    let mut current = String::new();

    for line in stream.split_inclusive('\n') {
        if line.trim_end() == "---" {
            push_document(&mut documents, &mut current);
            continue;
        }
        current.push_str(line);
    }
    push_document(&mut documents, &mut current);

    documents
}

fn push_document(documents: &mut Vec<String>, current: &mut String) {
    if current.trim().is_empty() {
        current.clear();
        return;
    }
    let mut document = std::mem::take(current);
    if !document.ends_with('\n') {
        document.push('\n');
    }
    documents.push(document);
}

/// Join documents back into a stream
pub(crate) fn join_documents(documents: &[String]) -> String {
    documents.join("---\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_separator_lines_only() {
        let stream = "a: 1\n---\nb: '---'\n---\n\n---\nc: 3";
        let docs = split_documents(stream);
        assert_eq!(docs, vec!["a: 1\n", "b: '---'\n", "c: 3\n"]);
    }

    #[test]
    fn leading_separator_is_ignored() {
        let docs = split_documents("---\nkind: A\n");
        assert_eq!(docs, vec!["kind: A\n"]);
    }

    #[test]
    fn join_restores_separators() {
        let docs = vec!["a: 1\n".to_string(), "b: 2\n".to_string()];
        assert_eq!(join_documents(&docs), "a: 1\n---\nb: 2\n");
    }

    #[test]
    fn unchanged_document_keeps_its_text() {
        // comments and quoting survive because nothing is re-serialized
        let raw = "kind: A\n# keep me\nvalue: \"quoted\"\n".to_string();
        let resource = Resource::parse(raw.clone()).unwrap();
        assert_eq!(resource.encode().unwrap(), raw);
    }

    #[test]
    fn invalid_document_fails_to_parse() {
        assert!(Resource::parse("a: [1,\n".to_string()).is_err());
    }
}
