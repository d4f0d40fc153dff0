//! Patching TOML configuration files (containerd's config.toml)
//!
//! Patches operate on a JSON view of the document. TOML datetimes have no
//! JSON counterpart, so they travel as strings and the pointers they sit
//! at are remembered; on the way back a string at one of those pointers
//! that still parses as a datetime becomes a datetime again.

use std::collections::HashSet;

use keel_common::{Error, OverlayPatch, Result, StructuredPatch};
use serde_json::Value;
use toml::value::Datetime;

use crate::ops::{apply_operations, merge_overlay, parse_operations};

/// Apply TOML overlays, then structured patches, to a TOML document
///
/// The document is a single table, so structured patches apply regardless of
/// any `kind` selector they carry. Output is re-encoded only when the value
/// changed.
pub fn patch_toml(
    document: &str,
    overlays: &[OverlayPatch],
    structured: &[StructuredPatch],
) -> Result<String> {
    if overlays.is_empty() && structured.is_empty() {
        return Ok(document.to_string());
    }

    let mut datetimes = HashSet::new();
    let original = parse_table(document, "document to patch", &mut datetimes)?;
    let mut value = original.clone();

    for overlay in overlays {
        let overlay = parse_table(overlay, "overlay patch", &mut datetimes)?;
        merge_overlay(&mut value, &overlay);
    }
    for patch in structured {
        let ops = parse_operations(&patch.patch)?;
        apply_operations(&mut value, &ops)?;
    }

    if value == original {
        return Ok(document.to_string());
    }
    let patched = from_json(value, &mut String::new(), &datetimes)?;
    toml::to_string(&patched)
        .map_err(|e| Error::patch(format!("failed to encode patched TOML document: {e}")))
}

fn parse_table(raw: &str, what: &str, datetimes: &mut HashSet<String>) -> Result<Value> {
    let table: toml::Table = toml::from_str(raw)
        .map_err(|e| Error::patch(format!("failed to parse TOML {what}: {e}")))?;
    to_json(toml::Value::Table(table), &mut String::new(), datetimes)
}

/// Append one RFC 6901 reference token to `pointer`
fn push_token(pointer: &mut String, token: &str) {
    pointer.push('/');
    pointer.push_str(&token.replace('~', "~0").replace('/', "~1"));
}

fn to_json(
    value: toml::Value,
    pointer: &mut String,
    datetimes: &mut HashSet<String>,
) -> Result<Value> {
    Ok(match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .ok_or_else(|| Error::patch(format!("cannot patch non-finite float at {pointer}")))?,
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => {
            datetimes.insert(pointer.clone());
            Value::String(dt.to_string())
        }
        toml::Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.into_iter().enumerate() {
                let len = pointer.len();
                push_token(pointer, &i.to_string());
                out.push(to_json(item, pointer, datetimes)?);
                pointer.truncate(len);
            }
            Value::Array(out)
        }
        toml::Value::Table(table) => {
            let mut out = serde_json::Map::with_capacity(table.len());
            for (key, item) in table {
                let len = pointer.len();
                push_token(pointer, &key);
                out.insert(key, to_json(item, pointer, datetimes)?);
                pointer.truncate(len);
            }
            Value::Object(out)
        }
    })
}

fn from_json(
    value: Value,
    pointer: &mut String,
    datetimes: &HashSet<String>,
) -> Result<toml::Value> {
    Ok(match value {
        Value::Null => {
            return Err(Error::patch(format!(
                "patched TOML document has a null value at {pointer}"
            )));
        }
        Value::Bool(b) => toml::Value::Boolean(b),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => toml::Value::Integer(i),
            (None, Some(f)) => toml::Value::Float(f),
            (None, None) => {
                return Err(Error::patch(format!("number {n} at {pointer} does not fit TOML")));
            }
        },
        Value::String(s) if datetimes.contains(pointer.as_str()) => match s.parse::<Datetime>() {
            Ok(dt) => toml::Value::Datetime(dt),
            Err(_) => toml::Value::String(s),
        },
        Value::String(s) => toml::Value::String(s),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.into_iter().enumerate() {
                let len = pointer.len();
                push_token(pointer, &i.to_string());
                out.push(from_json(item, pointer, datetimes)?);
                pointer.truncate(len);
            }
            toml::Value::Array(out)
        }
        Value::Object(map) => {
            let mut out = toml::Table::new();
            for (key, item) in map {
                let len = pointer.len();
                push_token(pointer, &key);
                out.insert(key, from_json(item, pointer, datetimes)?);
                pointer.truncate(len);
            }
            toml::Value::Table(out)
        }
    })
}
