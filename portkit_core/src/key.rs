//! Key codec (spec §4.1).
//!
//! `PortKey` is the only cross-store join key: `"${nodeId}:${portId}"`.
//! NodeIds may themselves contain `:`, so decoding always splits on the
//! *last* colon.

use crate::error::PortError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical cross-store identifier `nodeId:portId`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortKey(String);

impl PortKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for PortKey {
    fn from(s: String) -> Self {
        PortKey(s)
    }
}

impl AsRef<str> for PortKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Build a [`PortKey`] from a nodeId and a portId.
pub fn to_key(node_id: &str, port_id: &str) -> PortKey {
    PortKey(format!("{node_id}:{port_id}"))
}

/// Split a [`PortKey`] back into `(nodeId, portId)`, splitting on the last `:`.
pub fn from_key(key: &PortKey) -> Result<(String, String), PortError> {
    let s = key.as_str();
    match s.rfind(':') {
        Some(idx) => Ok((s[..idx].to_string(), s[idx + 1..].to_string())),
        None => Err(PortError::MalformedKey(s.to_string())),
    }
}

/// A portId is a child portId iff it encodes `.field` or `[N]` path segments.
pub fn is_child_port_id(port_id: &str) -> bool {
    port_id.contains('.') || port_id.contains('[')
}

/// The immediate parent portId of a child portId, if any.
///
/// `"obj.a"` -> `"obj"`, `"arr[0]"` -> `"arr"`, `"obj.arr[2].x"` -> `"obj.arr[2]"`.
pub fn immediate_parent_port_id(port_id: &str) -> Option<String> {
    if port_id.ends_with(']') {
        if let Some(open) = port_id.rfind('[') {
            let inside = &port_id[open + 1..port_id.len() - 1];
            if !inside.is_empty() && inside.chars().all(|c| c.is_ascii_digit()) {
                return Some(port_id[..open].to_string());
            }
        }
    }
    port_id.rfind('.').map(|idx| port_id[..idx].to_string())
}

/// Walk every ancestor portId, nearest first, to the root.
pub fn ancestor_port_ids(port_id: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = port_id.to_string();
    while let Some(parent) = immediate_parent_port_id(&current) {
        out.push(parent.clone());
        current = parent;
    }
    out
}

/// Extract the numeric array index from an element portId segment
/// (`"arr[12]"` -> `Some(12)`), or `None` if it isn't an array-element id.
pub fn array_element_index(port_id: &str) -> Option<u64> {
    if !port_id.ends_with(']') {
        return None;
    }
    let open = port_id.rfind('[')?;
    port_id[open + 1..port_id.len() - 1].parse().ok()
}
