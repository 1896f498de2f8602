//! Per-port UI state (spec §3, §4.1).
//!
//! A sparse bag of UI flags, merged shallowly except for three whitelisted
//! nested blocks which merge one level deeper.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys whose values are themselves merged one level deep rather than replaced.
pub const NESTED_MERGE_KEYS: &[&str] = &["textareaDimensions", "markdownStyles", "htmlStyles"];

/// Sparse per-port UI state. Unknown keys pass through untyped.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortUiState(pub Map<String, Value>);

impl PortUiState {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn collapsed(&self) -> bool {
        matches!(self.0.get("collapsed"), Some(Value::Bool(true)))
    }
}

/// Merge `incoming` into `base`, per spec §4.1: shallow per key, except the
/// [`NESTED_MERGE_KEYS`] which deep-merge one level when both sides are objects.
pub fn merge_ui_states(base: &PortUiState, incoming: &PortUiState) -> PortUiState {
    let mut out = base.0.clone();
    for (key, incoming_value) in incoming.0.iter() {
        if NESTED_MERGE_KEYS.contains(&key.as_str()) {
            match (out.get(key), incoming_value) {
                (Some(Value::Object(existing)), Value::Object(incoming_obj)) => {
                    let mut merged = existing.clone();
                    for (k, v) in incoming_obj.iter() {
                        merged.insert(k.clone(), v.clone());
                    }
                    out.insert(key.clone(), Value::Object(merged));
                }
                _ => {
                    out.insert(key.clone(), incoming_value.clone());
                }
            }
        } else {
            out.insert(key.clone(), incoming_value.clone());
        }
    }
    PortUiState(out)
}
