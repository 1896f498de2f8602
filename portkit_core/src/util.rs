//! Small shared utilities (spec §4.1).

use serde_json::Value;

/// Structural deep equality, used throughout subscription gates and echo
/// diffing. `serde_json::Value`'s own `PartialEq` is already
/// key-order-independent for objects, so this is a thin named wrapper kept
/// for call-site clarity and so the comparator is easy to swap later.
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    a == b
}
