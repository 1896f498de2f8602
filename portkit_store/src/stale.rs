//! Stale-element detector (spec §4.4).
//!
//! For each incoming array-port event, every *existing* direct array-element
//! child of that port is a stale candidate — reindexing (`delete arr[0]`
//! shifting `arr[1]` -> `arr[0]`) would otherwise leave stale data at the old
//! slot. The batch's expansion immediately recreates the surviving indices,
//! and candidates that got a config update this batch are dropped from the
//! final removal set (spec §4.7 step 7) — this module only computes the
//! candidate set, not the final one.
//!
//! An event only counts as an "array-port event" if it actually carries a
//! new array config *and* array value — a UI- or connections-only event for
//! `arr` never reaches the subtree expander (it has no `changes.config`), so
//! treating it as array-reindexing input here would mark every element
//! stale with nothing in `config_updates` to save them, deleting live data.
//!
//! Deeper descendants of a removed element (e.g. `arr[0].x`) are not added
//! here: they are cleaned up by the hierarchy store's cascade when the
//! element itself is removed (spec §4.8), so only the direct element keys
//! need to be candidates.

use portkit_core::prelude::*;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};

/// `nodeId -> PortKeys` known to exist before this batch is applied.
pub type NodePortKeyIndex = HashMap<String, BTreeSet<PortKey>>;

fn is_array_reindex_event(event: &PortUpdateEvent) -> bool {
    matches!(
        (&event.changes.config, &event.changes.value),
        (Some(PortConfig::Array(_)), Some(Value::Array(_)))
    )
}

pub fn collect_stale_candidates(
    node_port_keys: &NodePortKeyIndex,
    events: &[PortUpdateEvent],
) -> HashSet<PortKey> {
    let mut stale = HashSet::new();
    for event in events {
        if !is_array_reindex_event(event) {
            continue;
        }
        let Some(existing) = node_port_keys.get(&event.node_id) else {
            continue;
        };
        for key in existing {
            let Ok((_, port_id)) = from_key(key) else {
                continue;
            };
            if array_element_index(&port_id).is_some()
                && immediate_parent_port_id(&port_id).as_deref() == Some(event.port_id.as_str())
            {
                stale.insert(key.clone());
            }
        }
    }
    stale
}
