//! Batch processor (spec §4.7): wires echo-filtered events through subtree
//! expansion, grouping, merge, and stale detection into one `ProcessedBatch`
//! meant to be applied atomically.

use crate::expand::expand_schema_children;
use crate::merge::merge_port_events;
use crate::stale::{collect_stale_candidates, NodePortKeyIndex};
use portkit_core::prelude::*;
use std::collections::{HashMap, HashSet};

/// The per-concern decomposition of a batch of events, ready to be applied
/// atomically by the granular stores.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProcessedBatch {
    pub value_updates: HashMap<PortKey, serde_json::Value>,
    pub ui_updates: HashMap<PortKey, PortUiState>,
    pub config_updates: HashMap<PortKey, PortConfig>,
    pub connection_updates: HashMap<PortKey, Vec<Connection>>,
    pub version_updates: HashMap<PortKey, u64>,
    /// child key -> parent key, derived from merged configs this batch.
    pub hierarchy_parents: HashMap<PortKey, PortKey>,
    /// parent key -> new child keys discovered this batch (not yet unioned
    /// with what the store already has; the store does that union+sort).
    pub hierarchy_children: HashMap<PortKey, Vec<PortKey>>,
    pub stale_port_keys: HashSet<PortKey>,
}

impl ProcessedBatch {
    pub fn is_empty(&self) -> bool {
        self.value_updates.is_empty()
            && self.ui_updates.is_empty()
            && self.config_updates.is_empty()
            && self.connection_updates.is_empty()
            && self.version_updates.is_empty()
            && self.hierarchy_parents.is_empty()
            && self.stale_port_keys.is_empty()
    }
}

/// Process one batch of already echo-filtered events into a [`ProcessedBatch`].
pub fn process_batch(events: &[PortUpdateEvent], node_port_keys: &NodePortKeyIndex) -> ProcessedBatch {
    let mut out = ProcessedBatch::default();
    if events.is_empty() {
        return out;
    }

    let stale_candidates = collect_stale_candidates(node_port_keys, events);

    let expanded: Vec<PortUpdateEvent> = events.iter().flat_map(expand_schema_children).collect();

    let mut grouped: HashMap<PortKey, Vec<PortUpdateEvent>> = HashMap::new();
    for event in expanded {
        grouped.entry(event.port_key.clone()).or_default().push(event);
    }

    for (port_key, group) in grouped {
        let merged = merge_port_events(&group);

        if let Some(value) = merged.value {
            out.value_updates.insert(port_key.clone(), value);
        }
        if let Some(ui) = merged.ui {
            if !ui.is_empty() {
                out.ui_updates.insert(port_key.clone(), ui);
            }
        }
        if let Some(config) = merged.config {
            if let Some(parent_id) = config.parent_id() {
                let parent_key = to_key(config.node_id(), parent_id);
                out.hierarchy_parents.insert(port_key.clone(), parent_key.clone());
                out.hierarchy_children.entry(parent_key).or_default().push(port_key.clone());
            }
            out.config_updates.insert(port_key.clone(), config);
        }
        if let Some(connections) = merged.connections {
            if !connections.is_empty() {
                out.connection_updates.insert(port_key.clone(), connections);
            }
        }
        if let Some(version) = merged.version {
            out.version_updates.insert(port_key.clone(), version);
        }
    }

    // Finalize the stale set: drop keys recreated in this same batch (spec §4.7 step 7).
    out.stale_port_keys = stale_candidates
        .into_iter()
        .filter(|k| !out.config_updates.contains_key(k))
        .collect();

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::stores::GranularStores;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn array_cfg(node_id: &str, port_id: &str, parent: Option<&str>) -> PortConfig {
        let item_config = PortConfig::Number(PortConfigBody {
            identity: PortIdentity::new("item", "", PortDirection::Input),
            original_type: None,
            extra: Default::default(),
        });
        let mut identity = PortIdentity::new(port_id, node_id, PortDirection::Input);
        identity.parent_id = parent.map(|p| p.to_string());
        PortConfig::Array(ArrayPortConfigBody {
            identity,
            original_type: None,
            item_config: Box::new(item_config),
            extra: Default::default(),
        })
    }

    #[test]
    fn array_reindex_on_delete_produces_contiguous_elements() {
        let stores = GranularStores::new();
        let cfg = EngineConfig::default();
        let _ = cfg;

        // Seed arr = [10, 20, 30].
        let mut seed = ProcessedBatch::default();
        for (i, v) in [10, 20, 30].iter().enumerate() {
            let key = to_key("N", &format!("arr[{i}]"));
            let mut identity = PortIdentity::new(&format!("arr[{i}]"), "N", PortDirection::Input);
            identity.parent_id = Some("arr".to_string());
            seed.config_updates.insert(
                key.clone(),
                PortConfig::Number(PortConfigBody { identity, original_type: None, extra: Default::default() }),
            );
            seed.value_updates.insert(key, json!(v));
        }
        stores.apply_batch(&seed);

        let mut index: NodePortKeyIndex = HashMap::new();
        let keys: BTreeSet<PortKey> = stores.node_port_keys("N");
        index.insert("N".to_string(), keys);

        let mut event = PortUpdateEvent::new("N", "arr", 2, EventSource::Subscription);
        event.changes.config = Some(array_cfg("N", "arr", None));
        event.changes.value = Some(json!([20, 30]));

        let batch = process_batch(&[event], &index);
        stores.apply_batch(&batch);

        assert_eq!(stores.value(&to_key("N", "arr[0]")), Some(json!(20)));
        assert_eq!(stores.value(&to_key("N", "arr[1]")), Some(json!(30)));
        assert_eq!(stores.value(&to_key("N", "arr[2]")), None);
        assert!(stores.config(&to_key("N", "arr[2]")).is_none());
    }
}
