//! Wiring & lifecycle (spec §4.10): turns collaborator-shaped node/port data
//! into the `PortUpdateEvent` stream the rest of the pipeline consumes.

use crate::stores::GranularStores;
use portkit_core::prelude::*;
use serde_json::{Map, Value};

/// Recursively flatten one port and its structural children into update
/// events, rooted at `node_id` with the node's current `version`. Mirrors
/// the collaborator's `getChildPorts` contract (spec §6): a child's
/// `port_id()` is root-relative to itself, so the full dotted/bracketed path
/// is reconstructed here as the walk descends — bracketed for an array
/// parent's elements, dotted for everything else, matching the PortKey
/// child-portId convention (spec §3, §4.1).
fn extract_port(
    node_id: &str,
    path: &str,
    handle: &dyn PortHandle,
    version: u64,
    timestamp: i64,
    out: &mut Vec<PortUpdateEvent>,
) {
    let config = handle.get_config();
    let is_array = matches!(config, PortConfig::Array(_));
    let event = PortUpdateEvent::new(node_id, path, timestamp, EventSource::Subscription)
        .with_version(version)
        .with_value(handle.get_value())
        .with_config(config)
        .with_ui(handle.get_ui())
        .with_connections(handle.get_connections());
    out.push(event);

    for child in handle.child_ports() {
        let child_path = if is_array {
            format!("{path}[{}]", child.port_id())
        } else {
            format!("{path}.{}", child.port_id())
        };
        extract_port(node_id, &child_path, child.as_ref(), version, timestamp, out);
    }
}

/// One node's full port tree, flattened to the events the ingest pipeline
/// expects (spec §4.10 "initial extraction"). `timestamp` is supplied by the
/// caller's event-bus clock; merge ordering for versioned writes keys off
/// `version`, not arrival time, so a shared timestamp for the whole
/// extraction is fine.
pub fn extract_node(node: &dyn NodeSource, timestamp: i64) -> Vec<PortUpdateEvent> {
    let mut out = Vec::new();
    let version = node.get_version();
    for port in node.ports() {
        extract_port(node.node_id(), port.port_id(), port.as_ref(), version, timestamp, &mut out);
    }
    out
}

/// Flatten several nodes (spec §6 `nodesAdded`/`nodesSet`).
pub fn extract_nodes(nodes: &[&dyn NodeSource], timestamp: i64) -> Vec<PortUpdateEvent> {
    nodes.iter().flat_map(|n| extract_node(*n, timestamp)).collect()
}

/// Reconstruct a parent's aggregate value from its children currently held
/// in the stores (spec §7's `computeParentValue`: used by a thin adapter
/// synthesizing the parent-level event after a single child port is edited
/// directly, so the edit still looks like one coherent parent write to the
/// rest of the pipeline). Returns the unmodified `fallback` value, logged,
/// on any missing-config or non-numeric-index condition rather than
/// propagating an error.
pub fn compute_parent_value(stores: &GranularStores, parent_key: &PortKey, fallback: &Value) -> Value {
    let Some(parent_config) = stores.config(parent_key) else {
        tracing::warn!(port_key = %parent_key, "missing config for parent value computation");
        return fallback.clone();
    };

    match &parent_config {
        PortConfig::Object(body) => {
            let mut out = Map::new();
            for field in body.schema.properties.keys() {
                let child_key = to_key(parent_config.node_id(), &format!("{}.{field}", parent_config.id()));
                let Some(child_value) = stores.value(&child_key) else {
                    tracing::warn!(port_key = %child_key, "missing config for parent value computation");
                    return fallback.clone();
                };
                out.insert(field.clone(), child_value);
            }
            Value::Object(out)
        }
        PortConfig::Array(_) => {
            let mut elements: Vec<(u64, Value)> = Vec::new();
            for child_key in stores.children_of(parent_key) {
                let Ok((_, port_id)) = from_key(&child_key) else { continue };
                let Some(index) = array_element_index(&port_id) else {
                    tracing::warn!(port_id, "invalid array index in parent value computation");
                    return fallback.clone();
                };
                let Some(value) = stores.value(&child_key) else {
                    tracing::warn!(port_key = %child_key, "missing config for parent value computation");
                    return fallback.clone();
                };
                elements.push((index, value));
            }
            elements.sort_by_key(|(i, _)| *i);
            Value::Array(elements.into_iter().map(|(_, v)| v).collect())
        }
        _ => fallback.clone(),
    }
}

/// Node removal (spec §4.10): the caller looks up `nodePortKeys[nodeId]`
/// itself and hands the full set here; cascade cleanup of descendants is the
/// hierarchy store's job once these keys are removed.
pub fn remove_node(stores: &GranularStores, node_id: &str) {
    let keys: Vec<PortKey> = stores.node_port_keys(node_id).into_iter().collect();
    stores.remove_ports_batch(&keys);
}

/// A dynamically appended array element (array grows by one, object field
/// added): synthesizes the single `PortUpdateEvent` the normal pipeline
/// needs, rather than bypassing it with a direct store write.
pub fn synthesize_port_added(node_id: &str, port_id: &str, handle: &dyn PortHandle, version: u64, timestamp: i64) -> PortUpdateEvent {
    PortUpdateEvent::new(node_id, port_id, timestamp, EventSource::Subscription)
        .with_version(version)
        .with_value(handle.get_value())
        .with_config(handle.get_config())
        .with_ui(handle.get_ui())
        .with_connections(handle.get_connections())
}
