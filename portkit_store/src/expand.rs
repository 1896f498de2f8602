//! Subtree expander (spec §4.3): turns one event for an `object`/`array`
//! port into synthetic child events for every field / element, recursively.

use portkit_core::prelude::*;
use serde_json::Value;

/// Expand one event into itself followed by synthetic events for every
/// descendant reachable from its config + value. Timestamps, source, and
/// version propagate unchanged into synthetic children: they are logically
/// part of the same causal event.
pub fn expand_schema_children(event: &PortUpdateEvent) -> Vec<PortUpdateEvent> {
    let mut out = vec![event.clone()];
    if let Some(config) = event.changes.config.clone() {
        expand_into(event, &config, event.changes.value.as_ref(), &mut out);
    }
    out
}

fn synthetic_child(parent: &PortUpdateEvent, child_port_id: String) -> PortUpdateEvent {
    let mut child = PortUpdateEvent::new(parent.node_id.clone(), child_port_id, parent.timestamp, parent.source);
    child.version = parent.version;
    child.client_id = parent.client_id.clone();
    child.mutation_id = parent.mutation_id.clone();
    child
}

fn expand_into(parent: &PortUpdateEvent, config: &PortConfig, value: Option<&Value>, out: &mut Vec<PortUpdateEvent>) {
    match config {
        PortConfig::Object(body) => {
            for (field_key, field_config) in body.schema.properties.iter() {
                let child_port_id = format!("{}.{}", parent.port_id, field_key);
                let child_value = value
                    .and_then(|v| v.as_object())
                    .and_then(|m| m.get(field_key))
                    .cloned();
                let child_config = extract_config_core(
                    field_config.clone(),
                    &parent.node_id,
                    Some(&parent.port_id),
                );

                let mut child = synthetic_child(parent, child_port_id);
                child.changes.value = child_value.clone();
                child.changes.config = Some(child_config.clone());

                expand_into(&child, &child_config, child_value.as_ref(), out);
                out.push(child);
            }
        }
        PortConfig::Array(body) => {
            let Some(Value::Array(elements)) = value else {
                return;
            };
            for (index, element_value) in elements.iter().enumerate() {
                let child_port_id = format!("{}[{}]", parent.port_id, index);
                let mut element_config = extract_config_core(
                    (*body.item_config).clone(),
                    &parent.node_id,
                    Some(&parent.port_id),
                );
                {
                    let identity = element_config.identity_mut();
                    identity.id = child_port_id.clone();
                    identity.key = index.to_string();
                    identity.parent_id = Some(parent.port_id.clone());
                }

                let mut child = synthetic_child(parent, child_port_id);
                child.changes.value = Some(element_value.clone());
                child.changes.config = Some(element_config.clone());

                expand_into(&child, &element_config, Some(element_value), out);
                out.push(child);
            }
        }
        _ => {}
    }
}
