//! Granular stores (spec §4.8): six normalized maps keyed by `PortKey` plus
//! the per-node and hierarchy indices, applied atomically per batch.

use crate::batch::ProcessedBatch;
use parking_lot::RwLock;
use portkit_core::prelude::*;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

#[derive(Default)]
struct StoreState {
    values: HashMap<PortKey, serde_json::Value>,
    ui: HashMap<PortKey, PortUiState>,
    configs: HashMap<PortKey, PortConfig>,
    connections: HashMap<PortKey, Vec<Connection>>,
    versions: HashMap<PortKey, u64>,
    parents: HashMap<PortKey, PortKey>,
    children: HashMap<PortKey, Vec<PortKey>>,
    node_port_keys: HashMap<String, BTreeSet<PortKey>>,
}

/// Sort siblings by the canonical rule (spec §3): array-element siblings
/// (`prefix[N]`) by numeric `N`, all other siblings lexicographically by
/// portId.
fn sort_children(children: &mut Vec<PortKey>) {
    children.sort_by(|a, b| {
        let (_, pa) = from_key(a).unwrap_or_default_pair();
        let (_, pb) = from_key(b).unwrap_or_default_pair();
        match (array_element_index(&pa), array_element_index(&pb)) {
            (Some(ia), Some(ib)) => ia.cmp(&ib),
            _ => pa.cmp(&pb),
        }
    });
}

trait ResultPairExt {
    fn unwrap_or_default_pair(self) -> (String, String);
}
impl ResultPairExt for Result<(String, String), PortError> {
    fn unwrap_or_default_pair(self) -> (String, String) {
        self.unwrap_or_else(|_| (String::new(), String::new()))
    }
}

fn record_node_port_key(state: &mut StoreState, key: &PortKey) {
    if let Ok((node_id, _)) = from_key(key) {
        state.node_port_keys.entry(node_id).or_default().insert(key.clone());
    }
}

fn apply_config_updates_locked(state: &mut StoreState, updates: &HashMap<PortKey, PortConfig>) {
    for (key, incoming) in updates {
        let merged = match state.configs.get(key) {
            Some(existing) => merge_configs(existing, incoming),
            None => incoming.clone(),
        };
        state.configs.insert(key.clone(), merged);
        record_node_port_key(state, key);
    }
}

/// `{...existing, ...partial}` translated to a typed union: same variant ->
/// field-level merge (incoming's `extra` keys override, identity fields
/// incoming leaves `None` fall back to existing, structural children such as
/// `schema.properties`/`itemConfig` take incoming's value wholesale since
/// they don't arrive as partial patches). Different variant, or no existing
/// entry -> incoming is treated as a full replacement.
fn merge_configs(existing: &PortConfig, incoming: &PortConfig) -> PortConfig {
    if existing.type_name() != incoming.type_name() {
        return incoming.clone();
    }
    let mut merged = incoming.clone();
    {
        let existing_identity = existing.identity().clone();
        let identity = merged.identity_mut();
        if identity.title.is_none() {
            identity.title = existing_identity.title;
        }
        if identity.description.is_none() {
            identity.description = existing_identity.description;
        }
        if identity.required.is_none() {
            identity.required = existing_identity.required;
        }
        if identity.order.is_none() {
            identity.order = existing_identity.order;
        }
        if identity.metadata.is_none() {
            identity.metadata = existing_identity.metadata;
        }
    }
    match (existing, &mut merged) {
        (PortConfig::String(e), PortConfig::String(m))
        | (PortConfig::Number(e), PortConfig::Number(m))
        | (PortConfig::Boolean(e), PortConfig::Boolean(m))
        | (PortConfig::Enum(e), PortConfig::Enum(m))
        | (PortConfig::Stream(e), PortConfig::Stream(m))
        | (PortConfig::Secret(e), PortConfig::Secret(m)) => {
            for (k, v) in e.extra.iter() {
                m.extra.entry(k.clone()).or_insert_with(|| v.clone());
            }
        }
        (PortConfig::Array(e), PortConfig::Array(m)) => {
            for (k, v) in e.extra.iter() {
                m.extra.entry(k.clone()).or_insert_with(|| v.clone());
            }
        }
        (PortConfig::Object(e), PortConfig::Object(m)) => {
            for (k, v) in e.extra.iter() {
                m.extra.entry(k.clone()).or_insert_with(|| v.clone());
            }
        }
        _ => {}
    }
    merged
}

impl StoreState {
    fn remove_batch(&mut self, keys: &[PortKey]) {
        let mut to_remove: HashSet<PortKey> = keys.iter().cloned().collect();
        let mut queue: VecDeque<PortKey> = keys.iter().cloned().collect();
        while let Some(k) = queue.pop_front() {
            if let Some(children) = self.children.get(&k) {
                for c in children.clone() {
                    if to_remove.insert(c.clone()) {
                        queue.push_back(c);
                    }
                }
            }
        }

        for key in &to_remove {
            self.values.remove(key);
            self.ui.remove(key);
            self.configs.remove(key);
            self.connections.remove(key);
            self.versions.remove(key);
            self.children.remove(key);

            if let Some(parent) = self.parents.remove(key) {
                if !to_remove.contains(&parent) {
                    if let Some(siblings) = self.children.get_mut(&parent) {
                        siblings.retain(|s| s != key);
                        if siblings.is_empty() {
                            self.children.remove(&parent);
                        }
                    }
                }
            }

            if let Ok((node_id, _)) = from_key(key) {
                if let Some(set) = self.node_port_keys.get_mut(&node_id) {
                    set.remove(key);
                    if set.is_empty() {
                        self.node_port_keys.remove(&node_id);
                    }
                }
            }
        }
    }

    fn apply(&mut self, batch: &ProcessedBatch) {
        for (key, value) in &batch.value_updates {
            self.values.insert(key.clone(), value.clone());
        }
        for (key, ui) in &batch.ui_updates {
            let merged = match self.ui.get(key) {
                Some(existing) => merge_ui_states(existing, ui),
                None => ui.clone(),
            };
            self.ui.insert(key.clone(), merged);
        }
        apply_config_updates_locked(self, &batch.config_updates);
        for (key, connections) in &batch.connection_updates {
            self.connections.insert(key.clone(), connections.clone());
        }
        for (key, version) in &batch.version_updates {
            self.versions.insert(key.clone(), *version);
        }
        for (child, parent) in &batch.hierarchy_parents {
            self.parents.insert(child.clone(), parent.clone());
        }
        for (parent, new_children) in &batch.hierarchy_children {
            let entry = self.children.entry(parent.clone()).or_default();
            for c in new_children {
                if !entry.contains(c) {
                    entry.push(c.clone());
                }
            }
            sort_children(entry);
        }
        if !batch.stale_port_keys.is_empty() {
            let stale: Vec<PortKey> = batch.stale_port_keys.iter().cloned().collect();
            self.remove_batch(&stale);
        }
    }
}

#[derive(Default)]
pub struct GranularStores {
    state: RwLock<StoreState>,
}

impl GranularStores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one [`ProcessedBatch`] atomically. Order within the lock:
    /// value, UI, config, connections, version, hierarchy, stale removals
    /// (spec §4.7) — callers must not rely on any finer-grained ordering.
    pub fn apply_batch(&self, batch: &ProcessedBatch) {
        if batch.is_empty() {
            return;
        }
        self.state.write().apply(batch);
    }

    pub fn remove_ports_batch(&self, keys: &[PortKey]) {
        if keys.is_empty() {
            return;
        }
        self.state.write().remove_batch(keys);
    }

    pub fn reset(&self) {
        *self.state.write() = StoreState::default();
    }

    pub fn value(&self, key: &PortKey) -> Option<serde_json::Value> {
        self.state.read().values.get(key).cloned()
    }

    pub fn ui(&self, key: &PortKey) -> PortUiState {
        self.state.read().ui.get(key).cloned().unwrap_or_default()
    }

    pub fn config(&self, key: &PortKey) -> Option<PortConfig> {
        self.state.read().configs.get(key).cloned()
    }

    pub fn connections(&self, key: &PortKey) -> Vec<Connection> {
        self.state.read().connections.get(key).cloned().unwrap_or_default()
    }

    pub fn version(&self, key: &PortKey) -> Option<u64> {
        self.state.read().versions.get(key).copied()
    }

    pub fn parent_of(&self, key: &PortKey) -> Option<PortKey> {
        self.state.read().parents.get(key).cloned()
    }

    pub fn children_of(&self, key: &PortKey) -> Vec<PortKey> {
        self.state.read().children.get(key).cloned().unwrap_or_default()
    }

    pub fn node_port_keys(&self, node_id: &str) -> BTreeSet<PortKey> {
        self.state
            .read()
            .node_port_keys
            .get(node_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn all_configs(&self) -> HashMap<PortKey, PortConfig> {
        self.state.read().configs.clone()
    }

    pub fn all_children(&self) -> HashMap<PortKey, Vec<PortKey>> {
        self.state.read().children.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg_with_parent(node_id: &str, id: &str, parent: Option<&str>) -> PortConfig {
        let mut identity = PortIdentity::new(id, node_id, PortDirection::Input);
        identity.parent_id = parent.map(|p| p.to_string());
        PortConfig::Number(PortConfigBody { identity, original_type: None, extra: Default::default() })
    }

    #[test]
    fn hierarchy_children_are_sorted_lexicographically_for_object_fields() {
        let stores = GranularStores::new();
        let mut batch = ProcessedBatch::default();
        let parent_key = to_key("N", "obj");
        for field in ["b", "a"] {
            let child_key = to_key("N", &format!("obj.{field}"));
            batch.config_updates.insert(child_key.clone(), cfg_with_parent("N", &format!("obj.{field}"), Some("obj")));
            batch.hierarchy_parents.insert(child_key.clone(), parent_key.clone());
            batch.hierarchy_children.entry(parent_key.clone()).or_default().push(child_key);
        }
        stores.apply_batch(&batch);
        let children = stores.children_of(&parent_key);
        assert_eq!(children, vec![to_key("N", "obj.a"), to_key("N", "obj.b")]);
    }

    #[test]
    fn hierarchy_children_are_sorted_numerically_for_array_elements() {
        let stores = GranularStores::new();
        let mut batch = ProcessedBatch::default();
        let parent_key = to_key("N", "arr");
        for i in [10, 2, 1] {
            let child_key = to_key("N", &format!("arr[{i}]"));
            batch.config_updates.insert(child_key.clone(), cfg_with_parent("N", &format!("arr[{i}]"), Some("arr")));
            batch.hierarchy_parents.insert(child_key.clone(), parent_key.clone());
            batch.hierarchy_children.entry(parent_key.clone()).or_default().push(child_key);
        }
        stores.apply_batch(&batch);
        let children = stores.children_of(&parent_key);
        assert_eq!(children, vec![to_key("N", "arr[1]"), to_key("N", "arr[2]"), to_key("N", "arr[10]")]);
    }

    #[test]
    fn remove_ports_batch_cascades_to_descendants_and_unlinks_parent() {
        let stores = GranularStores::new();
        let mut batch = ProcessedBatch::default();
        let root = to_key("N", "obj");
        let child = to_key("N", "obj.a");
        let grandchild = to_key("N", "obj.a.x");
        batch.config_updates.insert(root.clone(), cfg_with_parent("N", "obj", None));
        batch.config_updates.insert(child.clone(), cfg_with_parent("N", "obj.a", Some("obj")));
        batch.config_updates.insert(grandchild.clone(), cfg_with_parent("N", "obj.a.x", Some("obj.a")));
        batch.hierarchy_parents.insert(child.clone(), root.clone());
        batch.hierarchy_parents.insert(grandchild.clone(), child.clone());
        batch.hierarchy_children.entry(root.clone()).or_default().push(child.clone());
        batch.hierarchy_children.entry(child.clone()).or_default().push(grandchild.clone());
        stores.apply_batch(&batch);

        stores.remove_ports_batch(&[child.clone()]);

        assert!(stores.config(&child).is_none());
        assert!(stores.config(&grandchild).is_none());
        assert!(stores.config(&root).is_some());
        assert!(stores.children_of(&root).is_empty());
    }

    #[test]
    fn merge_configs_carries_over_extra_keys_for_array_and_object_configs() {
        let mut array_extra = serde_json::Map::new();
        array_extra.insert("minItems".to_string(), serde_json::json!(1));
        let existing_array = PortConfig::Array(ArrayPortConfigBody {
            identity: PortIdentity::new("arr", "N", PortDirection::Input),
            original_type: None,
            item_config: Box::new(PortConfig::Number(PortConfigBody {
                identity: PortIdentity::new("item", "", PortDirection::Input),
                original_type: None,
                extra: Default::default(),
            })),
            extra: array_extra,
        });
        let incoming_array = PortConfig::Array(ArrayPortConfigBody {
            identity: PortIdentity::new("arr", "N", PortDirection::Input),
            original_type: None,
            item_config: Box::new(PortConfig::Number(PortConfigBody {
                identity: PortIdentity::new("item", "", PortDirection::Input),
                original_type: None,
                extra: Default::default(),
            })),
            extra: Default::default(),
        });
        let merged = merge_configs(&existing_array, &incoming_array);
        match merged {
            PortConfig::Array(body) => assert_eq!(body.extra.get("minItems"), Some(&serde_json::json!(1))),
            _ => panic!("expected array config"),
        }

        let mut object_extra = serde_json::Map::new();
        object_extra.insert("additionalProperties".to_string(), serde_json::json!(false));
        let existing_object = PortConfig::Object(ObjectPortConfigBody {
            identity: PortIdentity::new("obj", "N", PortDirection::Input),
            original_type: None,
            schema: ObjectSchema::default(),
            extra: object_extra,
        });
        let incoming_object = PortConfig::Object(ObjectPortConfigBody {
            identity: PortIdentity::new("obj", "N", PortDirection::Input),
            original_type: None,
            schema: ObjectSchema::default(),
            extra: Default::default(),
        });
        let merged = merge_configs(&existing_object, &incoming_object);
        match merged {
            PortConfig::Object(body) => {
                assert_eq!(body.extra.get("additionalProperties"), Some(&serde_json::json!(false)))
            }
            _ => panic!("expected object config"),
        }
    }

    #[test]
    fn node_port_keys_tracks_membership_and_shrinks_to_empty() {
        let stores = GranularStores::new();
        let mut batch = ProcessedBatch::default();
        let key = to_key("N", "p");
        batch.config_updates.insert(key.clone(), cfg_with_parent("N", "p", None));
        stores.apply_batch(&batch);
        assert!(stores.node_port_keys("N").contains(&key));

        stores.remove_ports_batch(&[key.clone()]);
        assert!(stores.node_port_keys("N").is_empty());
    }
}
