//! Derived views (spec §4.9): pure projections over the granular stores,
//! recomputed on upstream change and themselves gated by deep equality.

use crate::stores::GranularStores;
use portkit_core::prelude::*;
use std::collections::{HashMap, HashSet, VecDeque};

/// `$portDescendants`: BFS over `hierarchy` only, cycle-safe, depth-capped.
/// Yields portIds (not keys) in BFS order.
pub fn port_descendants(stores: &GranularStores, parent: &PortKey, depth_cap: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut visited: HashSet<PortKey> = HashSet::new();
    visited.insert(parent.clone());
    let mut queue: VecDeque<(PortKey, usize)> = stores
        .children_of(parent)
        .into_iter()
        .map(|k| (k, 1))
        .collect();

    while let Some((key, depth)) = queue.pop_front() {
        if !visited.insert(key.clone()) {
            tracing::debug!(port_key = %key, "cycle detected in hierarchy, pruning branch");
            continue;
        }
        if let Ok((_, port_id)) = from_key(&key) {
            out.push(port_id);
        }
        if depth >= depth_cap {
            continue;
        }
        for child in stores.children_of(&key) {
            queue.push_back((child, depth + 1));
        }
    }
    out
}

/// One compact handle record for `$collapsedHandleData`.
#[derive(Clone, Debug, PartialEq)]
pub struct HandleRecord {
    pub port_id: String,
    pub config_id: String,
    pub has_input: bool,
    pub has_output: bool,
}

fn handle_flags(direction: PortDirection) -> (bool, bool) {
    match direction {
        PortDirection::Input => (true, false),
        PortDirection::Output => (false, true),
        PortDirection::Passthrough => (true, true),
    }
}

/// `$collapsedHandleData`: descendants of parents that have any AND whose UI
/// `collapsed` flag is not `true` (inverted convention: `collapsed === true`
/// means children are shown, so handles collapse away).
pub fn collapsed_handle_data(stores: &GranularStores, depth_cap: usize) -> HashMap<PortKey, Vec<HandleRecord>> {
    let mut out = HashMap::new();
    for parent in stores.all_children().keys() {
        let descendant_ids = port_descendants(stores, parent, depth_cap);
        if descendant_ids.is_empty() {
            continue;
        }
        if stores.ui(parent).collapsed() {
            continue;
        }
        let Ok((node_id, _)) = from_key(parent) else { continue };
        let mut records = Vec::new();
        for port_id in &descendant_ids {
            let key = to_key(&node_id, port_id);
            let Some(config) = stores.config(&key) else { continue };
            let config_id = config.id().to_string();
            if config_id.is_empty() {
                continue;
            }
            let (has_input, has_output) = handle_flags(config.identity().direction);
            records.push(HandleRecord { port_id: port_id.clone(), config_id, has_input, has_output });
        }
        out.insert(parent.clone(), records);
    }
    out
}

/// `$nodePortLists`: categorization of root-level ports by system role and
/// direction (spec §4.9). Child ports (with `parentId`) are skipped.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodePortLists {
    pub flow_input_port_id: Option<PortKey>,
    pub flow_output_port_id: Option<PortKey>,
    pub error_port_id: Option<PortKey>,
    pub error_message_port_id: Option<PortKey>,
    pub input_port_ids: Vec<PortKey>,
    pub output_port_ids: Vec<PortKey>,
    pub passthrough_port_ids: Vec<PortKey>,
}

pub fn node_port_lists(stores: &GranularStores) -> HashMap<String, NodePortLists> {
    let mut out: HashMap<String, NodePortLists> = HashMap::new();
    for (key, config) in stores.all_configs() {
        if config.parent_id().is_some() {
            continue;
        }
        let identity = config.identity();
        let entry = out.entry(identity.node_id.clone()).or_default();

        if is_system_error_port(&config) {
            match identity.id.as_str() {
                "__error" => entry.error_port_id = Some(key),
                "__errorMessage" => entry.error_message_port_id = Some(key),
                _ => {}
            }
            continue;
        }
        if is_system_port(&config) {
            match identity.direction {
                PortDirection::Input => entry.flow_input_port_id = Some(key),
                PortDirection::Output => entry.flow_output_port_id = Some(key),
                PortDirection::Passthrough => {}
            }
            continue;
        }
        match identity.direction {
            PortDirection::Input => entry.input_port_ids.push(key),
            PortDirection::Output => entry.output_port_ids.push(key),
            PortDirection::Passthrough => entry.passthrough_port_ids.push(key),
        }
    }
    out
}

/// Owns the init-mode suppression gate for `$nodePortLists` (spec §4.9):
/// while flow init is in progress, recompute is skipped on every `configs`
/// change and runs once when init ends.
#[derive(Default)]
pub struct NodePortListsGate {
    init_in_progress: bool,
    dirty: bool,
    cache: HashMap<String, NodePortLists>,
}

impl NodePortListsGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flow_init_start(&mut self) {
        self.init_in_progress = true;
    }

    /// Recompute once on init end if any change was suppressed while it ran.
    pub fn flow_init_end(&mut self, stores: &GranularStores) {
        self.init_in_progress = false;
        if self.dirty {
            self.cache = node_port_lists(stores);
            self.dirty = false;
        }
    }

    /// Call after every `configs` mutation. Returns the up-to-date
    /// projection, or the last cached one if a recompute was suppressed.
    pub fn on_configs_changed(&mut self, stores: &GranularStores) -> &HashMap<String, NodePortLists> {
        if self.init_in_progress {
            self.dirty = true;
        } else {
            self.cache = node_port_lists(stores);
        }
        &self.cache
    }

    /// The gate's current projection without forcing a recompute — the only
    /// way a caller outside this module can observe the init-mode
    /// suppression rather than bypassing it by calling [`node_port_lists`]
    /// directly.
    pub fn cache(&self) -> &HashMap<String, NodePortLists> {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::ProcessedBatch;

    fn cfg(node_id: &str, id: &str, parent: Option<&str>, direction: PortDirection) -> PortConfig {
        let mut identity = PortIdentity::new(id, node_id, direction);
        identity.parent_id = parent.map(|p| p.to_string());
        PortConfig::Number(PortConfigBody { identity, original_type: None, extra: Default::default() })
    }

    #[test]
    fn port_descendants_yields_bfs_order_and_stops_at_cap() {
        let stores = GranularStores::new();
        let mut batch = ProcessedBatch::default();
        let root = to_key("N", "obj");
        let child = to_key("N", "obj.a");
        let grandchild = to_key("N", "obj.a.x");
        batch.config_updates.insert(root.clone(), cfg("N", "obj", None, PortDirection::Input));
        batch.config_updates.insert(child.clone(), cfg("N", "obj.a", Some("obj"), PortDirection::Input));
        batch.config_updates.insert(grandchild.clone(), cfg("N", "obj.a.x", Some("obj.a"), PortDirection::Input));
        batch.hierarchy_parents.insert(child.clone(), root.clone());
        batch.hierarchy_parents.insert(grandchild.clone(), child.clone());
        batch.hierarchy_children.entry(root.clone()).or_default().push(child.clone());
        batch.hierarchy_children.entry(child.clone()).or_default().push(grandchild.clone());
        stores.apply_batch(&batch);

        let descendants = port_descendants(&stores, &root, 20);
        assert_eq!(descendants, vec!["obj.a".to_string(), "obj.a.x".to_string()]);
    }

    #[test]
    fn node_port_lists_categorizes_system_and_plain_ports() {
        let stores = GranularStores::new();
        let mut batch = ProcessedBatch::default();

        let mut sys_in = PortIdentity::new("__flowInput", "N", PortDirection::Input);
        sys_in.metadata = Some(PortMetadata { is_system_port: true, port_category: None });
        let sys_in_key = to_key("N", "__flowInput");
        batch.config_updates.insert(
            sys_in_key.clone(),
            PortConfig::Number(PortConfigBody { identity: sys_in, original_type: None, extra: Default::default() }),
        );

        let mut err = PortIdentity::new("__error", "N", PortDirection::Output);
        err.metadata = Some(PortMetadata { is_system_port: true, port_category: Some("error".into()) });
        let err_key = to_key("N", "__error");
        batch.config_updates.insert(
            err_key.clone(),
            PortConfig::Number(PortConfigBody { identity: err, original_type: None, extra: Default::default() }),
        );

        let plain_key = to_key("N", "value");
        batch.config_updates.insert(plain_key.clone(), cfg("N", "value", None, PortDirection::Output));

        stores.apply_batch(&batch);
        let lists = node_port_lists(&stores);
        let n = lists.get("N").expect("node present");
        assert_eq!(n.flow_input_port_id, Some(sys_in_key));
        assert_eq!(n.error_port_id, Some(err_key));
        assert_eq!(n.output_port_ids, vec![plain_key]);
    }

    #[test]
    fn init_gate_suppresses_until_flow_init_end() {
        let stores = GranularStores::new();
        let mut gate = NodePortListsGate::new();
        gate.flow_init_start();

        let mut batch = ProcessedBatch::default();
        batch.config_updates.insert(to_key("N", "p"), cfg("N", "p", None, PortDirection::Input));
        stores.apply_batch(&batch);
        let during = gate.on_configs_changed(&stores);
        assert!(during.is_empty());

        gate.flow_init_end(&stores);
        assert!(gate.cache.contains_key("N"));
    }
}
