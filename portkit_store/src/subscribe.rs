//! Public subscription surface (spec §4.11): per-concern fine-grained
//! readers over the granular stores. Deep-equality gating for change
//! notification is the caller's job (an external event-bus integration);
//! this module only guarantees the read side returns the documented
//! defaults and shapes.

use crate::derived::port_descendants;
use crate::stores::GranularStores;
use portkit_core::prelude::*;

/// Combined per-port bundle (spec §4.11).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PortBundle {
    pub value: Option<serde_json::Value>,
    pub ui: PortUiState,
    pub config: Option<PortConfig>,
    pub connections: Vec<Connection>,
}

pub struct PortReader<'a> {
    stores: &'a GranularStores,
    descendants_bfs_cap: usize,
}

impl<'a> PortReader<'a> {
    pub fn new(stores: &'a GranularStores, descendants_bfs_cap: usize) -> Self {
        PortReader { stores, descendants_bfs_cap }
    }

    pub fn value(&self, node_id: &str, port_id: &str) -> Option<serde_json::Value> {
        self.stores.value(&to_key(node_id, port_id))
    }

    pub fn ui(&self, node_id: &str, port_id: &str) -> PortUiState {
        self.stores.ui(&to_key(node_id, port_id))
    }

    pub fn config(&self, node_id: &str, port_id: &str) -> Option<PortConfig> {
        self.stores.config(&to_key(node_id, port_id))
    }

    /// Pointer-equality gate upstream, not deep: callers comparing across
    /// calls should compare the returned `&'static str` by value, which is
    /// equivalent here since `type_name()` always yields the same interned
    /// literal per variant.
    pub fn port_type(&self, node_id: &str, port_id: &str) -> Option<&'static str> {
        self.stores.config(&to_key(node_id, port_id)).map(|c| c.type_name())
    }

    pub fn connections(&self, node_id: &str, port_id: &str) -> Vec<Connection> {
        self.stores.connections(&to_key(node_id, port_id))
    }

    pub fn child_port_ids(&self, node_id: &str, parent_port_id: &str) -> Vec<String> {
        self.stores
            .children_of(&to_key(node_id, parent_port_id))
            .into_iter()
            .filter_map(|k| from_key(&k).ok().map(|(_, p)| p))
            .collect()
    }

    /// Descendants of one port, or the union over every root-level port of
    /// `node_id` when `port_id` is `None`.
    pub fn descendant_port_ids(&self, node_id: &str, port_id: Option<&str>) -> Vec<String> {
        match port_id {
            Some(port_id) => port_descendants(self.stores, &to_key(node_id, port_id), self.descendants_bfs_cap),
            None => self
                .stores
                .node_port_keys(node_id)
                .into_iter()
                .filter(|k| {
                    self.stores
                        .config(k)
                        .map(|c| c.parent_id().is_none())
                        .unwrap_or(false)
                })
                .flat_map(|k| port_descendants(self.stores, &k, self.descendants_bfs_cap))
                .collect(),
        }
    }

    pub fn port(&self, node_id: &str, port_id: &str) -> PortBundle {
        let key = to_key(node_id, port_id);
        PortBundle {
            value: self.stores.value(&key),
            ui: self.stores.ui(&key),
            config: self.stores.config(&key),
            connections: self.stores.connections(&key),
        }
    }
}
