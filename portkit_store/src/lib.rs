//! The granular reactive port-state engine: ingest, reconciliation,
//! normalized stores, and derived views over `portkit_core`'s data model.
//! See `SPEC_FULL.md` at the workspace root.

pub mod batch;
pub mod bus;
pub mod config;
pub mod derived;
pub mod echo;
pub mod expand;
pub mod ledger;
pub mod merge;
pub mod stale;
pub mod stores;
pub mod subscribe;
pub mod wiring;

use bus::IngressEvent;
use config::EngineConfig;
use derived::{NodePortLists, NodePortListsGate};
use ledger::{spawn_sweep, PendingMutation, PendingMutationLedger, SweepHandle};
use parking_lot::Mutex;
use portkit_core::prelude::*;
use stale::NodePortKeyIndex;
use stores::GranularStores;
use subscribe::PortReader;
use std::collections::{HashMap, HashSet};

pub mod prelude {
    pub use crate::bus::IngressEvent;
    pub use crate::config::{EngineConfig, MigrationMode};
    pub use crate::derived::{collapsed_handle_data, node_port_lists, port_descendants, HandleRecord, NodePortLists};
    pub use crate::echo::{ConfirmedMutation, FilterResult};
    pub use crate::ledger::{client_id, generate_mutation_id, now_ms, PendingMutation};
    pub use crate::stores::GranularStores;
    pub use crate::subscribe::{PortBundle, PortReader};
    pub use crate::wiring::{extract_node, extract_nodes, remove_node, synthesize_port_added};
    pub use crate::Engine;
}

/// Owns every piece of mutable state: the normalized stores, the pending
/// mutation ledger and its sweep thread, and the init-mode gate for
/// `$nodePortLists`. One process hosts exactly one `Engine` in the original
/// system's single-threaded event-loop model (spec §5); nothing here
/// prevents multiple instances, but there is no reason to build more than
/// one.
pub struct Engine {
    stores: GranularStores,
    ledger: PendingMutationLedger,
    config: EngineConfig,
    sweep: Option<SweepHandle>,
    port_lists_gate: Mutex<NodePortListsGate>,
}

/// Build an `Engine` and, unless migration is globally disabled, start its
/// background pending-mutation sweep (spec §4.5, §5).
pub fn init(config: EngineConfig) -> Engine {
    let ledger = PendingMutationLedger::new();
    let sweep = config.migration_mode.is_enabled().then(|| {
        spawn_sweep(ledger.clone(), config.pending_mutation_sweep_interval, config.pending_mutation_timeout)
    });
    Engine {
        stores: GranularStores::new(),
        ledger,
        config,
        sweep,
        port_lists_gate: Mutex::new(NodePortListsGate::new()),
    }
}

impl Engine {
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn stores(&self) -> &GranularStores {
        &self.stores
    }

    pub fn reader(&self) -> PortReader<'_> {
        PortReader::new(&self.stores, self.config.descendants_bfs_cap)
    }

    /// `$nodePortLists` as of the last non-suppressed recompute (spec §4.9):
    /// reads the init-mode gate's cache rather than recomputing from the
    /// stores, so a caller observes the suppression while flow init is in
    /// progress instead of bypassing it.
    pub fn node_port_lists(&self) -> HashMap<String, NodePortLists> {
        self.port_lists_gate.lock().cache().clone()
    }

    /// Stop the background sweep thread deterministically. Safe to call
    /// more than once; subsequent calls are no-ops.
    pub fn shutdown(&mut self) {
        if let Some(sweep) = self.sweep.take() {
            sweep.stop();
        }
    }

    /// Run one or more already-echo-filtered or raw events through the full
    /// pipeline: optional echo filtering, subtree expansion, merge, and
    /// atomic apply (spec §4.6, §4.7).
    fn ingest(&self, events: &[PortUpdateEvent]) {
        if events.is_empty() {
            return;
        }

        let migration_enabled = self.config.migration_mode.is_enabled();
        let mut filtered = Vec::with_capacity(events.len());
        for event in events {
            let result = echo::filter_echo(event, &self.stores, &self.ledger, migration_enabled);
            for confirmed in result.confirmed {
                self.ledger.confirm(&confirmed.port_key, &confirmed.mutation_id);
            }
            if let Some(event) = result.filtered {
                filtered.push(event);
            }
        }
        if filtered.is_empty() {
            return;
        }

        let node_ids: HashSet<String> = filtered.iter().map(|e| e.node_id.clone()).collect();
        let mut index: NodePortKeyIndex = NodePortKeyIndex::new();
        for node_id in node_ids {
            let keys = self.stores.node_port_keys(&node_id);
            index.insert(node_id, keys);
        }

        let processed = batch::process_batch(&filtered, &index);
        if processed.is_empty() {
            return;
        }
        let configs_touched = !processed.config_updates.is_empty();
        self.stores.apply_batch(&processed);

        if configs_touched {
            self.port_lists_gate.lock().on_configs_changed(&self.stores);
        }
    }

    /// `nodeAdded` (spec §4.10, §6): recursively extract one node's ports
    /// and run them through the normal ingest pipeline.
    pub fn node_added(&self, node: &dyn NodeSource, timestamp: i64) {
        self.ingest(&wiring::extract_node(node, timestamp));
    }

    /// `nodesAdded`/`nodesSet` (spec §4.10, §6).
    pub fn nodes_added(&self, nodes: &[&dyn NodeSource], timestamp: i64) {
        self.ingest(&wiring::extract_nodes(nodes, timestamp));
    }

    /// Dispatch one ingress event (spec §6). This is the single entry point
    /// external transports/UI integrations call into.
    pub fn dispatch(&self, event: IngressEvent) {
        match event {
            IngressEvent::PortUpdateReceived(e) => self.ingest(std::slice::from_ref(&e)),
            IngressEvent::PortUpdatesReceived(events) => self.ingest(&events),
            IngressEvent::AddPendingMutation { port_key, value, version, mutation_id } => {
                self.ledger.add(PendingMutation {
                    port_key,
                    value,
                    version,
                    timestamp: ledger::now_ms(),
                    mutation_id,
                    client_id: ledger::client_id().to_string(),
                });
            }
            IngressEvent::ConfirmPendingMutation { port_key, mutation_id } => {
                self.ledger.confirm(&port_key, &mutation_id);
            }
            IngressEvent::RejectPendingMutation { port_key, mutation_id, reason } => {
                self.ledger.reject(&port_key, &mutation_id, &reason);
            }
            IngressEvent::NodeRemoved(node_id) => {
                wiring::remove_node(&self.stores, &node_id);
            }
            IngressEvent::FlowInitStart => {
                self.port_lists_gate.lock().flow_init_start();
            }
            IngressEvent::FlowInitEnd => {
                self.port_lists_gate.lock().flow_init_end(&self.stores);
            }
            IngressEvent::GlobalReset => {
                self.stores.reset();
                self.ledger.reset();
            }
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_config() -> EngineConfig {
        EngineConfig {
            migration_mode: config::MigrationMode::Full,
            pending_mutation_timeout: std::time::Duration::from_secs(10),
            pending_mutation_sweep_interval: std::time::Duration::from_secs(3600),
            descendants_bfs_cap: 20,
        }
    }

    fn number_cfg(node_id: &str, id: &str) -> PortConfig {
        PortConfig::Number(PortConfigBody {
            identity: PortIdentity::new(id, node_id, PortDirection::Input),
            original_type: None,
            extra: Default::default(),
        })
    }

    #[test]
    fn end_to_end_ingest_then_read_back() {
        let mut engine = init(test_config());
        let event = PortUpdateEvent::new("N", "p", 1, EventSource::Subscription)
            .with_value(json!(7))
            .with_config(number_cfg("N", "p"))
            .with_version(1);
        engine.dispatch(IngressEvent::PortUpdateReceived(event));

        let reader = engine.reader();
        assert_eq!(reader.value("N", "p"), Some(json!(7)));
        assert_eq!(reader.port_type("N", "p"), Some("number"));
        engine.shutdown();
    }

    #[test]
    fn optimistic_confirm_round_trip() {
        let engine = init(test_config());
        let key = to_key("N", "p");
        engine.dispatch(IngressEvent::add_pending_mutation(key.clone(), json!("X"), 7, "m1".into()));
        assert!(engine.ledger.has_pending(&key));

        let echo = PortUpdateEvent::new("N", "p", 2, EventSource::Subscription)
            .with_value(json!("X"))
            .with_version(7);
        engine.dispatch(IngressEvent::PortUpdateReceived(echo));

        assert!(!engine.ledger.has_pending(&key));
        assert_eq!(engine.reader().value("N", "p"), Some(json!("X")));
    }

    struct OnePort;
    impl PortHandle for OnePort {
        fn port_id(&self) -> &str {
            "p"
        }
        fn get_config(&self) -> PortConfig {
            number_cfg("N", "p")
        }
        fn get_value(&self) -> serde_json::Value {
            json!(99)
        }
    }
    struct OneNode;
    impl NodeSource for OneNode {
        fn node_id(&self) -> &str {
            "N"
        }
        fn get_version(&self) -> u64 {
            1
        }
        fn ports(&self) -> Vec<Box<dyn PortHandle>> {
            vec![Box::new(OnePort)]
        }
    }

    #[test]
    fn node_added_extracts_and_ingests_its_ports() {
        let engine = init(test_config());
        engine.node_added(&OneNode, 1);
        assert_eq!(engine.reader().value("N", "p"), Some(json!(99)));
    }

    #[test]
    fn global_reset_clears_stores_and_ledger() {
        let engine = init(test_config());
        let key = to_key("N", "p");
        engine.dispatch(IngressEvent::add_pending_mutation(key.clone(), json!("X"), 1, "m1".into()));
        engine.dispatch(IngressEvent::PortUpdateReceived(
            PortUpdateEvent::new("N", "p", 1, EventSource::Subscription).with_value(json!(1)).with_config(number_cfg("N", "p")),
        ));
        engine.dispatch(IngressEvent::GlobalReset);

        assert_eq!(engine.reader().value("N", "p"), None);
        assert!(!engine.ledger.has_pending(&key));
    }

    #[test]
    fn node_port_lists_suppressed_during_flow_init_and_updated_on_end() {
        let engine = init(test_config());
        engine.dispatch(IngressEvent::FlowInitStart);
        engine.dispatch(IngressEvent::PortUpdateReceived(
            PortUpdateEvent::new("N", "p", 1, EventSource::Subscription).with_value(json!(1)).with_config(number_cfg("N", "p")),
        ));
        assert!(engine.node_port_lists().is_empty());

        engine.dispatch(IngressEvent::FlowInitEnd);
        let lists = engine.node_port_lists();
        assert!(lists.get("N").is_some_and(|n| n.input_port_ids.len() == 1));
    }

    #[test]
    fn node_removed_cascades_through_stores() {
        let engine = init(test_config());
        engine.dispatch(IngressEvent::PortUpdateReceived(
            PortUpdateEvent::new("N", "p", 1, EventSource::Subscription).with_value(json!(1)).with_config(number_cfg("N", "p")),
        ));
        assert!(engine.reader().config("N", "p").is_some());

        engine.dispatch(IngressEvent::NodeRemoved("N".to_string()));
        assert!(engine.reader().config("N", "p").is_none());
        assert!(engine.stores().node_port_keys("N").is_empty());
    }
}
