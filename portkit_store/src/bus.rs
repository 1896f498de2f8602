//! Ingress event surface (spec §6), grounded on the teacher's
//! `InteractionCommand` shape: one closed enum of everything an external
//! transport/UI can push into the engine.

use portkit_core::prelude::*;

#[derive(Clone, Debug, PartialEq)]
pub enum IngressEvent {
    PortUpdateReceived(PortUpdateEvent),
    PortUpdatesReceived(Vec<PortUpdateEvent>),
    AddPendingMutation { port_key: PortKey, value: serde_json::Value, version: u64, mutation_id: String },
    ConfirmPendingMutation { port_key: PortKey, mutation_id: String },
    RejectPendingMutation { port_key: PortKey, mutation_id: String, reason: String },
    NodeRemoved(String),
    FlowInitStart,
    FlowInitEnd,
    GlobalReset,
}

impl IngressEvent {
    pub fn add_pending_mutation(port_key: PortKey, value: serde_json::Value, version: u64, mutation_id: String) -> Self {
        IngressEvent::AddPendingMutation { port_key, value, version, mutation_id }
    }

    pub fn confirm_pending_mutation(port_key: PortKey, mutation_id: impl Into<String>) -> Self {
        IngressEvent::ConfirmPendingMutation { port_key, mutation_id: mutation_id.into() }
    }

    pub fn reject_pending_mutation(port_key: PortKey, mutation_id: impl Into<String>, reason: impl Into<String>) -> Self {
        IngressEvent::RejectPendingMutation { port_key, mutation_id: mutation_id.into(), reason: reason.into() }
    }
}
