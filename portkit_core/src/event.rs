//! The update event that flows through the pipeline (spec §3).

use crate::config::PortConfig;
use crate::connection::Connection;
use crate::key::{to_key, PortKey};
use crate::ui::PortUiState;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventSource {
    Subscription,
    LocalOptimistic,
}

/// Per-concern payload of a [`PortUpdateEvent`]. Each field is `Some` iff
/// that concern is actually present on the event — a `None` is "not
/// mentioned", not "cleared". Clearing a value requires `Some(Value::Null)`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Changes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui: Option<PortUiState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<PortConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connections: Option<Vec<Connection>>,
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        self.value.is_none() && self.ui.is_none() && self.config.is_none() && self.connections.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PortUpdateEvent {
    pub port_key: PortKey,
    pub node_id: String,
    pub port_id: String,
    pub timestamp: i64,
    pub source: EventSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mutation_id: Option<String>,
    pub changes: Changes,
}

impl PortUpdateEvent {
    pub fn new(node_id: impl Into<String>, port_id: impl Into<String>, timestamp: i64, source: EventSource) -> Self {
        let node_id = node_id.into();
        let port_id = port_id.into();
        let port_key = to_key(&node_id, &port_id);
        PortUpdateEvent {
            port_key,
            node_id,
            port_id,
            timestamp,
            source,
            version: None,
            client_id: None,
            mutation_id: None,
            changes: Changes::default(),
        }
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.changes.value = Some(value);
        self
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_config(mut self, config: PortConfig) -> Self {
        self.changes.config = Some(config);
        self
    }

    pub fn with_ui(mut self, ui: PortUiState) -> Self {
        self.changes.ui = Some(ui);
        self
    }

    pub fn with_connections(mut self, connections: Vec<Connection>) -> Self {
        self.changes.connections = Some(connections);
        self
    }
}
