//! Collaborator contract (spec §6): the core consumes an opaque `Node` that
//! can enumerate its ports and child ports. The node/flow domain model, the
//! execution engine, and the server transport live outside this crate.

use crate::config::PortConfig;
use crate::connection::Connection;
use crate::ui::PortUiState;
use serde_json::Value;

/// One port exposed by a [`NodeSource`], or by a parent `PortHandle` for its
/// immediate structural children (`getChildPorts` in spec §6).
pub trait PortHandle {
    /// The root-relative portId, e.g. `"field"`, not a full path for children
    /// below the first level — the expander (spec §4.3) builds the full path.
    fn port_id(&self) -> &str;
    fn get_config(&self) -> PortConfig;
    fn get_value(&self) -> Value;
    fn get_ui(&self) -> PortUiState {
        PortUiState::default()
    }
    fn get_connections(&self) -> Vec<Connection> {
        Vec::new()
    }
    /// Immediate structural children of this port, if any.
    fn child_ports(&self) -> Vec<Box<dyn PortHandle>> {
        Vec::new()
    }
}

/// A node: an id, a version, and a root-level port list.
pub trait NodeSource {
    fn node_id(&self) -> &str;
    fn get_version(&self) -> u64;
    fn ports(&self) -> Vec<Box<dyn PortHandle>>;
}
