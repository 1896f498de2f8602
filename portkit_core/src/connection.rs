//! Port-to-port connection endpoints (spec §3).

use serde::{Deserialize, Serialize};

/// One endpoint a port is wired to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub node_id: String,
    pub port_id: String,
}

/// Union `existing` and `incoming`, deduplicated on `(nodeId, portId)`,
/// preserving first-seen order (spec §3, §4.2).
pub fn union_connections(existing: &[Connection], incoming: &[Connection]) -> Vec<Connection> {
    let mut out = Vec::with_capacity(existing.len() + incoming.len());
    for c in existing.iter().chain(incoming.iter()) {
        if !out
            .iter()
            .any(|o: &Connection| o.node_id == c.node_id && o.port_id == c.port_id)
        {
            out.push(c.clone());
        }
    }
    out
}
