//! Pure reducer that collapses N events for one port into one update
//! (spec §4.2).

use portkit_core::prelude::*;

/// The per-concern result of merging a batch of events for a single port.
/// A field is `None` iff nothing in the batch touched that concern.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MergedPortUpdate {
    pub value: Option<serde_json::Value>,
    pub ui: Option<PortUiState>,
    pub config: Option<PortConfig>,
    pub connections: Option<Vec<Connection>>,
    pub version: Option<u64>,
}

/// Sort ascending primarily by version, then by timestamp. Events without a
/// version don't have a position among versioned events to compare against;
/// they are ordered after every versioned event (so an unconditional,
/// unversioned local-optimistic write always lands last and wins), and
/// among themselves by timestamp. The sort is stable, so equal keys keep
/// their relative (insertion) order.
fn sort_for_merge(events: &mut [PortUpdateEvent]) {
    events.sort_by(|a, b| match (a.version, b.version) {
        (Some(va), Some(vb)) => va.cmp(&vb).then(a.timestamp.cmp(&b.timestamp)),
        (None, None) => a.timestamp.cmp(&b.timestamp),
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (Some(_), None) => std::cmp::Ordering::Less,
    });
}

/// Merge a non-empty list of events for one `portKey` into one update.
pub fn merge_port_events(events: &[PortUpdateEvent]) -> MergedPortUpdate {
    let mut events = events.to_vec();
    sort_for_merge(&mut events);

    let mut acc = MergedPortUpdate::default();
    let mut highest_version: u64 = 0;
    let mut max_observed_version: Option<u64> = None;

    for event in &events {
        if let Some(v) = event.version {
            max_observed_version = Some(max_observed_version.map_or(v, |m| m.max(v)));
        }

        if let Some(value) = &event.changes.value {
            let may_write = event.version.map_or(true, |v| v >= highest_version);
            if may_write {
                acc.value = Some(value.clone());
                if let Some(v) = event.version {
                    highest_version = highest_version.max(v);
                }
            } else {
                tracing::debug!(
                    port_key = %event.port_key,
                    event_version = event.version,
                    highest_version,
                    "dropping stale value write during merge"
                );
            }
        }

        if let Some(ui) = &event.changes.ui {
            acc.ui = Some(merge_ui_states(acc.ui.as_ref().unwrap_or(&PortUiState::default()), ui));
        }

        if let Some(config) = &event.changes.config {
            let may_write = event.version.map_or(true, |v| v >= highest_version);
            if may_write {
                acc.config = Some(config.clone());
                if let Some(v) = event.version {
                    highest_version = highest_version.max(v);
                }
            } else {
                tracing::debug!(
                    port_key = %event.port_key,
                    event_version = event.version,
                    highest_version,
                    "dropping stale config write during merge"
                );
            }
        }

        if let Some(connections) = &event.changes.connections {
            let base = acc.connections.take().unwrap_or_default();
            acc.connections = Some(union_connections(&base, connections));
        }
    }

    acc.version = max_observed_version;
    acc
}
