//! Echo / optimistic filter (spec §4.6): reconciles one incoming event
//! against current store state and outstanding pending mutations before it
//! ever reaches the batch processor.

use crate::ledger::PendingMutationLedger;
use crate::stores::GranularStores;
use portkit_core::prelude::*;

#[derive(Clone, Debug, PartialEq)]
pub struct ConfirmedMutation {
    pub port_key: PortKey,
    pub mutation_id: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterResult {
    pub filtered: Option<PortUpdateEvent>,
    pub confirmed: Vec<ConfirmedMutation>,
}

/// Filter one incoming event against `stores`/`ledger` (spec §4.6). When
/// `migration_enabled` is false the event is passed through untouched with
/// no confirmations, per the global bypass.
pub fn filter_echo(
    event: &PortUpdateEvent,
    stores: &GranularStores,
    ledger: &PendingMutationLedger,
    migration_enabled: bool,
) -> FilterResult {
    if !migration_enabled {
        return FilterResult { filtered: Some(event.clone()), confirmed: Vec::new() };
    }

    let mut working = event.clone();
    let mut confirmed = Vec::new();

    // Step 1: mutation match.
    if let (Some(value), Some(version)) = (working.changes.value.clone(), working.version) {
        let pending = ledger.pending_for(&working.port_key);
        if let Some(matched) = pending.iter().find(|m| m.version == version && deep_equal(&m.value, &value)) {
            confirmed.push(ConfirmedMutation {
                port_key: working.port_key.clone(),
                mutation_id: matched.mutation_id.clone(),
            });
            ledger.confirm(&working.port_key, &matched.mutation_id);
            working.changes.value = None;
        }
    }

    // Step 2: staleness. Only applies when the event still carries a
    // value+version pair (step 1 may have just stripped the value).
    if let (Some(_), Some(version)) = (working.changes.value.clone(), working.version) {
        if let Some(latest) = ledger.latest_version(&working.port_key) {
            if version < latest {
                tracing::debug!(port_key = %working.port_key, version, latest, "dropping stale echo");
                return FilterResult { filtered: None, confirmed };
            }
        }
    }

    // Step 3: diff against current state, field by field.
    if let Some(value) = &working.changes.value {
        if let Some(current) = stores.value(&working.port_key) {
            if deep_equal(&current, value) {
                working.changes.value = None;
            }
        }
    }
    if let Some(ui) = &working.changes.ui {
        let current = stores.ui(&working.port_key);
        let merged = merge_ui_states(&current, ui);
        if merged == current {
            working.changes.ui = None;
        }
    }
    if let Some(config) = &working.changes.config {
        if stores.config(&working.port_key).as_ref() == Some(config) {
            working.changes.config = None;
        }
    }
    if let Some(connections) = &working.changes.connections {
        let current = stores.connections(&working.port_key);
        if &current == connections {
            working.changes.connections = None;
        }
    }

    if working.changes.is_empty() {
        FilterResult { filtered: None, confirmed }
    } else {
        FilterResult { filtered: Some(working), confirmed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::PendingMutation;
    use serde_json::json;

    fn pending(port_key: &str, version: u64, value: serde_json::Value, mutation_id: &str) -> PendingMutation {
        PendingMutation {
            port_key: to_key("N", port_key),
            value,
            version,
            timestamp: 0,
            mutation_id: mutation_id.to_string(),
            client_id: "c1".to_string(),
        }
    }

    #[test]
    fn matching_mutation_is_confirmed_and_value_stripped() {
        let stores = GranularStores::new();
        let ledger = PendingMutationLedger::new();
        ledger.add(pending("p", 7, json!("X"), "m1"));

        let event = PortUpdateEvent::new("N", "p", 100, EventSource::Subscription)
            .with_value(json!("X"))
            .with_version(7);

        let result = filter_echo(&event, &stores, &ledger, true);
        assert_eq!(result.confirmed, vec![ConfirmedMutation { port_key: to_key("N", "p"), mutation_id: "m1".into() }]);
        assert!(result.filtered.is_none());
        assert!(!ledger.has_pending(&to_key("N", "p")));
    }

    #[test]
    fn stale_echo_under_pending_is_dropped() {
        let stores = GranularStores::new();
        let ledger = PendingMutationLedger::new();
        ledger.add(pending("p", 9, json!("Y"), "m1"));

        let event = PortUpdateEvent::new("N", "p", 100, EventSource::Subscription)
            .with_value(json!("Z"))
            .with_version(6);

        let result = filter_echo(&event, &stores, &ledger, true);
        assert!(result.filtered.is_none());
        assert!(result.confirmed.is_empty());
        assert!(ledger.has_pending(&to_key("N", "p")));
    }

    #[test]
    fn byte_for_byte_match_emits_nothing() {
        let stores = GranularStores::new();
        let ledger = PendingMutationLedger::new();
        let mut seed = crate::batch::ProcessedBatch::default();
        seed.value_updates.insert(to_key("N", "p"), json!("same"));
        stores.apply_batch(&seed);

        let event = PortUpdateEvent::new("N", "p", 100, EventSource::Subscription).with_value(json!("same"));
        let result = filter_echo(&event, &stores, &ledger, true);
        assert!(result.filtered.is_none());
    }

    #[test]
    fn disabled_migration_passes_event_through_unchanged() {
        let stores = GranularStores::new();
        let ledger = PendingMutationLedger::new();
        let event = PortUpdateEvent::new("N", "p", 100, EventSource::Subscription).with_value(json!("X"));
        let result = filter_echo(&event, &stores, &ledger, false);
        assert_eq!(result.filtered, Some(event));
        assert!(result.confirmed.is_empty());
    }

    #[test]
    fn only_changed_fields_survive_the_diff() {
        let stores = GranularStores::new();
        let ledger = PendingMutationLedger::new();
        let mut seed = crate::batch::ProcessedBatch::default();
        seed.value_updates.insert(to_key("N", "p"), json!("same"));
        stores.apply_batch(&seed);

        let event = PortUpdateEvent::new("N", "p", 100, EventSource::Subscription)
            .with_value(json!("same"))
            .with_connections(vec![Connection { node_id: "M".into(), port_id: "q".into() }]);

        let result = filter_echo(&event, &stores, &ledger, true);
        let filtered = result.filtered.expect("connections changed");
        assert!(filtered.changes.value.is_none());
        assert!(filtered.changes.connections.is_some());
    }
}
