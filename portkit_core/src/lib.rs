//! Pure data model for the granular reactive port-state engine.
//!
//! This crate has no I/O, no threads, and no logging side effects: it is
//! the `PortKey` codec, the `PortConfig` discriminated union, the update
//! event shape, and the collaborator traits the engine in `portkit_store`
//! consumes. See `SPEC_FULL.md` at the workspace root.

pub mod config;
pub mod connection;
pub mod error;
pub mod event;
pub mod key;
pub mod node;
pub mod ui;
pub mod util;

pub mod prelude {
    pub use crate::config::{
        extract_config_core, has_enum_options, has_underlying_type, is_mutable_array_port,
        is_mutable_object_port, is_system_error_port, is_system_port, unwrap_any_config,
        AnyPortConfigBody, ArrayPortConfigBody, ObjectPortConfigBody, ObjectSchema, PortConfig,
        PortConfigBody, PortDirection, PortIdentity, PortMetadata,
    };
    pub use crate::connection::{union_connections, Connection};
    pub use crate::error::PortError;
    pub use crate::event::{Changes, EventSource, PortUpdateEvent};
    pub use crate::key::{
        ancestor_port_ids, array_element_index, from_key, immediate_parent_port_id,
        is_child_port_id, to_key, PortKey,
    };
    pub use crate::node::{NodeSource, PortHandle};
    pub use crate::ui::{merge_ui_states, PortUiState, NESTED_MERGE_KEYS};
    pub use crate::util::deep_equal;
}
