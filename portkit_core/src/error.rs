//! Error taxonomy for the port-state engine (spec §7).
//!
//! Almost everything here is recovered from, not propagated: callers log
//! and continue. Only [`PortError::MalformedKey`] on a developer-supplied
//! key is expected to cross an API boundary as a real error.

/// Errors that can arise while decoding or walking [`crate::key::PortKey`]s
/// and the hierarchy they imply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    /// `fromKey` was called on a string with no `:` separator.
    #[error("malformed port key, expected \"nodeId:portId\": {0:?}")]
    MalformedKey(String),

    /// A hierarchy or value computation needed a config that isn't present.
    #[error("missing config for port key {0:?}")]
    MissingConfig(String),

    /// An array-element portId segment (`prefix[N]`) had a non-numeric index.
    #[error("invalid array index {index:?} on port {port:?}")]
    InvalidArrayIndex { port: String, index: String },

    /// Hierarchy traversal revisited an already-visited key.
    #[error("cycle detected in hierarchy at {0:?}")]
    CycleInHierarchy(String),
}
