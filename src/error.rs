//! Error types for the outline engine
//!
//! Structural no-ops (cycle guards, missing anchors) are not errors:
//! they are reported through [`crate::engine::StructuralOutcome`] so the
//! UI can flash feedback without unwinding. `OutlineError` covers the
//! cases where a direct caller handed us something unusable.

use thiserror::Error;

/// Errors surfaced to direct callers of the public API
#[derive(Debug, Error)]
pub enum OutlineError {
    /// A caller referenced a node id that does not exist in the tree.
    ///
    /// Remote edits referencing unknown nodes are NOT surfaced this way;
    /// they are dropped with a logged warning per the replication
    /// failure semantics.
    #[error("unknown node: {0}")]
    UnknownNode(String),

    /// A transport payload could not be encoded or decoded
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Result type alias for outline operations
pub type Result<T> = std::result::Result<T, OutlineError>;
