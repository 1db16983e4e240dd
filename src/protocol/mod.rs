//! Edit codec for the replication transport
//!
//! The transport is an external collaborator: it delivers and
//! broadcasts edit messages with at-least-once, possibly-out-of-order
//! semantics. This module owns the wire shape - a small JSON envelope
//! around [`TreeEdit`] - so the rest of the engine never sees encoding
//! concerns. Decode failures map to [`OutlineError::Protocol`]; the
//! idempotent tree apply handles everything the transport throws at us
//! after that.

use crate::crdt::TreeEdit;
use crate::error::{OutlineError, Result};
use serde::{Deserialize, Serialize};

/// Envelope for an edit in flight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditMessage {
    /// Document the edit belongs to
    pub doc_id: String,

    pub edit: TreeEdit,
}

/// Serialize an edit message to bytes
pub fn encode_edit(msg: &EditMessage) -> Result<Vec<u8>> {
    serde_json::to_vec(msg)
        .map_err(|e| OutlineError::Protocol(format!("failed to encode edit: {}", e)))
}

/// Deserialize an edit message from bytes
pub fn decode_edit(bytes: &[u8]) -> Result<EditMessage> {
    serde_json::from_slice(bytes)
        .map_err(|e| OutlineError::Protocol(format!("failed to decode edit: {}", e)))
}
