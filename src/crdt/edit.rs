//! TreeEdit: replicated edit messages and their identity stamps
//!
//! Every mutation of the outline travels between replicas as a
//! `TreeEdit`. Each edit carries an [`EditId`] stamp combining the
//! sender's Lamport clock with its replica id:
//!
//! 1. **lamport**: logical timestamp (provides causal ordering)
//! 2. **replica**: sender identifier (tiebreaker for concurrent edits)
//!
//! The stamp serves two purposes: it is the idempotence key that lets
//! the tree ignore duplicate deliveries, and it is the total order that
//! last-writer-wins fields resolve against.

use crate::crdt::OrderKey;
use crate::{NodeId, ReplicaId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Identity stamp of a replicated edit
///
/// # Ordering
///
/// Stamps are ordered by:
/// 1. Lamport clock (earlier comes first)
/// 2. Replica id (lexicographic, for concurrent edits)
///
/// This ordering is what "last writer" means in every LWW field of the
/// tree; it must be identical on all replicas for them to converge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EditId {
    /// Lamport timestamp (logical clock)
    pub lamport: u64,

    /// Replica that issued the edit
    pub replica: ReplicaId,
}

impl EditId {
    /// Create a new edit stamp
    pub fn new(lamport: u64, replica: ReplicaId) -> Self {
        Self { lamport, replica }
    }
}

impl Ord for EditId {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.lamport.cmp(&other.lamport) {
            Ordering::Equal => self.replica.cmp(&other.replica),
            other => other,
        }
    }
}

impl PartialOrd for EditId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for EditId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.replica, self.lamport)
    }
}

/// What happens to a deleted node's children
///
/// The policy is carried inside the edit so that every replica applies
/// the same one; a transport may not assume replicas share configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChildPolicy {
    /// Delete the whole subtree
    Cascade,

    /// Splice children into the deleted node's position under its parent
    ReparentToGrandparent,
}

/// A replicated edit to the outline tree
///
/// Edits are commutative and idempotent under [`super::OrderedTree::apply`]:
/// the final tree does not depend on arrival order, and duplicate
/// delivery changes nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeEdit {
    /// Create a node with an initial position and text
    CreateNode {
        id: EditId,
        node: NodeId,
        parent: Option<NodeId>,
        order_key: OrderKey,
        text: String,
    },

    /// Reparent and/or reorder a node (parent and key move as a unit)
    SetParentAndOrder {
        id: EditId,
        node: NodeId,
        parent: Option<NodeId>,
        order_key: OrderKey,
    },

    /// Replace a node's text
    SetText {
        id: EditId,
        node: NodeId,
        text: String,
    },

    /// Turn a node into an alias of `target` (or clear with `None`)
    SetAliasTarget {
        id: EditId,
        node: NodeId,
        target: Option<NodeId>,
    },

    /// Remove a node, resolving its children per `policy`
    DeleteNode {
        id: EditId,
        node: NodeId,
        policy: ChildPolicy,
    },
}

impl TreeEdit {
    /// The edit's identity stamp
    pub fn id(&self) -> &EditId {
        match self {
            TreeEdit::CreateNode { id, .. }
            | TreeEdit::SetParentAndOrder { id, .. }
            | TreeEdit::SetText { id, .. }
            | TreeEdit::SetAliasTarget { id, .. }
            | TreeEdit::DeleteNode { id, .. } => id,
        }
    }

    /// The node this edit targets
    pub fn node(&self) -> &NodeId {
        match self {
            TreeEdit::CreateNode { node, .. }
            | TreeEdit::SetParentAndOrder { node, .. }
            | TreeEdit::SetText { node, .. }
            | TreeEdit::SetAliasTarget { node, .. }
            | TreeEdit::DeleteNode { node, .. } => node,
        }
    }
}
