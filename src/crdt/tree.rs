//! OrderedTree: convergent parent/order state for all outline nodes
//!
//! The tree is an arena of nodes keyed by stable id. Parent links and
//! sibling order keys are replicated fields resolved last-writer-wins
//! by edit stamp; children are materialized by query, never stored as
//! raw indices. Applying the same edit twice changes nothing, and the
//! final state does not depend on the order edits arrive in.
//!
//! # Failure semantics
//!
//! An edit referencing a node this replica has never seen is dropped
//! with a logged warning. The replication transport guarantees
//! at-least-once delivery, not ordered delivery, so a `SetText` can
//! outrun its `CreateNode`; the stream stays usable either way. Two
//! reorderings get gentler treatment: a create whose parent has not
//! arrived yet stays in the arena as an invisible orphan (children are
//! materialized by query, so it surfaces once the parent lands), and
//! deletions leave a tombstone so a late-arriving `CreateNode` for an
//! already-deleted node is suppressed instead of resurrecting it.

use crate::crdt::edit::{ChildPolicy, EditId, TreeEdit};
use crate::crdt::OrderKey;
use crate::{NodeId, ReplicaId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// A single outline item
///
/// `parent == None` is the root sentinel: the node is a top-level item.
/// An alias node carries `alias_target`; its own children are empty by
/// convention and its displayed path is the target's ancestor chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Globally unique, immutable, replica-prefixed id
    pub id: NodeId,

    /// Item text (opaque mergeable string, LWW at this layer)
    pub text: String,

    /// Owning node, or `None` for top-level items
    pub parent: Option<NodeId>,

    /// Position among siblings
    pub order_key: OrderKey,

    /// Set when this node is an alias of another node
    pub alias_target: Option<NodeId>,

    /// Stamp of the write that last moved this node (parent + order key
    /// move as a unit)
    pub(crate) position_stamp: EditId,

    /// Stamp of the write that last set `text`
    pub(crate) text_stamp: EditId,

    /// Stamp of the write that last set `alias_target`
    pub(crate) alias_stamp: EditId,
}

/// Convergent store of all outline nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderedTree {
    nodes: HashMap<NodeId, Node>,

    /// Ids of deleted nodes; suppresses late-arriving creates
    tombstones: HashSet<NodeId>,
}

impl OrderedTree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            tombstones: HashSet::new(),
        }
    }

    /// Look up a node by id
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Whether the node currently exists (created and not deleted)
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree has no live nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ordered children of a node
    ///
    /// This is the single typed ordered-children accessor: every caller
    /// goes through it, and order is always `(order_key, id)` so the
    /// materialized list is identical on every replica.
    pub fn children(&self, parent: &str) -> Vec<NodeId> {
        self.children_of(Some(parent))
    }

    /// Ordered top-level items
    pub fn root_items(&self) -> Vec<NodeId> {
        self.children_of(None)
    }

    fn children_of(&self, parent: Option<&str>) -> Vec<NodeId> {
        let mut kids: Vec<&Node> = self
            .nodes
            .values()
            .filter(|n| n.parent.as_deref() == parent)
            .collect();
        kids.sort_by(|a, b| a.order_key.cmp(&b.order_key).then_with(|| a.id.cmp(&b.id)));
        kids.into_iter().map(|n| n.id.clone()).collect()
    }

    /// All live nodes in visual document order (depth-first, siblings
    /// by order key). This is the order cursor navigation walks.
    pub fn visual_order(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.root_items().into_iter().rev().collect();
        while let Some(id) = stack.pop() {
            for child in self.children(&id).into_iter().rev() {
                stack.push(child);
            }
            out.push(id);
        }
        out
    }

    /// Whether `ancestor` is a strict ancestor of `node`
    ///
    /// Bounded by tree depth; cycle-guarded against transiently
    /// malformed parent chains.
    pub fn is_ancestor(&self, ancestor: &str, node: &str) -> bool {
        let mut seen = 0usize;
        let mut current = self.nodes.get(node).and_then(|n| n.parent.as_deref());
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            seen += 1;
            if seen > self.nodes.len() {
                return false;
            }
            current = self.nodes.get(id).and_then(|n| n.parent.as_deref());
        }
        false
    }

    /// Number of ancestors between the node and the root
    pub fn depth(&self, node: &str) -> usize {
        self.ancestor_path(node).len()
    }

    /// Ancestor chain of a node, root-most first (excludes the node)
    pub fn ancestor_path(&self, node: &str) -> Vec<NodeId> {
        let mut path = Vec::new();
        let mut current = self.nodes.get(node).and_then(|n| n.parent.clone());
        while let Some(id) = current {
            if path.len() > self.nodes.len() {
                break;
            }
            current = self.nodes.get(&id).and_then(|n| n.parent.clone());
            path.push(id);
        }
        path.reverse();
        path
    }

    /// Displayed path of an alias node: the target's ancestor chain
    /// plus the target itself, or `None` if the node is not an alias or
    /// the target is gone.
    pub fn alias_path(&self, node: &str) -> Option<Vec<NodeId>> {
        let target = self.nodes.get(node)?.alias_target.as_deref()?;
        if !self.contains(target) {
            return None;
        }
        let mut path = self.ancestor_path(target);
        path.push(target.to_string());
        Some(path)
    }

    /// Apply a replicated edit
    ///
    /// Idempotent and commutative: duplicates and reordered deliveries
    /// converge to the same state. Returns `true` if the edit changed
    /// the tree, `false` if it was a duplicate, a stale write, or was
    /// dropped as malformed.
    pub fn apply(&mut self, edit: &TreeEdit) -> bool {
        match edit {
            TreeEdit::CreateNode {
                id,
                node,
                parent,
                order_key,
                text,
            } => {
                if self.tombstones.contains(node) {
                    debug!(node = %node, "ignoring create for deleted node");
                    return false;
                }
                if self.nodes.contains_key(node) {
                    return false;
                }
                // A parent this replica has not seen yet is not an
                // error: the node stays an invisible orphan until the
                // parent's own create arrives, since children are
                // materialized by query.
                if let Some(p) = parent {
                    if !self.nodes.contains_key(p) {
                        debug!(node = %node, parent = %p, "creating orphan under unseen parent");
                    }
                }
                self.nodes.insert(
                    node.clone(),
                    Node {
                        id: node.clone(),
                        text: text.clone(),
                        parent: parent.clone(),
                        order_key: order_key.clone(),
                        alias_target: None,
                        position_stamp: id.clone(),
                        text_stamp: id.clone(),
                        alias_stamp: id.clone(),
                    },
                );
                true
            }

            TreeEdit::SetParentAndOrder {
                id,
                node,
                parent,
                order_key,
            } => {
                if let Some(p) = parent {
                    if !self.nodes.contains_key(p) {
                        warn!(edit = %id, node = %node, parent = %p, "dropping move to unknown parent");
                        return false;
                    }
                }
                let Some(n) = self.nodes.get_mut(node) else {
                    self.warn_unknown(id, node, "move");
                    return false;
                };
                if n.position_stamp >= *id {
                    debug!(edit = %id, node = %node, "stale move lost to {}", n.position_stamp);
                    return false;
                }
                n.parent = parent.clone();
                n.order_key = order_key.clone();
                n.position_stamp = id.clone();
                true
            }

            TreeEdit::SetText { id, node, text } => {
                let Some(n) = self.nodes.get_mut(node) else {
                    self.warn_unknown(id, node, "text");
                    return false;
                };
                if n.text_stamp >= *id {
                    return false;
                }
                n.text = text.clone();
                n.text_stamp = id.clone();
                true
            }

            TreeEdit::SetAliasTarget { id, node, target } => {
                let Some(n) = self.nodes.get_mut(node) else {
                    self.warn_unknown(id, node, "alias");
                    return false;
                };
                if n.alias_stamp >= *id {
                    return false;
                }
                n.alias_target = target.clone();
                n.alias_stamp = id.clone();
                true
            }

            TreeEdit::DeleteNode { id, node, policy } => {
                if self.tombstones.contains(node) {
                    return false;
                }
                if !self.nodes.contains_key(node) {
                    // Delete arrived before the create; tombstone it so
                    // the late create is suppressed.
                    debug!(edit = %id, node = %node, "tombstoning unseen node");
                    self.tombstones.insert(node.clone());
                    return true;
                }
                self.delete_resolved(id, node, *policy);
                true
            }
        }
    }

    fn delete_resolved(&mut self, id: &EditId, node: &str, policy: ChildPolicy) {
        let Some(removed) = self.nodes.remove(node) else {
            return;
        };
        self.tombstones.insert(node.to_string());

        match policy {
            ChildPolicy::Cascade => {
                for child in self.children_raw(node) {
                    self.delete_resolved(id, &child, policy);
                }
            }
            ChildPolicy::ReparentToGrandparent => {
                for child in self.children_raw(node) {
                    let Some(c) = self.nodes.get_mut(&child) else {
                        continue;
                    };
                    // A move stamped after the delete wins; otherwise
                    // splice the child up, keeping its order key so
                    // sibling order among spliced children survives.
                    if c.position_stamp < *id {
                        c.parent = removed.parent.clone();
                        c.position_stamp = id.clone();
                    }
                }
            }
        }
    }

    /// Unordered child ids (internal: avoids sorting during deletes)
    fn children_raw(&self, parent: &str) -> Vec<NodeId> {
        self.nodes
            .values()
            .filter(|n| n.parent.as_deref() == Some(parent))
            .map(|n| n.id.clone())
            .collect()
    }

    fn warn_unknown(&self, id: &EditId, node: &str, what: &str) {
        warn!(edit = %id, node = %node, "dropping {what} edit for unknown node");
    }

    /// Merge another replica's full state into this one
    ///
    /// Field-wise last-writer-wins over the node tables plus a union of
    /// tombstones. Commutative, associative, and idempotent; used by
    /// snapshot-shipping transports and by convergence tests.
    pub fn merge(&mut self, other: &OrderedTree) {
        for dead in &other.tombstones {
            if self.tombstones.insert(dead.clone()) {
                self.nodes.remove(dead);
            }
        }

        for (id, theirs) in &other.nodes {
            if self.tombstones.contains(id) {
                continue;
            }
            match self.nodes.get_mut(id) {
                None => {
                    self.nodes.insert(id.clone(), theirs.clone());
                }
                Some(ours) => {
                    if theirs.position_stamp > ours.position_stamp {
                        ours.parent = theirs.parent.clone();
                        ours.order_key = theirs.order_key.clone();
                        ours.position_stamp = theirs.position_stamp.clone();
                    }
                    if theirs.text_stamp > ours.text_stamp {
                        ours.text = theirs.text.clone();
                        ours.text_stamp = theirs.text_stamp.clone();
                    }
                    if theirs.alias_stamp > ours.alias_stamp {
                        ours.alias_target = theirs.alias_target.clone();
                        ours.alias_stamp = theirs.alias_stamp.clone();
                    }
                }
            }
        }
    }

    /// Highest edit stamp ever applied by `replica`, if any (used to
    /// seed clocks when reloading a snapshot)
    pub fn latest_stamp_from(&self, replica: &ReplicaId) -> Option<u64> {
        self.nodes
            .values()
            .flat_map(|n| [&n.position_stamp, &n.text_stamp, &n.alias_stamp])
            .filter(|s| &s.replica == replica)
            .map(|s| s.lamport)
            .max()
    }
}

impl Default for OrderedTree {
    fn default() -> Self {
        Self::new()
    }
}
