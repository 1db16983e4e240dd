//! Structural operations on the outline tree
//!
//! Translates user-level intents (indent, outdent, move, alias, batch
//! gestures) into replicated edits, enforcing the tree invariants
//! before anything is emitted. Every operation validates locally - the
//! ancestor-walk cycle guard is a cheap precondition, not a distributed
//! check - and invalid intents resolve to a no-op outcome rather than
//! an error, since the UI pre-filters most of them anyway.
//!
//! Operations never mutate the tree directly: they return an
//! [`EditPlan`] whose edits the document applies locally and queues for
//! broadcast, the same optimistic local-first flow used for every other
//! replicated change.

use crate::crdt::{EditId, LamportClock, OrderKey, OrderedTree, TreeEdit};
use crate::crdt::edit::ChildPolicy;
use crate::NodeId;
use serde::{Deserialize, Serialize};

/// Result of a structural operation, reported back to the caller so
/// the UI can flash feedback; never raised as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StructuralOutcome {
    /// The operation was applied and edits were emitted
    Applied,

    /// The operation had nothing to do (first child indented, root
    /// outdented, missing anchor, self-drop)
    NoOp,

    /// The operation would have made a node its own ancestor
    WouldCycle,
}

impl StructuralOutcome {
    /// Whether edits were emitted
    pub fn applied(&self) -> bool {
        matches!(self, StructuralOutcome::Applied)
    }
}

/// Where a dragged node lands relative to the drop target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropEdge {
    /// Immediately before the target among its siblings
    Before,

    /// Immediately after the target among its siblings
    After,

    /// First child of the target
    FirstChild,

    /// Last child of the target
    LastChild,
}

/// A validated structural operation: outcome plus the edits to apply
/// and broadcast (empty unless `outcome` is `Applied`)
#[derive(Debug, Clone)]
pub struct EditPlan {
    pub outcome: StructuralOutcome,
    pub edits: Vec<TreeEdit>,
}

impl EditPlan {
    fn noop() -> Self {
        Self {
            outcome: StructuralOutcome::NoOp,
            edits: Vec::new(),
        }
    }

    fn would_cycle() -> Self {
        Self {
            outcome: StructuralOutcome::WouldCycle,
            edits: Vec::new(),
        }
    }

    fn applied(edits: Vec<TreeEdit>) -> Self {
        Self {
            outcome: StructuralOutcome::Applied,
            edits,
        }
    }
}

/// Structural operation engine
///
/// Borrows the tree read-only (plans are computed against a consistent
/// snapshot) and the replica's clock mutably (each emitted edit gets a
/// fresh stamp).
pub struct StructuralEngine<'a> {
    tree: &'a OrderedTree,
    replica: &'a str,
    clock: &'a mut LamportClock,
}

impl<'a> StructuralEngine<'a> {
    pub fn new(tree: &'a OrderedTree, replica: &'a str, clock: &'a mut LamportClock) -> Self {
        Self {
            tree,
            replica,
            clock,
        }
    }

    fn stamp(&mut self) -> EditId {
        EditId::new(self.clock.tick(), self.replica.to_string())
    }

    /// Key between two sibling positions (bounds given as node ids)
    fn key_at(&self, left: Option<&str>, right: Option<&str>) -> OrderKey {
        let left_key = left.and_then(|id| self.tree.node(id)).map(|n| &n.order_key);
        let right_key = right.and_then(|id| self.tree.node(id)).map(|n| &n.order_key);
        OrderKey::between(left_key, right_key, self.replica)
    }

    fn children(&self, parent: Option<&str>) -> Vec<NodeId> {
        match parent {
            Some(p) => self.tree.children(p),
            None => self.tree.root_items(),
        }
    }

    /// Position of `node` among its siblings, with the sibling list
    fn sibling_rank(&self, node: &str) -> Option<(Vec<NodeId>, usize)> {
        let parent = self.tree.node(node)?.parent.clone();
        let siblings = self.children(parent.as_deref());
        let rank = siblings.iter().position(|id| id == node)?;
        Some((siblings, rank))
    }

    /// Indent a node under its previous sibling
    ///
    /// The node becomes the last child of the sibling above it; with no
    /// previous sibling there is nothing to indent under. Depth +1.
    pub fn indent(&mut self, node: &str) -> EditPlan {
        let Some((siblings, rank)) = self.sibling_rank(node) else {
            return EditPlan::noop();
        };
        if rank == 0 {
            return EditPlan::noop();
        }
        let new_parent = siblings[rank - 1].clone();

        let last_child = self.tree.children(&new_parent).last().cloned();
        let key = self.key_at(last_child.as_deref(), None);
        let id = self.stamp();
        EditPlan::applied(vec![TreeEdit::SetParentAndOrder {
            id,
            node: node.to_string(),
            parent: Some(new_parent),
            order_key: key,
        }])
    }

    /// Outdent a node to its grandparent, placed just after its old
    /// parent. Depth -1; no-op for top-level items.
    ///
    /// `outdent(indent(n))` restores the original parent and sibling
    /// rank (the order key differs, the rank does not).
    pub fn outdent(&mut self, node: &str) -> EditPlan {
        let Some(n) = self.tree.node(node) else {
            return EditPlan::noop();
        };
        let Some(parent) = n.parent.clone() else {
            return EditPlan::noop();
        };

        let grandparent = self
            .tree
            .node(&parent)
            .and_then(|p| p.parent.clone());
        let Some((parent_siblings, parent_rank)) = self.sibling_rank(&parent) else {
            return EditPlan::noop();
        };
        let next = parent_siblings.get(parent_rank + 1).cloned();
        let key = self.key_at(Some(&parent), next.as_deref());
        let id = self.stamp();
        EditPlan::applied(vec![TreeEdit::SetParentAndOrder {
            id,
            node: node.to_string(),
            parent: grandparent,
            order_key: key,
        }])
    }

    /// Move a node relative to a drop target
    ///
    /// Self-drops and drops onto a descendant leave the tree untouched;
    /// callers pre-filter these but the engine re-validates regardless.
    pub fn move_node(&mut self, node: &str, target: &str, edge: DropEdge) -> EditPlan {
        if node == target {
            return EditPlan::noop();
        }
        if !self.tree.contains(node) || !self.tree.contains(target) {
            return EditPlan::noop();
        }
        if self.tree.is_ancestor(node, target) {
            return EditPlan::would_cycle();
        }

        let (parent, left, right) = match edge {
            DropEdge::Before | DropEdge::After => {
                let Some((siblings, rank)) = self.sibling_rank(target) else {
                    return EditPlan::noop();
                };
                let parent = self.tree.node(target).and_then(|t| t.parent.clone());
                // The moving node may already sit next to the target;
                // skip over it so the bounds are real neighbors.
                let neighbor = |i: Option<usize>| -> Option<NodeId> {
                    i.and_then(|i| siblings.get(i))
                        .filter(|id| id.as_str() != node)
                        .cloned()
                };
                match edge {
                    DropEdge::Before => (
                        parent,
                        neighbor(rank.checked_sub(1)),
                        Some(target.to_string()),
                    ),
                    _ => (
                        parent,
                        Some(target.to_string()),
                        neighbor(Some(rank + 1)),
                    ),
                }
            }
            DropEdge::FirstChild => {
                let first = self
                    .tree
                    .children(target)
                    .into_iter()
                    .find(|id| id != node);
                (Some(target.to_string()), None, first)
            }
            DropEdge::LastChild => {
                let last = self
                    .tree
                    .children(target)
                    .into_iter()
                    .filter(|id| id != node)
                    .next_back();
                (Some(target.to_string()), last, None)
            }
        };

        let key = self.key_at(left.as_deref(), right.as_deref());
        let id = self.stamp();
        EditPlan::applied(vec![TreeEdit::SetParentAndOrder {
            id,
            node: node.to_string(),
            parent,
            order_key: key,
        }])
    }

    /// Indent a contiguous multi-selection as one gesture
    ///
    /// Every member reparents under the previous sibling of the first
    /// member, so no member anchors on another member's already-updated
    /// position; all members end one level deeper in their original
    /// relative order.
    pub fn batch_indent(&mut self, nodes: &[NodeId]) -> EditPlan {
        let Some(ranks) = self.contiguous_ranks(nodes) else {
            return EditPlan::noop();
        };
        let (siblings, first_rank) = ranks;
        if first_rank == 0 {
            return EditPlan::noop();
        }
        let new_parent = siblings[first_rank - 1].clone();

        let mut edits = Vec::with_capacity(nodes.len());
        let mut left_key = self
            .tree
            .children(&new_parent)
            .last()
            .and_then(|id| self.tree.node(id).map(|n| n.order_key.clone()));
        for node in nodes {
            let key = OrderKey::between(left_key.as_ref(), None, self.replica);
            let id = self.stamp();
            edits.push(TreeEdit::SetParentAndOrder {
                id,
                node: node.clone(),
                parent: Some(new_parent.clone()),
                order_key: key.clone(),
            });
            left_key = Some(key);
        }
        EditPlan::applied(edits)
    }

    /// Outdent a contiguous multi-selection as one gesture
    ///
    /// Members land after their old parent among its siblings,
    /// preserving their relative order; anchors come from the pre-batch
    /// snapshot.
    pub fn batch_outdent(&mut self, nodes: &[NodeId]) -> EditPlan {
        if self.contiguous_ranks(nodes).is_none() {
            return EditPlan::noop();
        }
        let Some(parent) = self
            .tree
            .node(&nodes[0])
            .and_then(|n| n.parent.clone())
        else {
            return EditPlan::noop();
        };

        let grandparent = self.tree.node(&parent).and_then(|p| p.parent.clone());
        let Some((parent_siblings, parent_rank)) = self.sibling_rank(&parent) else {
            return EditPlan::noop();
        };
        let right_key = parent_siblings
            .get(parent_rank + 1)
            .and_then(|id| self.tree.node(id).map(|n| n.order_key.clone()));

        let mut edits = Vec::with_capacity(nodes.len());
        let mut left_key = self.tree.node(&parent).map(|p| p.order_key.clone());
        for node in nodes {
            let key = OrderKey::between(left_key.as_ref(), right_key.as_ref(), self.replica);
            let id = self.stamp();
            edits.push(TreeEdit::SetParentAndOrder {
                id,
                node: node.clone(),
                parent: grandparent.clone(),
                order_key: key.clone(),
            });
            left_key = Some(key);
        }
        EditPlan::applied(edits)
    }

    /// Turn `node` into an alias of `target`
    ///
    /// An alias pointing at itself or an ancestor would render a cyclic
    /// path, so the same guard as `move_node` applies.
    pub fn create_alias(&mut self, node: &str, target: &str) -> EditPlan {
        if !self.tree.contains(node) || !self.tree.contains(target) {
            return EditPlan::noop();
        }
        if node == target || self.tree.is_ancestor(target, node) {
            return EditPlan::would_cycle();
        }
        let id = self.stamp();
        EditPlan::applied(vec![TreeEdit::SetAliasTarget {
            id,
            node: node.to_string(),
            target: Some(target.to_string()),
        }])
    }

    /// Delete a node, resolving children per `policy`
    pub fn delete(&mut self, node: &str, policy: ChildPolicy) -> EditPlan {
        if !self.tree.contains(node) {
            return EditPlan::noop();
        }
        let id = self.stamp();
        EditPlan::applied(vec![TreeEdit::DeleteNode {
            id,
            node: node.to_string(),
            policy,
        }])
    }

    /// Validate that `nodes` are contiguous siblings in order; returns
    /// the sibling list and the first member's rank.
    fn contiguous_ranks(&self, nodes: &[NodeId]) -> Option<(Vec<NodeId>, usize)> {
        let first = nodes.first()?;
        let (siblings, first_rank) = self.sibling_rank(first)?;
        if first_rank + nodes.len() > siblings.len() {
            return None;
        }
        for (i, node) in nodes.iter().enumerate() {
            if siblings[first_rank + i] != *node {
                return None;
            }
        }
        Some((siblings, first_rank))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crdt::edit::ChildPolicy;

    struct Fixture {
        tree: OrderedTree,
        clock: LamportClock,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                tree: OrderedTree::new(),
                clock: LamportClock::new(),
            }
        }

        fn add(&mut self, node: &str, parent: Option<&str>) {
            let left = match parent {
                Some(p) => self.tree.children(p).last().cloned(),
                None => self.tree.root_items().last().cloned(),
            };
            let key = OrderKey::between(
                left.as_deref()
                    .and_then(|id| self.tree.node(id))
                    .map(|n| &n.order_key),
                None,
                "r1",
            );
            self.tree.apply(&TreeEdit::CreateNode {
                id: EditId::new(self.clock.tick(), "r1".to_string()),
                node: node.to_string(),
                parent: parent.map(|p| p.to_string()),
                order_key: key,
                text: node.to_string(),
            });
        }

        /// Run one operation and apply its edits
        fn run(&mut self, op: impl FnOnce(&mut StructuralEngine) -> EditPlan) -> StructuralOutcome {
            let plan = {
                let mut engine = StructuralEngine::new(&self.tree, "r1", &mut self.clock);
                op(&mut engine)
            };
            for edit in &plan.edits {
                self.tree.apply(edit);
            }
            plan.outcome
        }
    }

    /// Three top-level items a, b, c
    fn flat_fixture() -> Fixture {
        let mut f = Fixture::new();
        f.add("a", None);
        f.add("b", None);
        f.add("c", None);
        f
    }

    #[test]
    fn test_indent_under_previous_sibling() {
        let mut f = flat_fixture();
        let outcome = f.run(|e| e.indent("b"));

        assert!(outcome.applied());
        assert_eq!(f.tree.node("b").unwrap().parent.as_deref(), Some("a"));
        assert_eq!(f.tree.depth("b"), 1);
        assert_eq!(f.tree.root_items(), vec!["a", "c"]);
    }

    #[test]
    fn test_indent_first_child_is_noop() {
        let mut f = flat_fixture();
        let outcome = f.run(|e| e.indent("a"));

        assert_eq!(outcome, StructuralOutcome::NoOp);
        assert_eq!(f.tree.root_items(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_indent_appends_after_existing_children() {
        let mut f = flat_fixture();
        f.add("a1", Some("a"));
        f.run(|e| e.indent("b"));

        assert_eq!(f.tree.children("a"), vec!["a1", "b"]);
    }

    #[test]
    fn test_outdent_root_is_noop() {
        let mut f = flat_fixture();
        assert_eq!(f.run(|e| e.outdent("b")), StructuralOutcome::NoOp);
    }

    #[test]
    fn test_outdent_places_after_old_parent() {
        let mut f = flat_fixture();
        f.add("b1", Some("b"));
        f.add("b2", Some("b"));

        let outcome = f.run(|e| e.outdent("b1"));
        assert!(outcome.applied());
        assert_eq!(f.tree.root_items(), vec!["a", "b", "b1", "c"]);
        assert_eq!(f.tree.children("b"), vec!["b2"]);
    }

    #[test]
    fn test_indent_outdent_round_trip_restores_rank() {
        let mut f = flat_fixture();
        let before = f.tree.root_items();

        f.run(|e| e.indent("b"));
        f.run(|e| e.outdent("b"));

        assert_eq!(f.tree.root_items(), before);
        assert_eq!(f.tree.node("b").unwrap().parent, None);
    }

    #[test]
    fn test_move_self_drop_is_noop() {
        let mut f = flat_fixture();
        for edge in [
            DropEdge::Before,
            DropEdge::After,
            DropEdge::FirstChild,
            DropEdge::LastChild,
        ] {
            let outcome = f.run(|e| e.move_node("b", "b", edge));
            assert_eq!(outcome, StructuralOutcome::NoOp);
            assert_eq!(f.tree.root_items(), vec!["a", "b", "c"]);
        }
    }

    #[test]
    fn test_move_onto_descendant_is_cycle_guarded() {
        let mut f = flat_fixture();
        f.add("b1", Some("b"));
        f.add("b1x", Some("b1"));

        let snapshot = (f.tree.root_items(), f.tree.children("b"));
        let outcome = f.run(|e| e.move_node("b", "b1x", DropEdge::LastChild));

        assert_eq!(outcome, StructuralOutcome::WouldCycle);
        assert_eq!((f.tree.root_items(), f.tree.children("b")), snapshot);
    }

    #[test]
    fn test_move_after_reorders_roots() {
        let mut f = flat_fixture();
        let outcome = f.run(|e| e.move_node("b", "c", DropEdge::After));

        assert!(outcome.applied());
        assert_eq!(f.tree.root_items(), vec!["a", "c", "b"]);
    }

    #[test]
    fn test_move_before_adjacent_sibling() {
        let mut f = flat_fixture();
        f.run(|e| e.move_node("c", "b", DropEdge::Before));
        assert_eq!(f.tree.root_items(), vec!["a", "c", "b"]);
    }

    #[test]
    fn test_move_into_as_first_child() {
        let mut f = flat_fixture();
        f.add("a1", Some("a"));
        f.run(|e| e.move_node("c", "a", DropEdge::FirstChild));

        assert_eq!(f.tree.children("a"), vec!["c", "a1"]);
    }

    #[test]
    fn test_batch_indent_contiguous_siblings() {
        let mut f = flat_fixture();
        let outcome = f.run(|e| e.batch_indent(&["b".to_string(), "c".to_string()]));

        assert!(outcome.applied());
        assert_eq!(f.tree.depth("b"), 1);
        assert_eq!(f.tree.depth("c"), 1);
        assert_eq!(f.tree.children("a"), vec!["b", "c"]);
    }

    #[test]
    fn test_batch_indent_noncontiguous_is_noop() {
        let mut f = flat_fixture();
        let outcome = f.run(|e| e.batch_indent(&["a".to_string(), "c".to_string()]));
        assert_eq!(outcome, StructuralOutcome::NoOp);
    }

    #[test]
    fn test_batch_indent_without_anchor_is_noop() {
        let mut f = flat_fixture();
        let outcome = f.run(|e| e.batch_indent(&["a".to_string(), "b".to_string()]));
        assert_eq!(outcome, StructuralOutcome::NoOp);
    }

    #[test]
    fn test_batch_outdent_preserves_order() {
        let mut f = flat_fixture();
        f.add("b1", Some("b"));
        f.add("b2", Some("b"));
        f.add("b3", Some("b"));

        let outcome = f.run(|e| e.batch_outdent(&["b1".to_string(), "b2".to_string()]));
        assert!(outcome.applied());
        assert_eq!(f.tree.root_items(), vec!["a", "b", "b1", "b2", "c"]);
        assert_eq!(f.tree.children("b"), vec!["b3"]);
    }

    #[test]
    fn test_create_alias_and_guards() {
        let mut f = flat_fixture();
        f.add("b1", Some("b"));

        assert_eq!(
            f.run(|e| e.create_alias("b1", "b1")),
            StructuralOutcome::WouldCycle
        );
        assert_eq!(
            f.run(|e| e.create_alias("b1", "b")),
            StructuralOutcome::WouldCycle,
            "alias to own ancestor would render a cyclic path"
        );

        assert!(f.run(|e| e.create_alias("b1", "c")).applied());
        assert_eq!(f.tree.node("b1").unwrap().alias_target.as_deref(), Some("c"));
    }

    #[test]
    fn test_delete_missing_is_noop() {
        let mut f = flat_fixture();
        assert_eq!(
            f.run(|e| e.delete("ghost", ChildPolicy::Cascade)),
            StructuralOutcome::NoOp
        );
    }
}
