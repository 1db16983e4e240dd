//! OutlineDoc: the public face of one replica's outline
//!
//! Owns the replicated tree, the replica's logical clock, the cursor
//! sessions, and the queue of edits awaiting broadcast. Every mutation
//! follows the same optimistic flow: build edits, apply them to the
//! local tree immediately, queue them for the transport, then
//! reconcile cursors against the new shape. Remote edits enter through
//! [`OutlineDoc::apply_remote`] and go through the identical
//! apply-then-reconcile path, so local and remote mutations cannot
//! drift apart in cursor handling.

use crate::crdt::edit::ChildPolicy;
use crate::crdt::{EditId, LamportClock, OrderKey, OrderedTree, TreeEdit};
use crate::cursor::{Cursor, CursorId, CursorRegistry, Selection, SessionPhase};
use crate::engine::{DropEdge, StructuralEngine, StructuralOutcome};
use crate::error::{OutlineError, Result};
use crate::format::{parse_spans, resolve_link, PageIndex, ProjectContext, ResolvedLink, Span};
use crate::{NodeId, ReplicaId};
use uuid::Uuid;

/// Where an inserted node lands among its new siblings
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertPosition {
    First,
    Last,
    Before(NodeId),
    After(NodeId),
}

/// What the UI should show for one item's text
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayText {
    /// An active cursor targets the item: show the raw text so
    /// delimiters stay editable as plain characters
    Raw(String),

    /// No active cursor: show the parsed span tree
    Rendered(Vec<Span>),
}

/// One replica's outline document
#[derive(Debug)]
pub struct OutlineDoc {
    replica: ReplicaId,
    tree: OrderedTree,
    clock: LamportClock,
    cursors: CursorRegistry,

    /// Locally-applied edits awaiting broadcast
    outbound: Vec<TreeEdit>,
}

impl OutlineDoc {
    /// Create an empty document for this replica
    pub fn new(replica: ReplicaId) -> Self {
        Self {
            replica,
            tree: OrderedTree::new(),
            clock: LamportClock::new(),
            cursors: CursorRegistry::new(),
            outbound: Vec::new(),
        }
    }

    /// Rebuild a document from a replicated tree snapshot
    pub fn from_tree(replica: ReplicaId, tree: OrderedTree) -> Self {
        let mut clock = LamportClock::new();
        if let Some(latest) = tree.latest_stamp_from(&replica) {
            clock.observe(latest);
        }
        Self {
            replica,
            tree,
            clock,
            cursors: CursorRegistry::new(),
            outbound: Vec::new(),
        }
    }

    pub fn replica(&self) -> &str {
        &self.replica
    }

    /// Read access to the replicated tree
    pub fn tree(&self) -> &OrderedTree {
        &self.tree
    }

    // ---- structural operations ------------------------------------

    /// Insert a new item and return its id
    pub fn insert(
        &mut self,
        parent: Option<&str>,
        position: InsertPosition,
        text: &str,
    ) -> Result<NodeId> {
        if let Some(p) = parent {
            if !self.tree.contains(p) {
                return Err(OutlineError::UnknownNode(p.to_string()));
            }
        }

        let siblings = match parent {
            Some(p) => self.tree.children(p),
            None => self.tree.root_items(),
        };
        let (left, right) = match &position {
            InsertPosition::First => (None, siblings.first().cloned()),
            InsertPosition::Last => (siblings.last().cloned(), None),
            InsertPosition::Before(anchor) => {
                let at = siblings
                    .iter()
                    .position(|id| id == anchor)
                    .ok_or_else(|| OutlineError::UnknownNode(anchor.clone()))?;
                (at.checked_sub(1).map(|i| siblings[i].clone()), Some(anchor.clone()))
            }
            InsertPosition::After(anchor) => {
                let at = siblings
                    .iter()
                    .position(|id| id == anchor)
                    .ok_or_else(|| OutlineError::UnknownNode(anchor.clone()))?;
                (Some(anchor.clone()), siblings.get(at + 1).cloned())
            }
        };

        let order_key = OrderKey::between(
            left.as_deref().and_then(|id| self.tree.node(id)).map(|n| &n.order_key),
            right.as_deref().and_then(|id| self.tree.node(id)).map(|n| &n.order_key),
            &self.replica,
        );
        let node = format!("{}:{}", self.replica, Uuid::new_v4());
        let edit = TreeEdit::CreateNode {
            id: EditId::new(self.clock.tick(), self.replica.clone()),
            node: node.clone(),
            parent: parent.map(str::to_string),
            order_key,
            text: text.to_string(),
        };
        self.commit(vec![edit]);
        Ok(node)
    }

    /// Replace an item's text
    pub fn set_text(&mut self, node: &str, text: &str) -> Result<()> {
        if !self.tree.contains(node) {
            return Err(OutlineError::UnknownNode(node.to_string()));
        }
        let edit = TreeEdit::SetText {
            id: EditId::new(self.clock.tick(), self.replica.clone()),
            node: node.to_string(),
            text: text.to_string(),
        };
        self.commit(vec![edit]);
        Ok(())
    }

    /// Indent an item under its previous sibling
    pub fn indent(&mut self, node: &str) -> StructuralOutcome {
        self.structural(|engine| engine.indent(node))
    }

    /// Outdent an item to its grandparent
    pub fn outdent(&mut self, node: &str) -> StructuralOutcome {
        self.structural(|engine| engine.outdent(node))
    }

    /// Indent a contiguous multi-selection
    pub fn batch_indent(&mut self, nodes: &[NodeId]) -> StructuralOutcome {
        self.structural(|engine| engine.batch_indent(nodes))
    }

    /// Outdent a contiguous multi-selection
    pub fn batch_outdent(&mut self, nodes: &[NodeId]) -> StructuralOutcome {
        self.structural(|engine| engine.batch_outdent(nodes))
    }

    /// Move an item relative to a drop target
    pub fn move_node(&mut self, node: &str, target: &str, edge: DropEdge) -> StructuralOutcome {
        self.structural(|engine| engine.move_node(node, target, edge))
    }

    /// Turn an item into an alias of another
    pub fn create_alias(&mut self, node: &str, target: &str) -> StructuralOutcome {
        self.structural(|engine| engine.create_alias(node, target))
    }

    /// Delete an item, resolving children per `policy`
    pub fn delete(&mut self, node: &str, policy: ChildPolicy) -> StructuralOutcome {
        self.structural(|engine| engine.delete(node, policy))
    }

    fn structural(
        &mut self,
        op: impl FnOnce(&mut StructuralEngine) -> crate::engine::EditPlan,
    ) -> StructuralOutcome {
        let plan = {
            let mut engine = StructuralEngine::new(&self.tree, &self.replica, &mut self.clock);
            op(&mut engine)
        };
        self.commit(plan.edits);
        plan.outcome
    }

    /// Apply locally, queue for broadcast, reconcile cursors
    fn commit(&mut self, edits: Vec<TreeEdit>) {
        for edit in &edits {
            self.tree.apply(edit);
        }
        self.outbound.extend(edits);
        self.cursors.reconcile(&self.tree);
    }

    // ---- session-driven operations --------------------------------

    /// Indent whatever the user's session currently targets (the
    /// history-top cursor's item), then settle the session's active
    /// cursor onto the moved item
    pub fn indent_active(&mut self, user: &str) -> StructuralOutcome {
        self.active_structural(user, |doc, node| doc.indent(&node))
    }

    /// Outdent the user session's current target
    pub fn outdent_active(&mut self, user: &str) -> StructuralOutcome {
        self.active_structural(user, |doc, node| doc.outdent(&node))
    }

    /// Drag-and-drop: move `node` and bind the user's single active
    /// cursor to it
    pub fn drag_node(
        &mut self,
        user: &str,
        node: &str,
        target: &str,
        edge: DropEdge,
    ) -> StructuralOutcome {
        let outcome = self.move_node(node, target, edge);
        if outcome.applied() {
            self.cursors.on_structural_move(user, node);
            self.cursors.reconcile(&self.tree);
        }
        outcome
    }

    fn active_structural(
        &mut self,
        user: &str,
        op: impl FnOnce(&mut Self, NodeId) -> StructuralOutcome,
    ) -> StructuralOutcome {
        let Some(node) = self.cursors.structural_target(user) else {
            return StructuralOutcome::NoOp;
        };
        let outcome = op(self, node.clone());
        if outcome.applied() {
            self.cursors.on_structural_move(user, &node);
            self.cursors.reconcile(&self.tree);
        }
        outcome
    }

    // ---- queries ---------------------------------------------------

    /// Ordered children of an item
    pub fn get_children(&self, node: &str) -> Vec<NodeId> {
        self.tree.children(node)
    }

    /// Ordered top-level items
    pub fn get_root_items(&self) -> Vec<NodeId> {
        self.tree.root_items()
    }

    /// Resolve a link token against the page index
    pub fn resolve_link(
        &self,
        token: &str,
        ctx: &ProjectContext,
        index: &dyn PageIndex,
    ) -> ResolvedLink {
        resolve_link(token, ctx, index)
    }

    /// What the UI shows for an item: raw text while an active cursor
    /// targets it, parsed spans otherwise
    pub fn display_text(&self, node: &str) -> Option<DisplayText> {
        let n = self.tree.node(node)?;
        if self.cursors.item_has_active_cursor(node) {
            Some(DisplayText::Raw(n.text.clone()))
        } else {
            Some(DisplayText::Rendered(parse_spans(&n.text)))
        }
    }

    // ---- cursor API ------------------------------------------------

    /// Place a user's cursor on an item
    pub fn set_cursor(&mut self, user: &str, item: &str, offset: usize) -> Result<CursorId> {
        if !self.tree.contains(item) {
            return Err(OutlineError::UnknownNode(item.to_string()));
        }
        Ok(self.cursors.set_cursor(user, item.to_string(), offset))
    }

    /// Append a cursor on the item below the user's active cursor
    pub fn add_cursor_below(&mut self, user: &str) -> Option<CursorId> {
        self.cursors.add_cursor_below(user, &self.tree)
    }

    /// Append a cursor on the item above the user's active cursor
    pub fn add_cursor_above(&mut self, user: &str) -> Option<CursorId> {
        self.cursors.add_cursor_above(user, &self.tree)
    }

    /// Discard the user's selections and extra cursors
    pub fn clear_selections(&mut self, user: &str) {
        self.cursors.clear_selections(user);
    }

    /// Set a user's selection
    pub fn set_selection(&mut self, user: &str, selection: Selection) {
        self.cursors.set_selection(user, selection);
    }

    /// The single active cursor of every user session
    pub fn get_active_cursors(&self) -> Vec<Cursor> {
        self.cursors.get_active_cursors()
    }

    /// A user session's phase
    pub fn session_phase(&self, user: &str) -> SessionPhase {
        self.cursors.phase(user)
    }

    // ---- replication seam ------------------------------------------

    /// Apply an edit delivered by the transport
    ///
    /// Tolerates duplicates and reordering; reconciles cursors so a
    /// concurrent remote delete drops any cursor it stranded.
    pub fn apply_remote(&mut self, edit: &TreeEdit) {
        self.clock.observe(edit.id().lamport);
        self.tree.apply(edit);
        self.cursors.reconcile(&self.tree);
    }

    /// Drain the locally-applied edits awaiting broadcast
    pub fn take_pending_edits(&mut self) -> Vec<TreeEdit> {
        std::mem::take(&mut self.outbound)
    }

    /// Fold in another replica's full tree state (snapshot transport)
    pub fn merge_tree(&mut self, other: &OrderedTree) {
        if let Some(latest) = other.latest_stamp_from(&self.replica) {
            self.clock.observe(latest);
        }
        self.tree.merge(other);
        self.cursors.reconcile(&self.tree);
    }
}
