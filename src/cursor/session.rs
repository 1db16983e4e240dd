//! Per-user cursor sessions and post-mutation reconciliation
//!
//! Each user session is an explicit cursor table plus a history stack,
//! so the reconciliation rules are testable without any rendering
//! layer. State machine per session: `Idle` (no cursor), `Single`
//! (exactly one), `Multi` (several, at most one active). Structural
//! operations started from `Multi` act on the history-top cursor's
//! item; reconciliation afterwards guarantees exactly one active
//! cursor bound to the item that moved.

use super::{CursorId, HISTORY_CAPACITY};
use crate::crdt::OrderedTree;
use crate::{NodeId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single cursor within a user session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Session-scoped identifier
    pub id: CursorId,

    /// The outline item this cursor targets
    pub item: NodeId,

    /// Character position within the item's text
    pub offset: usize,

    /// Whether this cursor receives keyboard input
    pub is_active: bool,

    /// Owning user
    pub user: UserId,
}

/// A text selection spanning one or more items
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub start_item: NodeId,
    pub start_offset: usize,
    pub end_item: NodeId,
    pub end_offset: usize,

    /// True when the focus end precedes the anchor end
    pub reversed: bool,
}

/// Session state, per user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    /// No cursor
    Idle,

    /// Exactly one cursor
    Single,

    /// Two or more cursors, at most one active
    Multi,
}

/// One user's cursor set
#[derive(Debug, Clone, Default)]
struct UserSession {
    cursors: Vec<Cursor>,

    /// Recently-active cursor ids, most recent last
    history: Vec<CursorId>,

    selection: Option<Selection>,

    next_cursor_id: CursorId,
}

impl UserSession {
    fn phase(&self) -> SessionPhase {
        match self.cursors.len() {
            0 => SessionPhase::Idle,
            1 => SessionPhase::Single,
            _ => SessionPhase::Multi,
        }
    }

    fn active(&self) -> Option<&Cursor> {
        self.cursors.iter().find(|c| c.is_active)
    }

    fn cursor_mut(&mut self, id: CursorId) -> Option<&mut Cursor> {
        self.cursors.iter_mut().find(|c| c.id == id)
    }

    fn push_history(&mut self, id: CursorId) {
        self.history.retain(|h| *h != id);
        self.history.push(id);
        if self.history.len() > HISTORY_CAPACITY {
            self.history.remove(0);
        }
    }

    /// Make exactly `id` active and move it to the history top
    fn activate(&mut self, id: CursorId) {
        for c in &mut self.cursors {
            c.is_active = c.id == id;
        }
        self.push_history(id);
    }

    /// Invariants checked after every transition: at most one active
    /// cursor, and the history top names the active one when a cursor
    /// exists.
    fn assert_at_rest(&self) {
        debug_assert!(self.cursors.iter().filter(|c| c.is_active).count() <= 1);
        if let Some(active) = self.active() {
            debug_assert_eq!(self.history.last(), Some(&active.id));
        }
    }
}

/// Cursor table for all user sessions
#[derive(Debug, Default)]
pub struct CursorRegistry {
    sessions: HashMap<UserId, UserSession>,
}

impl CursorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
        }
    }

    /// Session phase for a user
    pub fn phase(&self, user: &str) -> SessionPhase {
        self.sessions
            .get(user)
            .map(|s| s.phase())
            .unwrap_or(SessionPhase::Idle)
    }

    /// All cursors of a user session
    pub fn cursors(&self, user: &str) -> Vec<Cursor> {
        self.sessions
            .get(user)
            .map(|s| s.cursors.clone())
            .unwrap_or_default()
    }

    /// The single active cursor of each session, across all users
    pub fn get_active_cursors(&self) -> Vec<Cursor> {
        let mut active: Vec<Cursor> = self
            .sessions
            .values()
            .filter_map(|s| s.active().cloned())
            .collect();
        active.sort_by(|a, b| a.user.cmp(&b.user));
        active
    }

    /// Whether any session's active cursor targets `item` (drives the
    /// raw-text rendering policy for that item)
    pub fn item_has_active_cursor(&self, item: &str) -> bool {
        self.sessions
            .values()
            .filter_map(|s| s.active())
            .any(|c| c.item == item)
    }

    /// Place a user's cursor, collapsing the session to `Single`
    pub fn set_cursor(&mut self, user: &str, item: NodeId, offset: usize) -> CursorId {
        let session = self.sessions.entry(user.to_string()).or_default();
        let id = session.next_cursor_id;
        session.next_cursor_id += 1;

        session.cursors = vec![Cursor {
            id,
            item,
            offset,
            is_active: true,
            user: user.to_string(),
        }];
        session.history.clear();
        session.push_history(id);
        session.selection = None;
        session.assert_at_rest();
        id
    }

    /// Append a cursor on the item below the active one (in visual
    /// document order). The new cursor becomes active, the previous one
    /// is retained inactive, and the session enters `Multi`.
    pub fn add_cursor_below(&mut self, user: &str, tree: &OrderedTree) -> Option<CursorId> {
        self.add_adjacent_cursor(user, tree, 1)
    }

    /// Append a cursor on the item above the active one
    pub fn add_cursor_above(&mut self, user: &str, tree: &OrderedTree) -> Option<CursorId> {
        self.add_adjacent_cursor(user, tree, -1)
    }

    fn add_adjacent_cursor(
        &mut self,
        user: &str,
        tree: &OrderedTree,
        direction: isize,
    ) -> Option<CursorId> {
        let session = self.sessions.get_mut(user)?;
        let anchor = session.active()?.item.clone();

        let order = tree.visual_order();
        let at = order.iter().position(|id| *id == anchor)?;
        let adjacent = at.checked_add_signed(direction)?;
        let item = order.get(adjacent)?.clone();

        let id = session.next_cursor_id;
        session.next_cursor_id += 1;
        session.cursors.push(Cursor {
            id,
            item,
            offset: 0,
            is_active: false,
            user: user.to_string(),
        });
        session.activate(id);
        session.assert_at_rest();
        Some(id)
    }

    /// The item structural operations act on for this user: the
    /// history-top (most recently added) cursor's item
    pub fn structural_target(&self, user: &str) -> Option<NodeId> {
        let session = self.sessions.get(user)?;
        session
            .history
            .iter()
            .rev()
            .find_map(|id| session.cursors.iter().find(|c| c.id == *id))
            .map(|c| c.item.clone())
    }

    /// Settle a session after a structural operation moved `item`
    ///
    /// Exactly one cursor ends up active, bound to the moved item. A
    /// cursor already on the item is promoted; otherwise the active
    /// cursor is retargeted (or one is created from `Idle`). The
    /// session may stay `Multi`; only the active count collapses.
    pub fn on_structural_move(&mut self, user: &str, item: &str) {
        let session = self.sessions.entry(user.to_string()).or_default();

        if let Some(existing) = session.cursors.iter().find(|c| c.item == item) {
            let id = existing.id;
            session.activate(id);
        } else if let Some(active_id) = session.active().map(|c| c.id) {
            if let Some(cursor) = session.cursor_mut(active_id) {
                cursor.item = item.to_string();
            }
            session.activate(active_id);
        } else {
            let id = session.next_cursor_id;
            session.next_cursor_id += 1;
            session.cursors.push(Cursor {
                id,
                item: item.to_string(),
                offset: 0,
                is_active: false,
                user: user.to_string(),
            });
            session.activate(id);
        }
        session.assert_at_rest();
    }

    /// Discard selections and extra cursors, returning the session to
    /// `Single` (or `Idle` if nothing was active)
    pub fn clear_selections(&mut self, user: &str) {
        if let Some(session) = self.sessions.get_mut(user) {
            session.selection = None;
            session.cursors.retain(|c| c.is_active);
            session.history.clear();
            if let Some(active) = session.cursors.first() {
                let id = active.id;
                session.push_history(id);
            }
            session.assert_at_rest();
        }
    }

    /// Set a user's selection (anchors are validated on reconcile)
    pub fn set_selection(&mut self, user: &str, selection: Selection) {
        self.sessions
            .entry(user.to_string())
            .or_default()
            .selection = Some(selection);
    }

    /// A user's current selection
    pub fn selection(&self, user: &str) -> Option<Selection> {
        self.sessions.get(user).and_then(|s| s.selection.clone())
    }

    /// Reconcile every session against the tree after a mutation
    ///
    /// Cursors whose item was deleted are dropped, not resurrected. If
    /// the active cursor died, activity transfers to the most recent
    /// history entry that still resolves to a live item, else the
    /// session goes `Idle`. Selections with a dead anchor are
    /// discarded.
    pub fn reconcile(&mut self, tree: &OrderedTree) {
        for session in self.sessions.values_mut() {
            let had_active = session.active().map(|c| c.id);

            session.cursors.retain(|c| tree.contains(&c.item));
            let live: Vec<CursorId> = session.cursors.iter().map(|c| c.id).collect();
            session.history.retain(|id| live.contains(id));

            if let Some(sel) = &session.selection {
                if !tree.contains(&sel.start_item) || !tree.contains(&sel.end_item) {
                    session.selection = None;
                }
            }

            let active_alive = had_active
                .map(|id| session.cursors.iter().any(|c| c.id == id))
                .unwrap_or(false);
            if !active_alive {
                // Fall back down the history stack
                if let Some(successor) = session.history.last().copied() {
                    session.activate(successor);
                } else {
                    for c in &mut session.cursors {
                        c.is_active = false;
                    }
                }
            }
            session.assert_at_rest();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crdt::edit::{ChildPolicy, EditId, TreeEdit};
    use crate::crdt::OrderKey;

    fn tree_with_items(items: &[&str]) -> OrderedTree {
        let mut tree = OrderedTree::new();
        let mut left: Option<OrderKey> = None;
        for (i, item) in items.iter().enumerate() {
            let key = OrderKey::between(left.as_ref(), None, "r1");
            tree.apply(&TreeEdit::CreateNode {
                id: EditId::new(i as u64 + 1, "r1".to_string()),
                node: item.to_string(),
                parent: None,
                order_key: key.clone(),
                text: item.to_string(),
            });
            left = Some(key);
        }
        tree
    }

    fn active_count(registry: &CursorRegistry, user: &str) -> usize {
        registry
            .cursors(user)
            .iter()
            .filter(|c| c.is_active)
            .count()
    }

    #[test]
    fn test_set_cursor_enters_single() {
        let mut registry = CursorRegistry::new();
        let id = registry.set_cursor("alice", "a".to_string(), 3);

        assert_eq!(registry.phase("alice"), SessionPhase::Single);
        let cursors = registry.cursors("alice");
        assert_eq!(cursors.len(), 1);
        assert_eq!(cursors[0].id, id);
        assert!(cursors[0].is_active);
        assert_eq!(cursors[0].offset, 3);
    }

    #[test]
    fn test_add_cursor_below_enters_multi() {
        let tree = tree_with_items(&["a", "b", "c"]);
        let mut registry = CursorRegistry::new();
        registry.set_cursor("alice", "a".to_string(), 0);

        let added = registry.add_cursor_below("alice", &tree);
        assert!(added.is_some());
        assert_eq!(registry.phase("alice"), SessionPhase::Multi);

        // New cursor is active and on "b"; old cursor retained inactive
        let cursors = registry.cursors("alice");
        assert_eq!(cursors.len(), 2);
        assert_eq!(active_count(&registry, "alice"), 1);
        let active = registry.get_active_cursors();
        assert_eq!(active[0].item, "b");
    }

    #[test]
    fn test_add_cursor_above() {
        let tree = tree_with_items(&["a", "b", "c"]);
        let mut registry = CursorRegistry::new();
        registry.set_cursor("alice", "b".to_string(), 0);

        registry.add_cursor_above("alice", &tree);
        assert_eq!(registry.get_active_cursors()[0].item, "a");
    }

    #[test]
    fn test_add_cursor_at_document_edge_is_noop() {
        let tree = tree_with_items(&["a", "b"]);
        let mut registry = CursorRegistry::new();
        registry.set_cursor("alice", "b".to_string(), 0);

        assert!(registry.add_cursor_below("alice", &tree).is_none());
        assert_eq!(registry.phase("alice"), SessionPhase::Single);
    }

    #[test]
    fn test_structural_target_is_history_top() {
        let tree = tree_with_items(&["a", "b", "c"]);
        let mut registry = CursorRegistry::new();
        registry.set_cursor("alice", "a".to_string(), 0);
        registry.add_cursor_below("alice", &tree);
        registry.add_cursor_below("alice", &tree);

        // Last-added cursor sits on "c"
        assert_eq!(registry.structural_target("alice").as_deref(), Some("c"));
    }

    #[test]
    fn test_structural_move_settles_one_active() {
        let tree = tree_with_items(&["a", "b", "c"]);
        let mut registry = CursorRegistry::new();
        registry.set_cursor("alice", "a".to_string(), 0);
        registry.add_cursor_below("alice", &tree);

        registry.on_structural_move("alice", "b");

        assert_eq!(active_count(&registry, "alice"), 1);
        assert_eq!(registry.get_active_cursors()[0].item, "b");
        // Session may remain Multi; only the active count collapses
        assert_eq!(registry.phase("alice"), SessionPhase::Multi);
    }

    #[test]
    fn test_drag_of_uncursored_item_rebinds_active() {
        let mut registry = CursorRegistry::new();
        registry.set_cursor("alice", "a".to_string(), 0);

        // Drag-and-drop of "c", which has no cursor
        registry.on_structural_move("alice", "c");

        assert_eq!(active_count(&registry, "alice"), 1);
        assert_eq!(registry.get_active_cursors()[0].item, "c");
    }

    #[test]
    fn test_clear_selections_returns_to_single() {
        let tree = tree_with_items(&["a", "b", "c"]);
        let mut registry = CursorRegistry::new();
        registry.set_cursor("alice", "a".to_string(), 0);
        registry.add_cursor_below("alice", &tree);
        registry.set_selection(
            "alice",
            Selection {
                start_item: "a".to_string(),
                start_offset: 0,
                end_item: "b".to_string(),
                end_offset: 1,
                reversed: false,
            },
        );

        registry.clear_selections("alice");

        assert_eq!(registry.phase("alice"), SessionPhase::Single);
        assert!(registry.selection("alice").is_none());
        assert_eq!(active_count(&registry, "alice"), 1);
    }

    #[test]
    fn test_deleted_item_drops_cursor_and_falls_back() {
        let mut tree = tree_with_items(&["a", "b", "c"]);
        let mut registry = CursorRegistry::new();
        registry.set_cursor("alice", "a".to_string(), 0);
        registry.add_cursor_below("alice", &tree); // active on "b"

        // Another replica deletes "b" concurrently
        tree.apply(&TreeEdit::DeleteNode {
            id: EditId::new(99, "r2".to_string()),
            node: "b".to_string(),
            policy: ChildPolicy::Cascade,
        });
        registry.reconcile(&tree);

        // The dead cursor is dropped, activity falls back to "a"
        let cursors = registry.cursors("alice");
        assert_eq!(cursors.len(), 1);
        assert_eq!(cursors[0].item, "a");
        assert!(cursors[0].is_active);
        assert_eq!(registry.phase("alice"), SessionPhase::Single);
    }

    #[test]
    fn test_all_items_deleted_goes_idle() {
        let mut tree = tree_with_items(&["a"]);
        let mut registry = CursorRegistry::new();
        registry.set_cursor("alice", "a".to_string(), 0);

        tree.apply(&TreeEdit::DeleteNode {
            id: EditId::new(99, "r2".to_string()),
            node: "a".to_string(),
            policy: ChildPolicy::Cascade,
        });
        registry.reconcile(&tree);

        assert_eq!(registry.phase("alice"), SessionPhase::Idle);
        assert!(registry.get_active_cursors().is_empty());
    }

    #[test]
    fn test_selection_with_dead_anchor_is_discarded() {
        let mut tree = tree_with_items(&["a", "b"]);
        let mut registry = CursorRegistry::new();
        registry.set_cursor("alice", "a".to_string(), 0);
        registry.set_selection(
            "alice",
            Selection {
                start_item: "a".to_string(),
                start_offset: 0,
                end_item: "b".to_string(),
                end_offset: 2,
                reversed: true,
            },
        );

        tree.apply(&TreeEdit::DeleteNode {
            id: EditId::new(99, "r2".to_string()),
            node: "b".to_string(),
            policy: ChildPolicy::Cascade,
        });
        registry.reconcile(&tree);

        assert!(registry.selection("alice").is_none());
    }

    #[test]
    fn test_sessions_are_independent_per_user() {
        let tree = tree_with_items(&["a", "b", "c"]);
        let mut registry = CursorRegistry::new();
        registry.set_cursor("alice", "a".to_string(), 0);
        registry.set_cursor("bob", "c".to_string(), 1);
        registry.add_cursor_below("alice", &tree);

        let active = registry.get_active_cursors();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].user, "alice");
        assert_eq!(active[0].item, "b");
        assert_eq!(active[1].user, "bob");
        assert_eq!(active[1].item, "c");
    }

    #[test]
    fn test_history_is_bounded() {
        let items: Vec<String> = (0..40).map(|i| format!("n{i:02}")).collect();
        let refs: Vec<&str> = items.iter().map(|s| s.as_str()).collect();
        let tree = tree_with_items(&refs);

        let mut registry = CursorRegistry::new();
        registry.set_cursor("alice", "n00".to_string(), 0);
        for _ in 0..39 {
            registry.add_cursor_below("alice", &tree);
        }

        let session_history: Vec<_> = registry.cursors("alice");
        assert_eq!(session_history.len(), 40);
        // History capacity bounds fallback depth, not cursor count
        assert!(super::HISTORY_CAPACITY < 40);
    }
}
