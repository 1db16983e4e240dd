//! Multi-Cursor Sessions - Ephemeral per-user editing state
//!
//! Unlike the tree, which persists and replicates, cursors are
//! session-local state:
//! - Where each user's cursors sit (item + character offset)
//! - Which single cursor per session is active (receives keystrokes)
//! - A bounded history of recently-active cursors, used to pick a
//!   deterministic successor when the active cursor's item disappears
//!
//! Key differences from tree state:
//! - Never persisted or replicated to storage (in-memory only)
//! - Reconciled against the tree after every local or remote mutation
//! - One hard invariant at rest: at most one active cursor per session,
//!   and the history top names it

mod session;

pub use session::{Cursor, CursorRegistry, Selection, SessionPhase};

/// Session-scoped cursor identifier
pub type CursorId = u64;

/// Maximum retained cursor-history entries per session
pub const HISTORY_CAPACITY: usize = 32;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_creation() {
        let registry = CursorRegistry::new();
        assert!(registry.get_active_cursors().is_empty());
    }
}
