//! OutlineKit Core - Collaborative ordered-tree outline engine
//!
//! This is the Rust core of OutlineKit, the replicated data structure
//! behind a real-time collaborative outline editor. It implements:
//! - An ordered tree CRDT (parent links + dense fractional order keys)
//! - Structural operations (indent/outdent, move, aliasing, batches)
//! - Multi-cursor sessions with single-active-cursor reconciliation
//! - Inline format parsing and link resolution for outline item text
//!
//! # Examples
//!
//! ```rust
//! use outlinekit_core::{OutlineDoc, InsertPosition};
//!
//! let mut doc = OutlineDoc::new("replica-1".to_string());
//! let a = doc.insert(None, InsertPosition::Last, "Item 1").unwrap();
//! let b = doc.insert(None, InsertPosition::After(a.clone()), "Item 2").unwrap();
//! assert_eq!(doc.get_root_items(), vec![a, b]);
//! ```

pub mod crdt;
pub mod cursor;
pub mod document;
pub mod engine;
pub mod error;
pub mod format;
pub mod protocol;

// Re-exports for convenience
pub use crdt::{ChildPolicy, EditId, LamportClock, OrderKey, OrderedTree, TreeEdit};
pub use cursor::{CursorId, CursorRegistry, SessionPhase};
pub use document::{InsertPosition, OutlineDoc};
pub use engine::{DropEdge, StructuralOutcome};
pub use error::{OutlineError, Result};
pub use format::{parse_spans, render_spans, resolve_link, PageIndex, Span};

/// Replica identifier type
pub type ReplicaId = String;

/// Node identifier type (replica-prefixed, immutable once assigned)
pub type NodeId = String;

/// User identifier type (owner of a cursor session)
pub type UserId = String;
