//! CRDT (Conflict-free Replicated Data Types) for the outline tree
//!
//! This module contains the replicated state of the outline: the node
//! arena, the edit messages exchanged between replicas, and the
//! primitives that make concurrent, out-of-order delivery converge.
//!
//! # Pieces
//!
//! - **LamportClock:** logical timestamps for last-writer-wins fields
//! - **OrderKey:** dense fractional key space for sibling ordering
//! - **TreeEdit / EditId:** replicated edit messages and their stamps
//! - **OrderedTree:** the convergent node store itself
//!
//! # References
//!
//! - "A comprehensive study of CRDTs" by Marc Shapiro et al.
//! - "Conflict-free Replicated Data Types" (INRIA Research Report 7687)
//! - "Logoot: A Scalable Optimistic Replication Algorithm for
//!   Collaborative Editing on P2P Networks" (Weiss et al., ICDCS 2009)
//! - "Moving Elements in List CRDTs" (Kleppmann, PaPoC 2020)

pub mod clock;
pub mod edit;
pub mod order_key;
pub mod tree;

pub use clock::LamportClock;
pub use edit::{ChildPolicy, EditId, TreeEdit};
pub use order_key::OrderKey;
pub use tree::{Node, OrderedTree};
