//! Lamport clock for last-writer-wins conflict resolution
//!
//! Lamport clocks provide a "happens-before" partial ordering of events
//! in a distributed system. Each replica maintains its own clock,
//! increments it before every local edit, and folds in the timestamp of
//! every remote edit it applies. Combined with the replica id as a
//! tiebreaker (see [`crate::crdt::EditId`]) this yields the total order
//! that last-writer-wins fields resolve against.

use serde::{Deserialize, Serialize};

/// Monotonically increasing logical clock
///
/// # Properties
///
/// - Never decreases: `tick` and `observe` only move forward
/// - Always > 0 after the first tick (0 is reserved for initial state)
/// - `observe` keeps local time ahead of everything seen from remotes
///
/// # Example
///
/// ```rust
/// use outlinekit_core::crdt::LamportClock;
///
/// let mut clock = LamportClock::new();
/// assert_eq!(clock.tick(), 1);
///
/// clock.observe(5);          // Saw a remote edit stamped 5
/// assert_eq!(clock.tick(), 6);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LamportClock {
    value: u64,
}

impl LamportClock {
    /// Create a new clock starting at 0
    pub fn new() -> Self {
        Self { value: 0 }
    }

    /// Get the current clock value
    pub fn value(&self) -> u64 {
        self.value
    }

    /// Increment and return the new value (stamp for a local edit)
    pub fn tick(&mut self) -> u64 {
        self.value += 1;
        self.value
    }

    /// Fold in a remote timestamp
    ///
    /// Sets the clock to max(local, remote) so the next local edit is
    /// stamped after everything this replica has observed.
    pub fn observe(&mut self, remote: u64) {
        self.value = self.value.max(remote);
    }
}

impl Default for LamportClock {
    fn default() -> Self {
        Self::new()
    }
}
