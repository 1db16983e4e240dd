//! OrderKey: dense sibling ordering for the outline tree
//!
//! Sibling order is established by comparable keys rather than array
//! indices, so concurrent inserts and moves never fight over positions.
//! A key is a path of `(digit, replica)` pairs compared level by level,
//! in the style of Logoot position identifiers:
//!
//! - Digits order positions within a level
//! - The replica id breaks ties between concurrent inserts that picked
//!   the same digit, deterministically and identically on every replica
//! - When two neighbors leave no digit gap, the key grows one level
//!   deeper instead of failing, so the key space is dense
//!
//! `between` is a pure function of its inputs plus the generating
//! replica id: two replicas inserting at the same visual position
//! produce distinct keys whose relative order is the lexicographic
//! order of the replica ids, stable everywhere once merged.

use crate::ReplicaId;
use serde::{Deserialize, Serialize};

/// Spread used when appending before the first or after the last
/// sibling, leaving digit room for later inserts at the same depth.
const STEP: i64 = 8;

/// One level of an order key path
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderElem {
    /// Position digit within this level
    pub digit: i64,

    /// Replica that generated this level (concurrency tiebreaker)
    pub replica: ReplicaId,
}

/// Densely-orderable sibling position key
///
/// Ordering is lexicographic over the path elements, with a shorter key
/// sorting before any of its extensions. Both properties come straight
/// from the derived `Ord` on `Vec<OrderElem>`.
///
/// # Example
///
/// ```rust
/// use outlinekit_core::crdt::OrderKey;
///
/// let first = OrderKey::between(None, None, "r1");
/// let second = OrderKey::between(Some(&first), None, "r1");
/// let wedged = OrderKey::between(Some(&first), Some(&second), "r1");
///
/// assert!(first < wedged);
/// assert!(wedged < second);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderKey(Vec<OrderElem>);

impl OrderKey {
    /// Generate a key strictly between two existing sibling keys
    ///
    /// `left` is `None` for "before the first sibling" and `right` is
    /// `None` for "after the last sibling". Always succeeds: when the
    /// neighbors leave no digit gap the path descends a level, so the
    /// key space is dense.
    ///
    /// Deterministic given `(left, right, replica)`. Concurrent calls
    /// from different replicas with the same neighbors yield keys
    /// ordered by replica id, never equal keys.
    ///
    /// # Panics
    ///
    /// Debug-asserts `left < right` when both bounds are present;
    /// callers obtain bounds from an ordered sibling list.
    pub fn between(left: Option<&OrderKey>, right: Option<&OrderKey>, replica: &str) -> OrderKey {
        if let (Some(l), Some(r)) = (left, right) {
            debug_assert!(l < r, "order key bounds out of order");
        }

        let mut path = Vec::new();
        let mut level = 0;
        let mut right_active = right.is_some();

        loop {
            let l_elem = left.and_then(|k| k.0.get(level));
            let r_elem = if right_active {
                right.and_then(|k| k.0.get(level))
            } else {
                None
            };

            match (l_elem, r_elem) {
                // Unbounded on both sides at this level
                (None, None) => {
                    path.push(OrderElem {
                        digit: 0,
                        replica: replica.to_string(),
                    });
                    return OrderKey(path);
                }
                // Only a left bound: any larger digit sorts after the
                // whole left key
                (Some(l0), None) => {
                    path.push(OrderElem {
                        digit: l0.digit + STEP,
                        replica: replica.to_string(),
                    });
                    return OrderKey(path);
                }
                // Only a right bound: digits are unbounded below
                (None, Some(r0)) => {
                    path.push(OrderElem {
                        digit: r0.digit - STEP,
                        replica: replica.to_string(),
                    });
                    return OrderKey(path);
                }
                (Some(l0), Some(r0)) => {
                    if r0.digit - l0.digit > 1 {
                        path.push(OrderElem {
                            digit: l0.digit + (r0.digit - l0.digit) / 2,
                            replica: replica.to_string(),
                        });
                        return OrderKey(path);
                    }
                    // No digit gap. Extend the left bound's path: the
                    // copied element sorts below the right bound, so
                    // deeper levels are only constrained by `left`.
                    path.push(l0.clone());
                    if l0 != r0 {
                        right_active = false;
                    }
                    level += 1;
                }
            }
        }
    }

    /// Number of path levels (proxy for key growth in tests)
    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

impl std::fmt::Display for OrderKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, elem) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}@{}", elem.digit, elem.replica)?;
        }
        Ok(())
    }
}
