//! Snake-draft turn math.
//!
//! Pure functions over committed pick data, shared by the live draft
//! service and the auto-finalizer. Turn and round are always derived
//! from the pick count and order length — never stored — so the two
//! callers can never disagree about whose turn it is.

use crate::types::ROSTER_SIZE;

/// The derived turn for a given pick number: which round it falls in
/// and which index into the draft order picks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Turn {
    /// 1-based round number.
    pub round: u32,
    /// 0-based index into the league's `draft_order`.
    pub picker_index: u32,
}

/// Compute the turn for `pick_number` in a league of `total_members`.
///
/// Odd rounds index forward through the order, even rounds backward:
/// round 1 goes 1→N, round 2 goes N→1. Calling this with an empty
/// order is a contract violation, not a recoverable error.
pub fn compute_turn(pick_number: u32, total_members: u32) -> Turn {
    assert!(total_members > 0, "draft order must not be empty");

    let round = pick_number / total_members + 1;
    let offset = pick_number % total_members;
    let picker_index = if round % 2 == 1 {
        offset
    } else {
        total_members - 1 - offset
    };

    Turn {
        round,
        picker_index,
    }
}

/// Total picks a league of `total_members` needs to fill every roster.
pub fn total_picks(total_members: u32) -> u32 {
    total_members * ROSTER_SIZE
}

/// A draft is complete exactly when the pick count reaches the roster
/// target. No pick may be recorded past this point.
pub fn is_complete(pick_count: u32, total_members: u32) -> bool {
    assert!(total_members > 0, "draft order must not be empty");
    pick_count >= total_picks(total_members)
}
