//! Matrix Placement Engine
//!
//! Given a newly joined member and their declared unilevel sponsor,
//! finds the correct slot in the 1×6 forced matrix and records it.
//!
//! # Algorithm — breadth-first vacancy search
//!
//! 1. The search frontier starts as the sponsor alone.
//! 2. Frontier candidates are scanned in FIFO order of when they were
//!    themselves placed (join order at the first level); within each
//!    candidate, slot positions 1..=6 are scanned in order. The first
//!    free (candidate, slot) pair wins.
//! 3. If the frontier has no free slot, the next frontier is every
//!    member already holding a level-1 slot under the current frontier,
//!    again FIFO by placement sequence.
//! 4. The search is bounded at a configured maximum depth. Exhaustion
//!    is `MatrixFull` — a data-integrity alarm, never silently retried
//!    and never worked around with a fallback position.
//!
//! This produces balanced spillover: new members fill across siblings
//! before descending a level. A round-robin modulo-6 distribution does
//! NOT satisfy the forced-matrix rule (it skips partially filled
//! uplines) and is intentionally not implemented.
//!
//! # Critical Invariants
//!
//! - Exactly one slot is created per member, ever; re-placing an
//!   already-placed member is a no-op returning the existing slot
//! - The chosen slot is the lexicographically-first free position
//!   (upline FIFO order, then slot number) reachable from the sponsor

use crate::models::slot::{MatrixSlot, MATRIX_WIDTH};
use crate::models::state::NetworkState;
use crate::models::Event;
use thiserror::Error;

/// Default search depth bound: one full cycle's worth of levels
pub const DEFAULT_MAX_SEARCH_DEPTH: usize = 6;

/// Placement integrity errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PlacementError {
    #[error("unilevel sponsor not found: {0}")]
    NoSponsor(String),

    #[error("member not found: {0}")]
    UnknownMember(String),

    /// No free slot within the depth bound. Under correct configuration
    /// this cannot happen (a 1×6 matrix has 6^d slots at depth d); treat
    /// as a data-integrity alarm, not a routine condition.
    #[error(
        "no free matrix slot within {max_depth} levels below sponsor {sponsor_id} \
         ({scanned} uplines scanned)"
    )]
    MatrixFull {
        sponsor_id: String,
        max_depth: usize,
        scanned: usize,
    },
}

/// Find and record the matrix slot for a newly joined member
///
/// Returns the created [`MatrixSlot`]. If the member is already placed,
/// returns the existing slot unchanged (no event, no new slot).
///
/// # Arguments
/// * `member_id` - the member being placed
/// * `sponsor_id` - their declared unilevel sponsor (the search root)
/// * `max_depth` - depth bound for the vacancy search
pub fn place_member(
    state: &mut NetworkState,
    member_id: &str,
    sponsor_id: &str,
    max_depth: usize,
) -> Result<MatrixSlot, PlacementError> {
    assert!(max_depth >= 1, "max_depth must be >= 1");
    assert_ne!(member_id, sponsor_id, "self-sponsorship is screened by the sponsor store");

    if state.member(member_id).is_none() {
        return Err(PlacementError::UnknownMember(member_id.to_string()));
    }
    if state.member(sponsor_id).is_none() {
        return Err(PlacementError::NoSponsor(sponsor_id.to_string()));
    }

    // Idempotency: a member occupies exactly one slot, ever
    if let Some(existing) = state.placement(member_id) {
        return Ok(existing.clone());
    }

    let (upline_id, position, level) =
        find_vacancy(state, sponsor_id, max_depth).ok_or_else(|| PlacementError::MatrixFull {
            sponsor_id: sponsor_id.to_string(),
            max_depth,
            scanned: count_scanned(state, sponsor_id, max_depth),
        })?;

    let spillover = upline_id != sponsor_id;
    let placed_seq = state.next_placed_seq();
    let slot = MatrixSlot::new(
        upline_id.clone(),
        member_id.to_string(),
        position,
        level,
        spillover,
        placed_seq,
    );
    state.record_slot(slot.clone());
    state.log_event(Event::SlotFilled {
        seq: placed_seq,
        upline_id,
        downline_id: member_id.to_string(),
        sponsor_id: sponsor_id.to_string(),
        position,
        level,
        spillover,
    });

    Ok(slot)
}

/// Breadth-first vacancy search
///
/// Returns (upline, position, level) for the first free slot, or None
/// when the depth bound is exhausted.
fn find_vacancy(
    state: &NetworkState,
    sponsor_id: &str,
    max_depth: usize,
) -> Option<(String, u8, usize)> {
    let mut frontier: Vec<String> = vec![sponsor_id.to_string()];

    for level in 1..=max_depth {
        for candidate in &frontier {
            let children = state.matrix_children(candidate);
            for (idx, occupant) in children.iter().enumerate() {
                if occupant.is_none() {
                    return Some((candidate.clone(), (idx + 1) as u8, level));
                }
            }
        }

        if level == max_depth {
            break;
        }
        frontier = next_frontier(state, &frontier);
        if frontier.is_empty() {
            // Every frontier member was full, so it has children; this
            // branch is unreachable unless the depth bound is 0-wide
            break;
        }
    }
    None
}

/// Expand the frontier one level down, FIFO by placement sequence
fn next_frontier(state: &NetworkState, frontier: &[String]) -> Vec<String> {
    let mut children: Vec<(u64, String)> = Vec::with_capacity(frontier.len() * MATRIX_WIDTH);

    for upline in frontier {
        for occupant in state.matrix_children(upline).iter().flatten() {
            let seq = state
                .placement(occupant)
                .map(|slot| slot.placed_seq())
                .unwrap_or(u64::MAX);
            children.push((seq, occupant.clone()));
        }
    }

    children.sort_by_key(|(seq, _)| *seq);
    children.into_iter().map(|(_, id)| id).collect()
}

/// Count the uplines a failed search visited (for the error report)
fn count_scanned(state: &NetworkState, sponsor_id: &str, max_depth: usize) -> usize {
    let mut frontier: Vec<String> = vec![sponsor_id.to_string()];
    let mut scanned = 0usize;
    for level in 1..=max_depth {
        scanned += frontier.len();
        if level == max_depth {
            break;
        }
        frontier = next_frontier(state, &frontier);
    }
    scanned
}
