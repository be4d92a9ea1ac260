//! Cycle accounting models
//!
//! A cycle is the completion of all six slots under one member in the
//! forced matrix. Each member carries a [`CycleAccumulator`], a small
//! per-member state machine:
//!
//! ```text
//! FILLING --(6th slot)--> READY_TO_CLOSE --(settlement)--> CLOSED
//!    ^                                                        |
//!    +-------------- new generation, counters reset ----------+
//! ```
//!
//! Closing appends an immutable [`ClosedCycle`] to the ledger (created
//! exactly once per six filled slots, never mutated) and resets the
//! accumulator to a fresh generation so the same member can cycle again.
//!
//! CRITICAL: all money values are i64 (cents).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::slot::MATRIX_WIDTH;

/// Accumulator phase within the current generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    /// 0..=5 slots filled
    Filling,

    /// 6th slot filled, settlement not yet recorded
    ReadyToClose,
}

/// Errors from accumulator transitions
#[derive(Debug, Error, PartialEq)]
pub enum CycleError {
    #[error("no cycle accumulator exists for member {0}")]
    MissingAccumulator(String),

    #[error("accumulator for {member_id} cannot accept a fill while ready to close (generation {generation})")]
    FillWhileReady { member_id: String, generation: u32 },

    #[error("accumulator for {member_id} is not ready to close ({filled} of {width} slots filled)")]
    NotReady {
        member_id: String,
        filled: u8,
        width: u8,
    },
}

/// Per-member running count of filled downline slots and accrued value
///
/// Shared between the placement engine (which fills slots) and the cycle
/// closer (which resets it); both mutations happen inside the same
/// exclusive state borrow, so the count and the closure trigger cannot
/// race.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleAccumulator {
    member_id: String,
    filled_slots: u8,
    accumulated_value: i64,
    generation: u32,
    total_cycles: u32,
    phase: CyclePhase,
}

impl CycleAccumulator {
    /// Create a fresh accumulator (generation 1, nothing filled)
    pub fn new(member_id: String) -> Self {
        Self {
            member_id,
            filled_slots: 0,
            accumulated_value: 0,
            generation: 1,
            total_cycles: 0,
            phase: CyclePhase::Filling,
        }
    }

    /// Get owning member ID
    pub fn member_id(&self) -> &str {
        &self.member_id
    }

    /// Slots filled in the current generation (0..=6)
    pub fn filled_slots(&self) -> u8 {
        self.filled_slots
    }

    /// Value accrued in the current generation (cents)
    pub fn accumulated_value(&self) -> i64 {
        self.accumulated_value
    }

    /// Current generation (1-based; incremented on each close)
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Lifetime count of closed cycles
    pub fn total_cycles(&self) -> u32 {
        self.total_cycles
    }

    /// Current phase
    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    /// Record one filled slot and its accrued value
    ///
    /// Returns `true` when this fill completed the generation (the 6th
    /// slot) and the accumulator is now ready to close.
    pub fn record_fill(&mut self, slot_value: i64) -> Result<bool, CycleError> {
        if self.phase == CyclePhase::ReadyToClose {
            return Err(CycleError::FillWhileReady {
                member_id: self.member_id.clone(),
                generation: self.generation,
            });
        }

        self.filled_slots += 1;
        self.accumulated_value += slot_value;

        if self.filled_slots as usize == MATRIX_WIDTH {
            self.phase = CyclePhase::ReadyToClose;
            return Ok(true);
        }
        Ok(false)
    }

    /// Close the current generation and start the next
    ///
    /// Only valid in `ReadyToClose`. Resets the fill counters, bumps the
    /// generation, and increments the lifetime cycle count.
    pub fn close(&mut self) -> Result<(), CycleError> {
        if self.phase != CyclePhase::ReadyToClose {
            return Err(CycleError::NotReady {
                member_id: self.member_id.clone(),
                filled: self.filled_slots,
                width: MATRIX_WIDTH as u8,
            });
        }

        self.filled_slots = 0;
        self.accumulated_value = 0;
        self.generation += 1;
        self.total_cycles += 1;
        self.phase = CyclePhase::Filling;
        Ok(())
    }
}

/// Per-component payout amounts for one closed cycle (cents)
///
/// Computed once from the configured rates at closure time and stored on
/// the [`ClosedCycle`] record so the ledger is self-describing even if
/// rates change later.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PayoutBreakdown {
    /// Direct credit to the member who cycled
    pub cycle_bonus: i64,

    /// Per-level depth bonus amounts, levels 1..=6 up the matrix chain
    pub depth_bonus_by_level: [i64; MATRIX_WIDTH],

    /// Contribution to the shared monthly fidelity pool
    pub fidelity_pool: i64,

    /// Contribution to the shared top-rank pool
    pub top_rank_pool: i64,
}

impl PayoutBreakdown {
    /// Total depth bonus across all six levels
    pub fn depth_bonus_total(&self) -> i64 {
        self.depth_bonus_by_level.iter().sum()
    }

    /// Total payout value across all four components
    pub fn total(&self) -> i64 {
        self.cycle_bonus + self.depth_bonus_total() + self.fidelity_pool + self.top_rank_pool
    }
}

/// Immutable record of a completed cycle (append-only ledger entry)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedCycle {
    /// Unique cycle identifier (UUID)
    id: String,

    /// Member whose six slots completed
    member_id: String,

    /// Accumulator generation that closed
    generation: u32,

    /// Global closure sequence number (1-based)
    closed_seq: u64,

    /// Base cycle value the breakdown was computed from (cents)
    base_value: i64,

    /// Payout component amounts
    breakdown: PayoutBreakdown,
}

impl ClosedCycle {
    /// Create a new closure record
    pub fn new(
        member_id: String,
        generation: u32,
        closed_seq: u64,
        base_value: i64,
        breakdown: PayoutBreakdown,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            member_id,
            generation,
            closed_seq,
            base_value,
            breakdown,
        }
    }

    /// Get cycle ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get member ID
    pub fn member_id(&self) -> &str {
        &self.member_id
    }

    /// Get the generation that closed
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Get global closure sequence number
    pub fn closed_seq(&self) -> u64 {
        self.closed_seq
    }

    /// Get base cycle value (cents)
    pub fn base_value(&self) -> i64 {
        self.base_value
    }

    /// Get payout breakdown
    pub fn breakdown(&self) -> &PayoutBreakdown {
        &self.breakdown
    }
}
