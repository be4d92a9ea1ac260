//! MatrixSlot model
//!
//! An edge in the 1×6 forced matrix: one upline holds at most six
//! level-1 downlines (slot positions 1..=6, each used once), and a
//! downline occupies exactly one slot across the whole matrix, ever.
//!
//! Slots are created exclusively by the placement engine and are never
//! moved. The corrective tooling the legacy system needed existed
//! precisely because this invariant was violated in production, so the
//! record is deliberately immutable after construction.

use serde::{Deserialize, Serialize};

/// Fixed fan-out of the forced matrix (1×6 plan)
pub const MATRIX_WIDTH: usize = 6;

/// A filled position in the forced matrix
///
/// # Example
/// ```
/// use matrix_engine_core_rs::models::MatrixSlot;
///
/// let slot = MatrixSlot::new(
///     "ROOT".to_string(),
///     "M001".to_string(),
///     1,     // slot position
///     1,     // search level (directly under the sponsor)
///     false, // not spillover
///     1,     // placement sequence
/// );
/// assert_eq!(slot.position(), 1);
/// assert!(!slot.is_spillover());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixSlot {
    /// Member holding the slot (the matrix parent)
    upline_id: String,

    /// Member occupying the slot (the placed member)
    downline_id: String,

    /// Slot position under the upline, 1..=6
    position: u8,

    /// Search level at which the slot was found: 1 means directly under
    /// the declared unilevel sponsor, 2 one level deeper, and so on
    level: usize,

    /// True when the upline differs from the declared unilevel sponsor
    spillover: bool,

    /// Placement sequence number, assigned monotonically across the
    /// whole matrix; the FIFO key for frontier ordering
    placed_seq: u64,
}

impl MatrixSlot {
    /// Create a new matrix slot record
    ///
    /// # Panics
    /// Panics if `position` is outside 1..=6, `level` is zero, or the
    /// upline and downline are the same member.
    pub fn new(
        upline_id: String,
        downline_id: String,
        position: u8,
        level: usize,
        spillover: bool,
        placed_seq: u64,
    ) -> Self {
        assert!(
            (1..=MATRIX_WIDTH as u8).contains(&position),
            "slot position must be 1..=6, got {}",
            position
        );
        assert!(level >= 1, "level must be >= 1");
        assert_ne!(upline_id, downline_id, "a member cannot hold itself");

        Self {
            upline_id,
            downline_id,
            position,
            level,
            spillover,
            placed_seq,
        }
    }

    /// Get the upline (matrix parent) ID
    pub fn upline_id(&self) -> &str {
        &self.upline_id
    }

    /// Get the downline (placed member) ID
    pub fn downline_id(&self) -> &str {
        &self.downline_id
    }

    /// Get slot position (1..=6)
    pub fn position(&self) -> u8 {
        self.position
    }

    /// Get search level relative to the declared sponsor (1-based)
    pub fn level(&self) -> usize {
        self.level
    }

    /// Check whether this placement spilled past the declared sponsor
    pub fn is_spillover(&self) -> bool {
        self.spillover
    }

    /// Get the global placement sequence number
    pub fn placed_seq(&self) -> u64 {
        self.placed_seq
    }
}
