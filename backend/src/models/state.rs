//! Network state
//!
//! Complete state owned by the engine: members, the unilevel sponsor
//! forest, the forced matrix, per-member cycle accumulators, the
//! closed-cycle ledger, and the event log.
//!
//! # Critical Invariants
//!
//! 1. **Slot uniqueness**: each (upline, position) pair holds at most
//!    one downline; a downline occupies at most one slot ever
//! 2. **Referral FIFO**: referral lists are ordered by join sequence
//! 3. **Ledger append-only**: closed cycles are never mutated or removed
//! 4. **Single writer**: all mutation funnels through the sponsor,
//!    placement, cycle, and payout modules; this struct exposes only
//!    crate-private mutators to everything else
//!
//! The crate-private mutators assert the structural invariants instead
//! of returning errors: callers (the component modules) validate first,
//! so a violation here is a bug, not an input problem.

use crate::models::cycle::{ClosedCycle, CycleAccumulator};
use crate::models::event::{Event, EventLog};
use crate::models::member::Member;
use crate::models::slot::{MatrixSlot, MATRIX_WIDTH};
use std::collections::HashMap;

static EMPTY_SLOTS: [Option<String>; MATRIX_WIDTH] = [None, None, None, None, None, None];

/// All engine-owned tables and sequence counters
#[derive(Debug, Clone, Default)]
pub struct NetworkState {
    /// All members, indexed by ID
    members: HashMap<String, Member>,

    /// Unilevel sponsor link: member ID -> sponsor ID (roots absent)
    sponsor_of: HashMap<String, String>,

    /// Forward referral lists, FIFO by join sequence
    referrals: HashMap<String, Vec<String>>,

    /// Matrix adjacency: upline ID -> six slot positions
    matrix_children: HashMap<String, [Option<String>; MATRIX_WIDTH]>,

    /// Downline ID -> its single matrix slot
    placement_of: HashMap<String, MatrixSlot>,

    /// Per-member cycle accumulators
    accumulators: HashMap<String, CycleAccumulator>,

    /// Append-only closed-cycle ledger
    closed_cycles: Vec<ClosedCycle>,

    /// Append-only audit log
    event_log: EventLog,

    next_join_seq: u64,
    next_placed_seq: u64,
    next_closed_seq: u64,
}

impl NetworkState {
    /// Create an empty network
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Members
    // ========================================================================

    /// Add a member, assigning the next join sequence number
    ///
    /// # Panics
    /// Panics if the member ID already exists (callers validate first).
    pub(crate) fn add_member(&mut self, id: &str, display_name: &str) -> u64 {
        assert!(
            !self.members.contains_key(id),
            "member ID {} already exists",
            id
        );
        self.next_join_seq += 1;
        let seq = self.next_join_seq;
        self.members
            .insert(id.to_string(), Member::new(id.to_string(), display_name.to_string(), seq));
        self.accumulators
            .insert(id.to_string(), CycleAccumulator::new(id.to_string()));
        seq
    }

    /// Get a member by ID
    pub fn member(&self, id: &str) -> Option<&Member> {
        self.members.get(id)
    }

    /// Get a mutable member by ID
    pub(crate) fn member_mut(&mut self, id: &str) -> Option<&mut Member> {
        self.members.get_mut(id)
    }

    /// All members, unordered
    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.members.values()
    }

    /// Number of members
    pub fn num_members(&self) -> usize {
        self.members.len()
    }

    // ========================================================================
    // Sponsor forest
    // ========================================================================

    /// Record a sponsor link (caller has already validated it)
    ///
    /// # Panics
    /// Panics if the member already has a sponsor link.
    pub(crate) fn record_sponsor_link(&mut self, member_id: &str, sponsor_id: &str) {
        let prev = self
            .sponsor_of
            .insert(member_id.to_string(), sponsor_id.to_string());
        assert!(
            prev.is_none(),
            "member {} already has a sponsor link",
            member_id
        );
        self.referrals
            .entry(sponsor_id.to_string())
            .or_default()
            .push(member_id.to_string());
    }

    /// Immediate sponsor ID, or None for roots
    pub fn sponsor_id_of(&self, member_id: &str) -> Option<&str> {
        self.sponsor_of.get(member_id).map(|s| s.as_str())
    }

    /// Direct referral IDs, FIFO by join sequence
    pub fn referral_ids(&self, member_id: &str) -> &[String] {
        self.referrals
            .get(member_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    // ========================================================================
    // Forced matrix
    // ========================================================================

    /// Next placement sequence number
    pub(crate) fn next_placed_seq(&mut self) -> u64 {
        self.next_placed_seq += 1;
        self.next_placed_seq
    }

    /// Record a slot resolved by the placement engine
    ///
    /// # Panics
    /// Panics if the position is occupied or the downline is already
    /// placed somewhere (the placement engine checks both first).
    pub(crate) fn record_slot(&mut self, slot: MatrixSlot) {
        assert!(
            !self.placement_of.contains_key(slot.downline_id()),
            "member {} is already placed in the matrix",
            slot.downline_id()
        );

        let children = self
            .matrix_children
            .entry(slot.upline_id().to_string())
            .or_insert_with(|| EMPTY_SLOTS.clone());
        let idx = (slot.position() - 1) as usize;
        assert!(
            children[idx].is_none(),
            "slot {} under {} is already occupied",
            slot.position(),
            slot.upline_id()
        );

        children[idx] = Some(slot.downline_id().to_string());
        self.placement_of
            .insert(slot.downline_id().to_string(), slot);
    }

    /// The six slot positions under an upline (all None if untouched)
    pub fn matrix_children(&self, upline_id: &str) -> &[Option<String>; MATRIX_WIDTH] {
        self.matrix_children.get(upline_id).unwrap_or(&EMPTY_SLOTS)
    }

    /// Number of occupied slots directly under an upline
    pub fn occupied_slots(&self, upline_id: &str) -> usize {
        self.matrix_children(upline_id)
            .iter()
            .filter(|s| s.is_some())
            .count()
    }

    /// The matrix slot a member occupies, if placed
    pub fn placement(&self, member_id: &str) -> Option<&MatrixSlot> {
        self.placement_of.get(member_id)
    }

    /// All matrix slots, unordered
    pub fn placements(&self) -> impl Iterator<Item = &MatrixSlot> {
        self.placement_of.values()
    }

    /// Total number of filled slots across the matrix
    pub fn num_slots(&self) -> usize {
        self.placement_of.len()
    }

    // ========================================================================
    // Cycle accounting
    // ========================================================================

    /// Get a member's accumulator
    pub fn accumulator(&self, member_id: &str) -> Option<&CycleAccumulator> {
        self.accumulators.get(member_id)
    }

    /// Get a mutable accumulator
    pub(crate) fn accumulator_mut(&mut self, member_id: &str) -> Option<&mut CycleAccumulator> {
        self.accumulators.get_mut(member_id)
    }

    /// Next closure sequence number
    pub(crate) fn next_closed_seq(&mut self) -> u64 {
        self.next_closed_seq += 1;
        self.next_closed_seq
    }

    /// Append a closure record to the ledger
    pub(crate) fn record_closed_cycle(&mut self, cycle: ClosedCycle) {
        self.closed_cycles.push(cycle);
    }

    /// The closed-cycle ledger, in closure order
    pub fn closed_cycles(&self) -> &[ClosedCycle] {
        &self.closed_cycles
    }

    // ========================================================================
    // Events & counters
    // ========================================================================

    /// Append an audit event
    pub(crate) fn log_event(&mut self, event: Event) {
        self.event_log.append(event);
    }

    /// The audit log
    pub fn events(&self) -> &EventLog {
        &self.event_log
    }

    /// Current sequence counters (join, placed, closed) — used by
    /// snapshots
    pub fn sequence_counters(&self) -> (u64, u64, u64) {
        (self.next_join_seq, self.next_placed_seq, self.next_closed_seq)
    }

    /// Rebuild state from snapshot parts (see `engine::checkpoint`)
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        members: Vec<Member>,
        sponsor_links: Vec<(String, String)>,
        slots: Vec<MatrixSlot>,
        accumulators: Vec<CycleAccumulator>,
        closed_cycles: Vec<ClosedCycle>,
        events: Vec<Event>,
        counters: (u64, u64, u64),
    ) -> Self {
        let mut state = NetworkState::new();

        for member in members {
            state.members.insert(member.id().to_string(), member);
        }

        // Referral lists must come back FIFO by join sequence
        let mut links = sponsor_links;
        links.sort_by_key(|(member_id, _)| {
            state.members.get(member_id).map(|m| m.joined_seq()).unwrap_or(u64::MAX)
        });
        for (member_id, sponsor_id) in links {
            state.record_sponsor_link(&member_id, &sponsor_id);
        }

        let mut slots = slots;
        slots.sort_by_key(|s| s.placed_seq());
        for slot in slots {
            state.record_slot(slot);
        }

        for acc in accumulators {
            state.accumulators.insert(acc.member_id().to_string(), acc);
        }

        state.closed_cycles = closed_cycles;
        for event in events {
            state.event_log.append(event);
        }

        let (join, placed, closed) = counters;
        state.next_join_seq = join;
        state.next_placed_seq = placed;
        state.next_closed_seq = closed;

        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_member_assigns_sequence() {
        let mut state = NetworkState::new();
        assert_eq!(state.add_member("A", "Alice"), 1);
        assert_eq!(state.add_member("B", "Bob"), 2);
        assert_eq!(state.num_members(), 2);
        assert!(state.accumulator("A").is_some());
    }

    #[test]
    #[should_panic(expected = "already exists")]
    fn test_duplicate_member_panics() {
        let mut state = NetworkState::new();
        state.add_member("A", "Alice");
        state.add_member("A", "Alice again");
    }

    #[test]
    fn test_referrals_are_fifo() {
        let mut state = NetworkState::new();
        state.add_member("R", "Root");
        state.add_member("A", "Alice");
        state.add_member("B", "Bob");
        state.record_sponsor_link("A", "R");
        state.record_sponsor_link("B", "R");

        assert_eq!(state.referral_ids("R"), &["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn test_record_slot_updates_both_indexes() {
        let mut state = NetworkState::new();
        state.add_member("R", "Root");
        state.add_member("A", "Alice");

        let seq = state.next_placed_seq();
        state.record_slot(MatrixSlot::new(
            "R".to_string(),
            "A".to_string(),
            1,
            1,
            false,
            seq,
        ));

        assert_eq!(state.occupied_slots("R"), 1);
        assert_eq!(state.placement("A").unwrap().upline_id(), "R");
        assert_eq!(state.num_slots(), 1);
    }

    #[test]
    #[should_panic(expected = "already occupied")]
    fn test_double_fill_panics() {
        let mut state = NetworkState::new();
        state.add_member("R", "Root");
        state.add_member("A", "Alice");
        state.add_member("B", "Bob");

        let seq = state.next_placed_seq();
        state.record_slot(MatrixSlot::new("R".to_string(), "A".to_string(), 1, 1, false, seq));
        let seq = state.next_placed_seq();
        state.record_slot(MatrixSlot::new("R".to_string(), "B".to_string(), 1, 1, false, seq));
    }

    #[test]
    #[should_panic(expected = "already placed")]
    fn test_double_placement_panics() {
        let mut state = NetworkState::new();
        state.add_member("R", "Root");
        state.add_member("S", "Other");
        state.add_member("A", "Alice");

        let seq = state.next_placed_seq();
        state.record_slot(MatrixSlot::new("R".to_string(), "A".to_string(), 1, 1, false, seq));
        let seq = state.next_placed_seq();
        state.record_slot(MatrixSlot::new("S".to_string(), "A".to_string(), 2, 1, false, seq));
    }
}
