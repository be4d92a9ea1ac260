//! Cycle Detector / Closer
//!
//! Observes matrix fill events and settles a member's cycle when their
//! six slots complete. The per-member state machine lives on the
//! [`CycleAccumulator`](crate::models::CycleAccumulator); this module
//! drives it.
//!
//! # Atomicity
//!
//! The fill count update and the closure trigger happen inside one
//! exclusive borrow of the network state, in the same call that
//! recorded the slot. Two placements racing to fill slot 6 cannot both
//! observe "5 slots": the engine serializes them by ownership, and a
//! persistent deployment must do the same with per-member row locks.
//!
//! The `ClosedCycle` record is appended before distribution runs; a
//! failed distribution surfaces as an alert and never un-closes the
//! cycle (see the payout module for the at-least-once rationale).

use crate::models::cycle::{ClosedCycle, CycleError};
use crate::models::state::NetworkState;
use crate::models::Event;
use crate::payout::{compute_breakdown, PayoutRates};

/// Register one filled slot under an upline
///
/// Returns the new [`ClosedCycle`] when this fill completed the
/// member's 6th slot, `None` for fills 1–5.
pub fn on_slot_filled(
    state: &mut NetworkState,
    upline_id: &str,
    rates: &PayoutRates,
) -> Result<Option<ClosedCycle>, CycleError> {
    let slot_value = rates.slot_value();
    let accumulator = state
        .accumulator_mut(upline_id)
        .ok_or_else(|| CycleError::MissingAccumulator(upline_id.to_string()))?;

    let ready = accumulator.record_fill(slot_value)?;
    if !ready {
        return Ok(None);
    }
    let generation = accumulator.generation();

    let breakdown = compute_breakdown(rates);
    let closed_seq = state.next_closed_seq();
    let cycle = ClosedCycle::new(
        upline_id.to_string(),
        generation,
        closed_seq,
        rates.base_cycle_value,
        breakdown,
    );

    state.record_closed_cycle(cycle.clone());
    state.log_event(Event::CycleClosed {
        seq: closed_seq,
        member_id: upline_id.to_string(),
        cycle_id: cycle.id().to_string(),
        generation,
        base_value: cycle.base_value(),
        payout_total: cycle.breakdown().total(),
    });

    // New generation starts immediately: the member can cycle again
    state
        .accumulator_mut(upline_id)
        .ok_or_else(|| CycleError::MissingAccumulator(upline_id.to_string()))?
        .close()?;

    Ok(Some(cycle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::cycle::CyclePhase;

    fn state_with(members: &[&str]) -> NetworkState {
        let mut state = NetworkState::new();
        for id in members {
            state.add_member(id, id);
        }
        state
    }

    #[test]
    fn test_fills_one_to_five_return_none() {
        let mut state = state_with(&["R"]);
        let rates = PayoutRates::default();

        for i in 1..=5 {
            let closed = on_slot_filled(&mut state, "R", &rates).unwrap();
            assert!(closed.is_none(), "fill {} must not close", i);
        }
        assert!(state.closed_cycles().is_empty());
    }

    #[test]
    fn test_sixth_fill_closes_exactly_once() {
        let mut state = state_with(&["R"]);
        let rates = PayoutRates::default();

        for _ in 0..5 {
            on_slot_filled(&mut state, "R", &rates).unwrap();
        }
        let closed = on_slot_filled(&mut state, "R", &rates).unwrap().unwrap();

        assert_eq!(closed.member_id(), "R");
        assert_eq!(closed.generation(), 1);
        assert_eq!(closed.base_value(), 36_000);
        assert_eq!(state.closed_cycles().len(), 1);

        // Accumulator reset to a fresh generation
        let acc = state.accumulator("R").unwrap();
        assert_eq!(acc.filled_slots(), 0);
        assert_eq!(acc.generation(), 2);
        assert_eq!(acc.total_cycles(), 1);
        assert_eq!(acc.phase(), CyclePhase::Filling);
    }

    #[test]
    fn test_second_generation_closes_independently() {
        let mut state = state_with(&["R"]);
        let rates = PayoutRates::default();

        for _ in 0..6 {
            on_slot_filled(&mut state, "R", &rates).unwrap();
        }
        for _ in 0..5 {
            assert!(on_slot_filled(&mut state, "R", &rates).unwrap().is_none());
        }
        let second = on_slot_filled(&mut state, "R", &rates).unwrap().unwrap();

        assert_eq!(second.generation(), 2);
        assert_eq!(second.closed_seq(), 2);
        assert_eq!(state.closed_cycles().len(), 2);
    }

    #[test]
    fn test_missing_accumulator_is_error() {
        let mut state = NetworkState::new();
        let err = on_slot_filled(&mut state, "ghost", &PayoutRates::default()).unwrap_err();
        assert_eq!(err, CycleError::MissingAccumulator("ghost".to_string()));
    }
}
