//! Event logging for audit and replay.
//!
//! Every significant state change in the engine appends an event. The
//! log is the operator-facing audit trail: it is how spillovers, cycle
//! closures, payout legs, and payout failures are surfaced without
//! digging through tables.
//!
//! # Sequence numbers
//!
//! Each event carries the sequence number of the operation that caused
//! it: the join sequence for registration events, the placement sequence
//! for slot fills, and the closure sequence for cycle and payout events.
//! Within the log, insertion order is authoritative.

use serde::{Deserialize, Serialize};

/// An audited state change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A new member was registered
    MemberRegistered {
        seq: u64,
        member_id: String,
        display_name: String,
    },

    /// A unilevel sponsor link was recorded
    SponsorLinked {
        seq: u64,
        member_id: String,
        sponsor_id: String,
    },

    /// A matrix slot was filled by the placement engine
    ///
    /// `spillover` is true when the upline differs from the declared
    /// unilevel sponsor (the sponsor's own slots were full).
    SlotFilled {
        seq: u64,
        upline_id: String,
        downline_id: String,
        sponsor_id: String,
        position: u8,
        level: usize,
        spillover: bool,
    },

    /// A member's six slots completed and the cycle was settled
    CycleClosed {
        seq: u64,
        member_id: String,
        cycle_id: String,
        generation: u32,
        base_value: i64,
        payout_total: i64,
    },

    /// A direct wallet credit was emitted (cycle bonus or depth bonus)
    BonusCredited {
        seq: u64,
        member_id: String,
        cycle_id: String,
        amount: i64,
        reason: String,
    },

    /// A pool contribution was recorded (fidelity or top-rank)
    PoolContribution {
        seq: u64,
        pool: String,
        cycle_id: String,
        amount: i64,
        source_member_id: String,
    },

    /// A payout leg failed after retry exhaustion (manual reconciliation
    /// required; the cycle closure stands)
    PayoutLegFailed {
        seq: u64,
        cycle_id: String,
        leg: String,
        amount: i64,
        error: String,
    },

    /// The settlement summary notification was sent
    NotificationSent {
        seq: u64,
        member_id: String,
        template_id: String,
    },

    /// A member's status changed
    StatusChanged {
        seq: u64,
        member_id: String,
        active: bool,
    },
}

impl Event {
    /// Sequence number of the operation that produced this event
    pub fn seq(&self) -> u64 {
        match self {
            Event::MemberRegistered { seq, .. }
            | Event::SponsorLinked { seq, .. }
            | Event::SlotFilled { seq, .. }
            | Event::CycleClosed { seq, .. }
            | Event::BonusCredited { seq, .. }
            | Event::PoolContribution { seq, .. }
            | Event::PayoutLegFailed { seq, .. }
            | Event::NotificationSent { seq, .. }
            | Event::StatusChanged { seq, .. } => *seq,
        }
    }
}

/// Append-only event log
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event (events are never removed or reordered)
    pub fn append(&mut self, event: Event) {
        self.events.push(event);
    }

    /// All events in insertion order
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Number of logged events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if the log is empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Count events matching a predicate
    pub fn count_where(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_preserves_order() {
        let mut log = EventLog::new();
        log.append(Event::MemberRegistered {
            seq: 1,
            member_id: "A".to_string(),
            display_name: "Alice".to_string(),
        });
        log.append(Event::MemberRegistered {
            seq: 2,
            member_id: "B".to_string(),
            display_name: "Bob".to_string(),
        });

        assert_eq!(log.len(), 2);
        assert_eq!(log.events()[0].seq(), 1);
        assert_eq!(log.events()[1].seq(), 2);
    }

    #[test]
    fn test_count_where() {
        let mut log = EventLog::new();
        log.append(Event::StatusChanged {
            seq: 1,
            member_id: "A".to_string(),
            active: false,
        });
        log.append(Event::MemberRegistered {
            seq: 2,
            member_id: "B".to_string(),
            display_name: "Bob".to_string(),
        });

        let n = log.count_where(|e| matches!(e, Event::StatusChanged { .. }));
        assert_eq!(n, 1);
    }
}
