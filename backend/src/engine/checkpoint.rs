//! Checkpoint - Save/Load Engine State
//!
//! Serializes the complete network state for pause/resume and for
//! moving state between environments.
//!
//! # Critical Invariants
//!
//! - **Config matching**: a snapshot can only be restored with the
//!   config it was taken under (SHA-256 hash check)
//! - **Slot uniqueness**: no duplicate (upline, position) pair and no
//!   member placed twice
//! - **Referential integrity**: every slot, link, and accumulator
//!   references a known member
//! - **Ledger monotonicity**: closure sequence numbers strictly increase

use crate::engine::runtime::{EngineConfig, EngineError, MatrixEngine};
use crate::external::{NotificationService, WalletService};
use crate::models::cycle::{ClosedCycle, CycleAccumulator};
use crate::models::event::Event;
use crate::models::member::Member;
use crate::models::slot::MatrixSlot;
use crate::models::state::NetworkState;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};

// ============================================================================
// Snapshot Structures
// ============================================================================

/// A persisted sponsor link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SponsorLinkSnapshot {
    pub member_id: String,
    pub sponsor_id: String,
}

/// Complete engine state snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// All members with their join sequence numbers
    pub members: Vec<Member>,

    /// All unilevel sponsor links
    pub sponsor_links: Vec<SponsorLinkSnapshot>,

    /// All matrix slots
    pub slots: Vec<MatrixSlot>,

    /// All cycle accumulators
    pub accumulators: Vec<CycleAccumulator>,

    /// The closed-cycle ledger, in closure order
    pub closed_cycles: Vec<ClosedCycle>,

    /// The audit log
    pub events: Vec<Event>,

    /// Sequence counters: (join, placed, closed)
    pub counters: (u64, u64, u64),

    /// SHA-256 hash of the engine config (for restore validation)
    pub config_hash: String,
}

// ============================================================================
// Config Hashing
// ============================================================================

/// Compute a deterministic SHA-256 hash of a config
///
/// Serializes via canonical JSON (recursively sorted object keys) so the
/// hash is independent of map iteration order.
pub fn compute_config_hash<T: Serialize>(config: &T) -> Result<String, EngineError> {
    use serde_json::Value;
    use std::collections::BTreeMap;

    let value = serde_json::to_value(config)
        .map_err(|e| EngineError::Serialization(format!("config serialization failed: {}", e)))?;

    fn canonicalize(value: Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: BTreeMap<String, Value> =
                    map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
                Value::Object(sorted.into_iter().collect())
            }
            Value::Array(arr) => Value::Array(arr.into_iter().map(canonicalize).collect()),
            other => other,
        }
    }

    let json = serde_json::to_string(&canonicalize(value))
        .map_err(|e| EngineError::Serialization(format!("config serialization failed: {}", e)))?;

    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

// ============================================================================
// Validation
// ============================================================================

/// Validate snapshot structural integrity
pub fn validate_snapshot(snapshot: &StateSnapshot) -> Result<(), EngineError> {
    let member_ids: HashSet<&str> = snapshot.members.iter().map(|m| m.id()).collect();
    if member_ids.len() != snapshot.members.len() {
        return Err(EngineError::Snapshot("duplicate member id".to_string()));
    }

    // Sponsor links reference known members
    for link in &snapshot.sponsor_links {
        for id in [&link.member_id, &link.sponsor_id] {
            if !member_ids.contains(id.as_str()) {
                return Err(EngineError::Snapshot(format!(
                    "sponsor link references unknown member {}",
                    id
                )));
            }
        }
    }

    // Slot uniqueness: one slot per downline, one downline per position
    let mut placed: HashSet<&str> = HashSet::new();
    let mut positions: HashMap<(&str, u8), &str> = HashMap::new();
    for slot in &snapshot.slots {
        if !member_ids.contains(slot.upline_id()) || !member_ids.contains(slot.downline_id()) {
            return Err(EngineError::Snapshot(format!(
                "slot references unknown member ({} -> {})",
                slot.upline_id(),
                slot.downline_id()
            )));
        }
        if !placed.insert(slot.downline_id()) {
            return Err(EngineError::Snapshot(format!(
                "member {} is placed more than once",
                slot.downline_id()
            )));
        }
        if let Some(prev) = positions.insert((slot.upline_id(), slot.position()), slot.downline_id())
        {
            return Err(EngineError::Snapshot(format!(
                "slot {} under {} held by both {} and {}",
                slot.position(),
                slot.upline_id(),
                prev,
                slot.downline_id()
            )));
        }
    }

    // Accumulators reference known members
    for acc in &snapshot.accumulators {
        if !member_ids.contains(acc.member_id()) {
            return Err(EngineError::Snapshot(format!(
                "accumulator references unknown member {}",
                acc.member_id()
            )));
        }
    }

    // Ledger monotonicity
    let mut last_seq = 0u64;
    for cycle in &snapshot.closed_cycles {
        if cycle.closed_seq() <= last_seq {
            return Err(EngineError::Snapshot(format!(
                "closed cycle {} breaks ledger ordering (seq {} after {})",
                cycle.id(),
                cycle.closed_seq(),
                last_seq
            )));
        }
        last_seq = cycle.closed_seq();
    }

    Ok(())
}

// ============================================================================
// Save / Restore
// ============================================================================

impl MatrixEngine {
    /// Capture a snapshot of the full engine state
    pub fn snapshot(&self) -> Result<StateSnapshot, EngineError> {
        let state = self.state();

        let mut members: Vec<Member> = state.members().cloned().collect();
        members.sort_by_key(|m| m.joined_seq());

        let sponsor_links = members
            .iter()
            .filter_map(|m| {
                state.sponsor_id_of(m.id()).map(|sponsor_id| SponsorLinkSnapshot {
                    member_id: m.id().to_string(),
                    sponsor_id: sponsor_id.to_string(),
                })
            })
            .collect();

        let mut slots: Vec<MatrixSlot> = state.placements().cloned().collect();
        slots.sort_by_key(|s| s.placed_seq());

        let accumulators = members
            .iter()
            .filter_map(|m| state.accumulator(m.id()).cloned())
            .collect();

        Ok(StateSnapshot {
            members,
            sponsor_links,
            slots,
            accumulators,
            closed_cycles: state.closed_cycles().to_vec(),
            events: state.events().events().to_vec(),
            counters: state.sequence_counters(),
            config_hash: compute_config_hash(self.config())?,
        })
    }

    /// Restore an engine from a snapshot
    ///
    /// Fails when the config hash does not match or the snapshot is
    /// structurally corrupt.
    pub fn restore(
        config: EngineConfig,
        wallet: Box<dyn WalletService>,
        notifier: Box<dyn NotificationService>,
        snapshot: StateSnapshot,
    ) -> Result<Self, EngineError> {
        let expected = compute_config_hash(&config)?;
        if expected != snapshot.config_hash {
            return Err(EngineError::Snapshot(format!(
                "config hash mismatch: snapshot {}, config {}",
                snapshot.config_hash, expected
            )));
        }
        validate_snapshot(&snapshot)?;

        let state = NetworkState::from_parts(
            snapshot.members,
            snapshot
                .sponsor_links
                .into_iter()
                .map(|l| (l.member_id, l.sponsor_id))
                .collect(),
            snapshot.slots,
            snapshot.accumulators,
            snapshot.closed_cycles,
            snapshot.events,
            snapshot.counters,
        );

        MatrixEngine::with_state(state, config, wallet, notifier)
    }
}
