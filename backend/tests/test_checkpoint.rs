//! Checkpoint Tests
//!
//! Snapshot round-trips, config hash matching, and rejection of
//! structurally corrupt snapshots.

use matrix_engine_core_rs::{
    compute_config_hash, validate_snapshot, EngineConfig, EngineError, MatrixEngine,
    RecordingNotifier, RecordingWallet, RetryPolicy, StateSnapshot,
};

// ============================================================================
// Test Helpers
// ============================================================================

fn test_config() -> EngineConfig {
    EngineConfig {
        retry: RetryPolicy {
            max_attempts: 2,
            base_delay_ms: 0,
        },
        ..EngineConfig::default()
    }
}

fn test_engine() -> MatrixEngine {
    MatrixEngine::new(
        test_config(),
        Box::new(RecordingWallet::new()),
        Box::new(RecordingNotifier::new()),
    )
    .expect("default config must be valid")
}

fn populated_engine(members: usize) -> MatrixEngine {
    let mut engine = test_engine();
    engine.register_member("R", "Root", None).unwrap();
    for i in 1..=members {
        let id = format!("M{}", i);
        engine.register_member(&id, &id, Some("R")).unwrap();
    }
    engine
}

fn restore(snapshot: StateSnapshot) -> Result<MatrixEngine, EngineError> {
    MatrixEngine::restore(
        test_config(),
        Box::new(RecordingWallet::new()),
        Box::new(RecordingNotifier::new()),
        snapshot,
    )
}

// ============================================================================
// Round Trip
// ============================================================================

#[test]
fn test_snapshot_restore_round_trip() {
    let engine = populated_engine(8);
    let snapshot = engine.snapshot().unwrap();

    let restored = restore(snapshot).unwrap();

    assert_eq!(restored.num_members(), engine.num_members());
    assert_eq!(restored.closed_cycles().len(), engine.closed_cycles().len());
    assert_eq!(restored.events().len(), engine.events().len());
    assert_eq!(
        restored.placement_of("M7"),
        engine.placement_of("M7"),
        "spillover placement must survive the round trip"
    );
    assert_eq!(
        restored.accumulator("R").unwrap().generation(),
        engine.accumulator("R").unwrap().generation()
    );
}

#[test]
fn test_snapshot_survives_json_serialization() {
    let engine = populated_engine(6);
    let snapshot = engine.snapshot().unwrap();

    let json = serde_json::to_string(&snapshot).unwrap();
    let parsed: StateSnapshot = serde_json::from_str(&json).unwrap();

    let restored = restore(parsed).unwrap();
    assert_eq!(restored.num_members(), 7);
    assert_eq!(restored.closed_cycles().len(), 1);
}

#[test]
fn test_restored_engine_continues_where_it_stopped() {
    let engine = populated_engine(6);
    let snapshot = engine.snapshot().unwrap();
    let mut restored = restore(snapshot).unwrap();

    // The next registration must spill exactly as it would have in the
    // original engine: position 1 under the first-placed child
    let report = restored.register_member("M7", "M7", Some("R")).unwrap();
    let slot = report.slot.unwrap();
    assert_eq!(slot.upline_id(), "M1");
    assert_eq!(slot.position(), 1);
    assert!(slot.is_spillover());

    // Duplicate ids stay rejected across the restore boundary
    assert!(restored.register_member("M3", "M3", Some("R")).is_err());
}

// ============================================================================
// Config Hash
// ============================================================================

#[test]
fn test_restore_rejects_config_mismatch() {
    let engine = populated_engine(3);
    let snapshot = engine.snapshot().unwrap();

    let other_config = EngineConfig {
        max_search_depth: 3,
        ..test_config()
    };
    let result = MatrixEngine::restore(
        other_config,
        Box::new(RecordingWallet::new()),
        Box::new(RecordingNotifier::new()),
        snapshot,
    );

    assert!(matches!(result, Err(EngineError::Snapshot(_))));
}

#[test]
fn test_config_hash_is_stable_across_engines() {
    let a = compute_config_hash(&test_config()).unwrap();
    let b = compute_config_hash(&test_config()).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.len(), 64, "SHA-256 hex digest");
}

// ============================================================================
// Corruption Rejection
// ============================================================================

#[test]
fn test_tampered_slot_positions_are_rejected() {
    let engine = populated_engine(3);
    let mut snapshot = engine.snapshot().unwrap();

    // Duplicate a slot record: the same member placed twice
    let dup = snapshot.slots[0].clone();
    snapshot.slots.push(dup);

    assert!(validate_snapshot(&snapshot).is_err());
    assert!(matches!(restore(snapshot), Err(EngineError::Snapshot(_))));
}

#[test]
fn test_dangling_member_reference_is_rejected() {
    let engine = populated_engine(3);
    let mut snapshot = engine.snapshot().unwrap();

    // Drop a member that still holds a slot
    snapshot.members.retain(|m| m.id() != "M1");

    assert!(matches!(restore(snapshot), Err(EngineError::Snapshot(_))));
}

#[test]
fn test_reordered_ledger_is_rejected() {
    let engine = populated_engine(12); // two closed cycles
    let mut snapshot = engine.snapshot().unwrap();
    assert_eq!(snapshot.closed_cycles.len(), 2);

    snapshot.closed_cycles.swap(0, 1);
    assert!(matches!(restore(snapshot), Err(EngineError::Snapshot(_))));
}
