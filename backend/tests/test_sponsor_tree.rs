//! Sponsor Tree Tests
//!
//! The unilevel sponsor tree is the "who recruited whom" record. It is
//! independent of the matrix: a spilled member keeps their declared
//! sponsor even when their matrix slot lands elsewhere.

use matrix_engine_core_rs::{
    EngineConfig, EngineError, Event, MatrixEngine, PlacementError, RecordingNotifier,
    RecordingWallet, RetryPolicy, SponsorError,
};

// ============================================================================
// Test Helpers
// ============================================================================

fn test_engine() -> MatrixEngine {
    MatrixEngine::new(
        EngineConfig {
            retry: RetryPolicy {
                max_attempts: 2,
                base_delay_ms: 0,
            },
            ..EngineConfig::default()
        },
        Box::new(RecordingWallet::new()),
        Box::new(RecordingNotifier::new()),
    )
    .expect("default config must be valid")
}

// ============================================================================
// Forest Shape
// ============================================================================

#[test]
fn test_root_has_no_sponsor() {
    let mut engine = test_engine();
    engine.register_member("R", "Root", None).unwrap();

    assert!(engine.sponsor_of("R").is_none());
    assert!(engine.direct_referrals("R").is_empty());
}

#[test]
fn test_sponsor_link_recorded() {
    let mut engine = test_engine();
    engine.register_member("R", "Root", None).unwrap();
    engine.register_member("A", "Alice", Some("R")).unwrap();

    assert_eq!(engine.sponsor_of("A").unwrap().id(), "R");
    let referrals = engine.direct_referrals("R");
    assert_eq!(referrals.len(), 1);
    assert_eq!(referrals[0].id(), "A");
}

#[test]
fn test_direct_referrals_are_fifo_by_join_order() {
    let mut engine = test_engine();
    engine.register_member("R", "Root", None).unwrap();
    for id in ["C", "A", "B"] {
        engine.register_member(id, id, Some("R")).unwrap();
    }

    let ids: Vec<&str> = engine.direct_referrals("R").iter().map(|m| m.id()).collect();
    assert_eq!(ids, ["C", "A", "B"], "referrals must keep join order, not sort");
}

#[test]
fn test_multiple_roots_form_independent_trees() {
    let mut engine = test_engine();
    engine.register_member("R1", "Root one", None).unwrap();
    engine.register_member("R2", "Root two", None).unwrap();
    engine.register_member("A", "Alice", Some("R1")).unwrap();
    engine.register_member("B", "Bob", Some("R2")).unwrap();

    assert_eq!(engine.sponsor_of("A").unwrap().id(), "R1");
    assert_eq!(engine.sponsor_of("B").unwrap().id(), "R2");
    assert!(engine.direct_referrals("R1").iter().all(|m| m.id() == "A"));
    assert!(engine.direct_referrals("R2").iter().all(|m| m.id() == "B"));
}

// ============================================================================
// Rejections
// ============================================================================

#[test]
fn test_self_sponsorship_rejected() {
    let mut engine = test_engine();
    let err = engine.register_member("A", "Alice", Some("A")).unwrap_err();

    assert!(matches!(
        err,
        EngineError::Sponsor(SponsorError::SelfReference { .. })
    ));
    assert_eq!(engine.num_members(), 0, "rejected registration must not persist");
}

#[test]
fn test_unknown_sponsor_rejected() {
    let mut engine = test_engine();
    engine.register_member("R", "Root", None).unwrap();
    let err = engine.register_member("A", "Alice", Some("ghost")).unwrap_err();

    assert!(matches!(
        err,
        EngineError::Placement(PlacementError::NoSponsor(_))
    ));
    assert_eq!(engine.num_members(), 1);
    assert!(engine.member("A").is_none());
}

#[test]
fn test_duplicate_member_rejected() {
    let mut engine = test_engine();
    engine.register_member("R", "Root", None).unwrap();
    engine.register_member("A", "Alice", Some("R")).unwrap();

    let err = engine.register_member("A", "Alice again", Some("R")).unwrap_err();
    assert!(matches!(err, EngineError::DuplicateMember(_)));
    assert_eq!(engine.num_members(), 2);
}

// ============================================================================
// Sponsor vs Matrix Independence
// ============================================================================

#[test]
fn test_spilled_member_keeps_declared_sponsor() {
    let mut engine = test_engine();
    engine.register_member("R", "Root", None).unwrap();
    for i in 1..=7 {
        let id = format!("M{}", i);
        engine.register_member(&id, &id, Some("R")).unwrap();
    }

    // M7 spilled into the matrix under M1, but R stays the sponsor
    let slot = engine.placement_of("M7").unwrap();
    assert_eq!(slot.upline_id(), "M1");
    assert!(slot.is_spillover());
    assert_eq!(engine.sponsor_of("M7").unwrap().id(), "R");
    assert_eq!(engine.direct_referrals("R").len(), 7);
    assert!(engine.direct_referrals("M1").is_empty());
}

// ============================================================================
// Audit Log
// ============================================================================

#[test]
fn test_sponsor_links_are_logged() {
    let mut engine = test_engine();
    engine.register_member("R", "Root", None).unwrap();
    engine.register_member("A", "Alice", Some("R")).unwrap();
    engine.register_member("B", "Bob", Some("R")).unwrap();

    let links = engine
        .events()
        .count_where(|e| matches!(e, Event::SponsorLinked { .. }));
    assert_eq!(links, 2, "one link event per sponsored member, none for roots");

    let registered = engine
        .events()
        .count_where(|e| matches!(e, Event::MemberRegistered { .. }));
    assert_eq!(registered, 3);
}
