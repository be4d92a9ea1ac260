//! Engine Integration Tests
//!
//! End-to-end registration cascades: sponsor link, matrix placement,
//! cycle closing, and payout distribution in one call, with the audit
//! log and wallet observed from outside.

use matrix_engine_core_rs::{
    EngineConfig, Event, MatrixEngine, MemberStatus, PoolType, RetryPolicy, SharedNotifier,
    SharedWallet,
};

// ============================================================================
// Test Helpers
// ============================================================================

fn shared_engine() -> (MatrixEngine, SharedWallet, SharedNotifier) {
    let wallet = SharedWallet::new();
    let notifier = SharedNotifier::new();
    let engine = MatrixEngine::new(
        EngineConfig {
            retry: RetryPolicy {
                max_attempts: 2,
                base_delay_ms: 0,
            },
            ..EngineConfig::default()
        },
        Box::new(wallet.clone()),
        Box::new(notifier.clone()),
    )
    .expect("default config must be valid");
    (engine, wallet, notifier)
}

// ============================================================================
// Full Cascade
// ============================================================================

#[test]
fn test_first_cycle_end_to_end() {
    let (mut engine, wallet, notifier) = shared_engine();
    engine.register_member("R", "Root", None).unwrap();

    for i in 1..=5 {
        let id = format!("M{}", i);
        let report = engine.register_member(&id, &id, Some("R")).unwrap();
        assert!(report.closed_cycle.is_none());
        assert!(report.payout.is_none());
    }

    let report = engine.register_member("M6", "M6", Some("R")).unwrap();
    let cycle = report.closed_cycle.expect("sixth placement closes R's cycle");
    let payout = report.payout.expect("closure triggers distribution");

    assert_eq!(cycle.member_id(), "R");
    assert!(payout.is_fully_paid());
    assert_eq!(report.failed_payout_legs, 0);

    // Money landed where the plan says
    assert_eq!(wallet.balance_of("R"), 10_800);
    assert_eq!(wallet.pool_total(PoolType::Fidelity), 450);
    assert_eq!(wallet.pool_total(PoolType::TopRank), 1_620);
    assert_eq!(notifier.sent().len(), 1);
}

#[test]
fn test_seven_member_scenario_event_counts() {
    let (mut engine, _wallet, _notifier) = shared_engine();
    engine.register_member("R", "Root", None).unwrap();
    for i in 1..=7 {
        let id = format!("M{}", i);
        engine.register_member(&id, &id, Some("R")).unwrap();
    }

    let events = engine.events();
    assert_eq!(
        events.count_where(|e| matches!(e, Event::MemberRegistered { .. })),
        8
    );
    assert_eq!(
        events.count_where(|e| matches!(e, Event::SponsorLinked { .. })),
        7
    );
    assert_eq!(
        events.count_where(|e| matches!(e, Event::SlotFilled { .. })),
        7,
        "roots are not placed"
    );
    assert_eq!(
        events.count_where(|e| matches!(e, Event::SlotFilled { spillover: true, .. })),
        1,
        "only M7 spilled"
    );
    assert_eq!(
        events.count_where(|e| matches!(e, Event::CycleClosed { .. })),
        1
    );
}

#[test]
fn test_two_level_network_settles_seven_cycles() {
    let (mut engine, wallet, _notifier) = shared_engine();
    engine.register_member("R", "Root", None).unwrap();

    // 6 children then 36 spillovers: every row in the first two levels
    // fills, so R and all six children cycle
    for i in 1..=42 {
        let id = format!("M{}", i);
        engine.register_member(&id, &id, Some("R")).unwrap();
    }

    assert_eq!(engine.closed_cycles().len(), 7);
    assert_eq!(engine.num_members(), 43);

    // Each child earned a cycle bonus; R earned one cycle bonus plus
    // six level-1 depth bonuses (one per child cycle)
    for i in 1..=6 {
        let id = format!("M{}", i);
        assert_eq!(wallet.balance_of(&id), 10_800, "{} cycled exactly once", id);
    }
    assert_eq!(wallet.balance_of("R"), 10_800 + 6 * 720);
    assert_eq!(wallet.pool_total(PoolType::Fidelity), 7 * 450);
    assert_eq!(wallet.pool_total(PoolType::TopRank), 7 * 1_620);
}

// ============================================================================
// Status and Queries
// ============================================================================

#[test]
fn test_status_change_does_not_touch_the_matrix() {
    let (mut engine, _wallet, _notifier) = shared_engine();
    engine.register_member("R", "Root", None).unwrap();
    engine.register_member("A", "Alice", Some("R")).unwrap();

    engine.set_member_status("A", MemberStatus::Inactive).unwrap();

    assert!(!engine.member("A").unwrap().is_active());
    assert!(engine.placement_of("A").is_some(), "slots are permanent");
    assert_eq!(engine.sponsor_of("A").unwrap().id(), "R");

    // Reactivation is the same soft switch
    engine.set_member_status("A", MemberStatus::Active).unwrap();
    assert!(engine.member("A").unwrap().is_active());
}

#[test]
fn test_inactive_members_still_receive_payouts() {
    let (mut engine, wallet, _notifier) = shared_engine();
    engine.register_member("R", "Root", None).unwrap();
    engine.set_member_status("R", MemberStatus::Inactive).unwrap();

    for i in 1..=6 {
        let id = format!("M{}", i);
        engine.register_member(&id, &id, Some("R")).unwrap();
    }

    // Legs are owed unconditionally; eligibility filtering is a program
    // rule applied outside the settlement engine
    assert_eq!(wallet.balance_of("R"), 10_800);
}

#[test]
fn test_matrix_children_query_reports_position_pairs() {
    let (mut engine, _wallet, _notifier) = shared_engine();
    engine.register_member("R", "Root", None).unwrap();
    engine.register_member("A", "Alice", Some("R")).unwrap();
    engine.register_member("B", "Bob", Some("R")).unwrap();

    let children = engine.matrix_children("R");
    assert_eq!(children, vec![(1, "A"), (2, "B")]);
    assert!(engine.matrix_children("A").is_empty());
}
