//! Payout Distributor
//!
//! Computes and emits the four payout components of a closed cycle:
//! cycle bonus (direct credit to the cycling member), depth bonus
//! (credits across the matrix upline chain, levels 1..=6, per-level
//! configured split), and the fidelity and top-rank pool contributions
//! (recorded as pending, distributed later by out-of-scope logic).
//!
//! # Integer Math
//!
//! All amounts are integer cents split by basis points with floor
//! division, so results are deterministic across platforms and the sum
//! of emitted legs never exceeds `base × total_bps / 10_000` (value is
//! never created by rounding).
//!
//! # Failure Semantics
//!
//! Each external call is retried with bounded exponential backoff.
//! A leg that still fails is logged as a critical audit event and
//! reported via `PayoutError::PartialFailure`; the already-recorded
//! cycle closure is NOT rolled back. This is an accepted at-least-once,
//! possibly-partial design carried over from the legacy system; a
//! stronger design would persist an outbox entry with an idempotency
//! key per leg before calling out.
//!
//! No payout component requires the recipient to have active direct
//! referrals or active status — legs are owed unconditionally.

use crate::external::{NotificationError, NotificationService, PoolType, WalletError, WalletService};
use crate::models::cycle::{ClosedCycle, PayoutBreakdown};
use crate::models::slot::MATRIX_WIDTH;
use crate::models::state::NetworkState;
use crate::models::Event;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Basis-point denominator (100% = 10_000 bps)
pub const BPS_DENOMINATOR: i64 = 10_000;

/// Notification template for cycle settlement summaries
pub const CYCLE_SETTLED_TEMPLATE: &str = "cycle_settled_v1";

/// Payout configuration: fixed base value and percentage splits
///
/// These are configuration, not logic: deployments adjust them without
/// code changes, and `validate` runs at engine startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PayoutRates {
    /// Base cycle value in cents (360.00 per the production plan)
    pub base_cycle_value: i64,

    /// Cycle bonus, basis points of base value (30%)
    pub cycle_bonus_bps: u32,

    /// Depth bonus per upline level 1..=6, basis points of base value
    /// (totals 6.81% under the default table; deliberately non-uniform)
    pub depth_bonus_bps: [u32; MATRIX_WIDTH],

    /// Fidelity pool contribution, basis points (1.25%)
    pub fidelity_pool_bps: u32,

    /// Top-rank pool contribution, basis points (4.5%)
    pub top_rank_pool_bps: u32,
}

impl Default for PayoutRates {
    fn default() -> Self {
        Self {
            base_cycle_value: 36_000,
            cycle_bonus_bps: 3_000,
            depth_bonus_bps: [200, 150, 100, 100, 81, 50],
            fidelity_pool_bps: 125,
            top_rank_pool_bps: 450,
        }
    }
}

impl PayoutRates {
    /// Sum of all configured percentages in basis points
    pub fn total_bps(&self) -> u32 {
        self.cycle_bonus_bps
            + self.depth_bonus_bps.iter().sum::<u32>()
            + self.fidelity_pool_bps
            + self.top_rank_pool_bps
    }

    /// Value accrued per filled slot (cents)
    pub fn slot_value(&self) -> i64 {
        self.base_cycle_value / MATRIX_WIDTH as i64
    }

    /// Startup invariant: percentages must not exceed 100% of base value
    pub fn validate(&self) -> Result<(), PayoutError> {
        if self.base_cycle_value <= 0 {
            return Err(PayoutError::InvalidRates(format!(
                "base_cycle_value must be positive, got {}",
                self.base_cycle_value
            )));
        }
        let total = self.total_bps();
        if total as i64 > BPS_DENOMINATOR {
            return Err(PayoutError::InvalidRates(format!(
                "configured percentages total {} bps, exceeding 10000 bps (100%)",
                total
            )));
        }
        Ok(())
    }
}

/// Compute the per-component amounts for one cycle (pure function)
///
/// Floor division per leg: fractions of a cent are dropped, never
/// redistributed, so the conservation bound holds leg by leg.
pub fn compute_breakdown(rates: &PayoutRates) -> PayoutBreakdown {
    let base = rates.base_cycle_value;
    let leg = |bps: u32| base * bps as i64 / BPS_DENOMINATOR;

    PayoutBreakdown {
        cycle_bonus: leg(rates.cycle_bonus_bps),
        depth_bonus_by_level: rates.depth_bonus_bps.map(leg),
        fidelity_pool: leg(rates.fidelity_pool_bps),
        top_rank_pool: leg(rates.top_rank_pool_bps),
    }
}

/// Bounded exponential backoff for external calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per call, first try included (3..=5 in production)
    pub max_attempts: u32,

    /// Delay before the first retry; doubles per attempt. Zero in tests.
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 50,
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        Duration::from_millis(self.base_delay_ms.saturating_mul(1u64 << (retry - 1).min(16)))
    }
}

/// One payout leg of a distribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutLeg {
    /// Leg label: `cycle_bonus`, `depth_bonus_l1`..`depth_bonus_l6`,
    /// `fidelity_pool`, `top_rank_pool`
    pub leg: String,

    /// Credit recipient (None for pool contributions)
    pub recipient: Option<String>,

    /// Amount in cents
    pub amount: i64,

    /// Attempts consumed (1 = first try succeeded)
    pub attempts: u32,

    /// Terminal error message, if the leg failed after retries
    pub error: Option<String>,
}

impl PayoutLeg {
    pub fn is_paid(&self) -> bool {
        self.error.is_none()
    }
}

/// Record of one distribution run (one per closed cycle)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutRecord {
    /// Unique record identifier (UUID)
    pub id: String,

    /// The closed cycle this distribution settles
    pub cycle_id: String,

    /// The member who cycled
    pub member_id: String,

    /// All emitted legs in emission order
    pub legs: Vec<PayoutLeg>,
}

impl PayoutRecord {
    /// Total value of successfully emitted legs (cents)
    pub fn total_paid(&self) -> i64 {
        self.legs.iter().filter(|l| l.is_paid()).map(|l| l.amount).sum()
    }

    /// Number of legs that failed after retry exhaustion
    pub fn failed_legs(&self) -> usize {
        self.legs.iter().filter(|l| !l.is_paid()).count()
    }

    /// True when every leg was emitted successfully
    pub fn is_fully_paid(&self) -> bool {
        self.failed_legs() == 0
    }
}

/// Distribution errors
#[derive(Debug, Error)]
pub enum PayoutError {
    #[error("invalid payout rates: {0}")]
    InvalidRates(String),

    /// One or more legs failed after retries. The cycle closure stands;
    /// the record is carried for manual reconciliation.
    #[error("payout for cycle {cycle_id}: {failed} of {total} legs failed after retries")]
    PartialFailure {
        cycle_id: String,
        failed: usize,
        total: usize,
        record: PayoutRecord,
    },
}

/// Emits payout legs for closed cycles via the external services
#[derive(Debug, Clone)]
pub struct Distributor {
    retry: RetryPolicy,
}

impl Distributor {
    pub fn new(retry: RetryPolicy) -> Self {
        Self { retry }
    }

    /// Distribute one closed cycle
    ///
    /// Emits the cycle bonus, the per-level depth bonuses along the
    /// matrix upline chain, both pool contributions, and one summary
    /// notification. Legs whose floor amount is zero, and depth levels
    /// above the matrix root, are skipped (not redirected).
    pub fn distribute(
        &self,
        state: &mut NetworkState,
        cycle: &ClosedCycle,
        wallet: &mut dyn WalletService,
        notifier: &mut dyn NotificationService,
    ) -> Result<PayoutRecord, PayoutError> {
        let breakdown = cycle.breakdown().clone();
        let member_id = cycle.member_id().to_string();
        let mut legs: Vec<PayoutLeg> = Vec::new();

        // Cycle bonus: direct credit to the member who cycled
        if breakdown.cycle_bonus > 0 {
            legs.push(self.credit_leg(
                state,
                wallet,
                cycle,
                "cycle_bonus",
                &member_id,
                breakdown.cycle_bonus,
            ));
        }

        // Depth bonus: levels 1..=6 up the matrix chain
        let chain = upline_chain(state, &member_id, MATRIX_WIDTH);
        for (idx, amount) in breakdown.depth_bonus_by_level.iter().enumerate() {
            let Some(upline) = chain.get(idx) else {
                break; // chain shorter than 6: unpaid levels do not exist
            };
            if *amount == 0 {
                continue;
            }
            let label = format!("depth_bonus_l{}", idx + 1);
            let upline = upline.clone();
            legs.push(self.credit_leg(state, wallet, cycle, &label, &upline, *amount));
        }

        // Pool contributions: pending, never direct credits
        for (pool, amount) in [
            (PoolType::Fidelity, breakdown.fidelity_pool),
            (PoolType::TopRank, breakdown.top_rank_pool),
        ] {
            if amount > 0 {
                legs.push(self.pool_leg(state, wallet, cycle, pool, amount, &member_id));
            }
        }

        // One summary notification for all four components
        self.send_summary(state, notifier, cycle, &breakdown, &legs);

        let record = PayoutRecord {
            id: uuid::Uuid::new_v4().to_string(),
            cycle_id: cycle.id().to_string(),
            member_id,
            legs,
        };

        if record.is_fully_paid() {
            Ok(record)
        } else {
            let failed = record.failed_legs();
            let total = record.legs.len();
            Err(PayoutError::PartialFailure {
                cycle_id: cycle.id().to_string(),
                failed,
                total,
                record,
            })
        }
    }

    fn credit_leg(
        &self,
        state: &mut NetworkState,
        wallet: &mut dyn WalletService,
        cycle: &ClosedCycle,
        label: &str,
        recipient: &str,
        amount: i64,
    ) -> PayoutLeg {
        let (attempts, outcome) =
            retry_wallet(&self.retry, || wallet.credit(recipient, amount, label));

        match &outcome {
            Ok(()) => state.log_event(Event::BonusCredited {
                seq: cycle.closed_seq(),
                member_id: recipient.to_string(),
                cycle_id: cycle.id().to_string(),
                amount,
                reason: label.to_string(),
            }),
            Err(err) => state.log_event(Event::PayoutLegFailed {
                seq: cycle.closed_seq(),
                cycle_id: cycle.id().to_string(),
                leg: label.to_string(),
                amount,
                error: err.to_string(),
            }),
        }

        PayoutLeg {
            leg: label.to_string(),
            recipient: Some(recipient.to_string()),
            amount,
            attempts,
            error: outcome.err().map(|e| e.to_string()),
        }
    }

    fn pool_leg(
        &self,
        state: &mut NetworkState,
        wallet: &mut dyn WalletService,
        cycle: &ClosedCycle,
        pool: PoolType,
        amount: i64,
        source_member_id: &str,
    ) -> PayoutLeg {
        let label = pool.to_string() + "_pool";
        let (attempts, outcome) = retry_wallet(&self.retry, || {
            wallet.record_pool_contribution(pool, amount, source_member_id)
        });

        match &outcome {
            Ok(()) => state.log_event(Event::PoolContribution {
                seq: cycle.closed_seq(),
                pool: pool.to_string(),
                cycle_id: cycle.id().to_string(),
                amount,
                source_member_id: source_member_id.to_string(),
            }),
            Err(err) => state.log_event(Event::PayoutLegFailed {
                seq: cycle.closed_seq(),
                cycle_id: cycle.id().to_string(),
                leg: label.clone(),
                amount,
                error: err.to_string(),
            }),
        }

        PayoutLeg {
            leg: label,
            recipient: None,
            amount,
            attempts,
            error: outcome.err().map(|e| e.to_string()),
        }
    }

    /// Send the settlement summary (non-monetary: a terminal failure is
    /// logged but does not mark the distribution partial)
    fn send_summary(
        &self,
        state: &mut NetworkState,
        notifier: &mut dyn NotificationService,
        cycle: &ClosedCycle,
        breakdown: &PayoutBreakdown,
        legs: &[PayoutLeg],
    ) {
        let paid_depth: i64 = legs
            .iter()
            .filter(|l| l.is_paid() && l.leg.starts_with("depth_bonus"))
            .map(|l| l.amount)
            .sum();
        let payload = json!({
            "cycle_id": cycle.id(),
            "generation": cycle.generation(),
            "base_value": cycle.base_value(),
            "cycle_bonus": breakdown.cycle_bonus,
            "depth_bonus_paid": paid_depth,
            "fidelity_pool": breakdown.fidelity_pool,
            "top_rank_pool": breakdown.top_rank_pool,
        });

        let mut outcome = notifier.notify(cycle.member_id(), CYCLE_SETTLED_TEMPLATE, &payload);
        let mut retry = 1;
        while let Err(NotificationError::Transient(_)) = outcome {
            if retry >= self.retry.max_attempts {
                break;
            }
            std::thread::sleep(self.retry.delay_for(retry));
            outcome = notifier.notify(cycle.member_id(), CYCLE_SETTLED_TEMPLATE, &payload);
            retry += 1;
        }

        match outcome {
            Ok(()) => state.log_event(Event::NotificationSent {
                seq: cycle.closed_seq(),
                member_id: cycle.member_id().to_string(),
                template_id: CYCLE_SETTLED_TEMPLATE.to_string(),
            }),
            Err(err) => state.log_event(Event::PayoutLegFailed {
                seq: cycle.closed_seq(),
                cycle_id: cycle.id().to_string(),
                leg: "notification".to_string(),
                amount: 0,
                error: err.to_string(),
            }),
        }
    }
}

/// Retry a wallet call per policy: transient errors back off and retry,
/// permanent errors stop immediately
fn retry_wallet(
    policy: &RetryPolicy,
    mut call: impl FnMut() -> Result<(), WalletError>,
) -> (u32, Result<(), WalletError>) {
    let mut attempts = 1;
    let mut outcome = call();

    while let Err(WalletError::Transient(_)) = outcome {
        if attempts >= policy.max_attempts {
            break;
        }
        std::thread::sleep(policy.delay_for(attempts));
        outcome = call();
        attempts += 1;
    }

    (attempts, outcome)
}

/// Walk the matrix upline chain from a member, at most `depth` levels
fn upline_chain(state: &NetworkState, member_id: &str, depth: usize) -> Vec<String> {
    let mut chain = Vec::with_capacity(depth);
    let mut current = member_id.to_string();

    for _ in 0..depth {
        match state.placement(&current) {
            Some(slot) => {
                chain.push(slot.upline_id().to_string());
                current = slot.upline_id().to_string();
            }
            None => break,
        }
    }
    chain
}
