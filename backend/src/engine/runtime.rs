//! Matrix engine runtime
//!
//! The `MatrixEngine` owns the network state and coordinates one
//! registration cascade:
//!
//! ```text
//! register_member
//!   └─ sponsor::set_sponsor        (unilevel link, acyclicity checked)
//!   └─ placement::place_member     (breadth-first vacancy search)
//!   └─ cycle::on_slot_filled       (6th slot → ClosedCycle)
//!        └─ Distributor::distribute (wallet credits, pool legs, notify)
//! ```
//!
//! # Concurrency
//!
//! Every mutating call takes `&mut self`: a registration and its
//! resulting cascade execute as one exclusive critical section, so a
//! slot can never be double-filled and a cycle can never close twice.
//! Deployments that move the state into a shared store must reproduce
//! this with per-upline-chain serialization (advisory or row locks);
//! application-level best-effort checks are not sufficient.
//!
//! # Error posture
//!
//! Integrity violations (`CycleDetected`, `SelfReference`,
//! `MatrixFull`, conflicting re-links) abort the whole registration and
//! surface to the operator. There is deliberately no fallback placement:
//! the legacy system's worst incidents came from silently placing
//! members under the root when a search failed.

use crate::cycle;
use crate::external::{NotificationService, WalletService};
use crate::models::cycle::{ClosedCycle, CycleAccumulator, CycleError};
use crate::models::member::{Member, MemberStatus};
use crate::models::slot::MatrixSlot;
use crate::models::state::NetworkState;
use crate::models::{Event, EventLog};
use crate::payout::{Distributor, PayoutError, PayoutRates, PayoutRecord, RetryPolicy};
use crate::placement::{self, PlacementError, DEFAULT_MAX_SEARCH_DEPTH};
use crate::sponsor::{self, SponsorError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Configuration
// ============================================================================

/// Complete engine configuration
///
/// Payout percentages and the base cycle value are configuration, not
/// logic; `validate` enforces the startup invariants (percentage total
/// within 100%, sane depth bound).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Depth bound for the placement vacancy search
    pub max_search_depth: usize,

    /// Payout percentages and base cycle value
    pub rates: PayoutRates,

    /// Retry/backoff policy for external wallet and notification calls
    pub retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_search_depth: DEFAULT_MAX_SEARCH_DEPTH,
            rates: PayoutRates::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Validate startup invariants
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.max_search_depth == 0 {
            return Err(EngineError::InvalidConfig(
                "max_search_depth must be at least 1".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(EngineError::InvalidConfig(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        self.rates
            .validate()
            .map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
        Ok(())
    }
}

// ============================================================================
// Errors & reports
// ============================================================================

/// Engine-level error taxonomy
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("member already registered: {0}")]
    DuplicateMember(String),

    #[error("unknown member: {0}")]
    UnknownMember(String),

    #[error(transparent)]
    Sponsor(#[from] SponsorError),

    #[error(transparent)]
    Placement(#[from] PlacementError),

    #[error(transparent)]
    Cycle(#[from] CycleError),

    #[error("snapshot error: {0}")]
    Snapshot(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Outcome of one member registration
///
/// `failed_payout_legs` is the operator alert surface for partial
/// payouts: the registration and the cycle closure stand, the listed
/// legs need manual reconciliation (detail in the event log).
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationReport {
    pub member_id: String,

    /// Matrix slot resolved for the member (None for roots)
    pub slot: Option<MatrixSlot>,

    /// True when the member spilled past their declared sponsor
    pub spillover: bool,

    /// Cycle closed by this placement, if any
    pub closed_cycle: Option<ClosedCycle>,

    /// Distribution record for the closed cycle, if any
    pub payout: Option<PayoutRecord>,

    /// Payout legs that failed after retry exhaustion
    pub failed_payout_legs: usize,
}

// ============================================================================
// Engine
// ============================================================================

/// Matrix placement & cycle settlement engine
///
/// Owns all network state; all mutation goes through its methods. The
/// wallet and notification services are injected collaborators.
///
/// # Example
/// ```
/// use matrix_engine_core_rs::engine::{EngineConfig, MatrixEngine};
/// use matrix_engine_core_rs::external::{RecordingNotifier, RecordingWallet};
///
/// let mut engine = MatrixEngine::new(
///     EngineConfig::default(),
///     Box::new(RecordingWallet::new()),
///     Box::new(RecordingNotifier::new()),
/// ).unwrap();
///
/// engine.register_member("ROOT", "Root", None).unwrap();
/// let report = engine.register_member("M1", "First", Some("ROOT")).unwrap();
/// assert_eq!(report.slot.unwrap().position(), 1);
/// ```
pub struct MatrixEngine {
    state: NetworkState,
    config: EngineConfig,
    distributor: Distributor,
    wallet: Box<dyn WalletService>,
    notifier: Box<dyn NotificationService>,
}

impl MatrixEngine {
    /// Create an engine with validated configuration
    pub fn new(
        config: EngineConfig,
        wallet: Box<dyn WalletService>,
        notifier: Box<dyn NotificationService>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let distributor = Distributor::new(config.retry.clone());
        Ok(Self {
            state: NetworkState::new(),
            config,
            distributor,
            wallet,
            notifier,
        })
    }

    /// Rebuild an engine around restored state (see `checkpoint`)
    pub(crate) fn with_state(
        state: NetworkState,
        config: EngineConfig,
        wallet: Box<dyn WalletService>,
        notifier: Box<dyn NotificationService>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let distributor = Distributor::new(config.retry.clone());
        Ok(Self {
            state,
            config,
            distributor,
            wallet,
            notifier,
        })
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Register a member and run the full placement cascade
    ///
    /// Roots pass `sponsor = None`: they anchor the matrix and are not
    /// placed. Everyone else gets a sponsor link, a matrix slot, and —
    /// when their placement completes an upline's 6th slot — triggers
    /// the cycle settlement synchronously.
    ///
    /// Sponsor-side errors are checked before the member record is
    /// created, so a rejected registration leaves nothing behind. A
    /// `MatrixFull` alarm halts onboarding with the member registered
    /// but unplaced — surfaced to the operator, never worked around
    /// with a fallback slot.
    pub fn register_member(
        &mut self,
        member_id: &str,
        display_name: &str,
        sponsor_id: Option<&str>,
    ) -> Result<RegistrationReport, EngineError> {
        if self.state.member(member_id).is_some() {
            return Err(EngineError::DuplicateMember(member_id.to_string()));
        }
        // Validate the sponsor before creating the member so a failed
        // registration leaves no partial state behind
        if let Some(sponsor) = sponsor_id {
            if sponsor == member_id {
                return Err(EngineError::Sponsor(SponsorError::SelfReference {
                    member_id: member_id.to_string(),
                }));
            }
            if self.state.member(sponsor).is_none() {
                return Err(EngineError::Placement(PlacementError::NoSponsor(
                    sponsor.to_string(),
                )));
            }
        }

        let seq = self.state.add_member(member_id, display_name);
        self.state.log_event(Event::MemberRegistered {
            seq,
            member_id: member_id.to_string(),
            display_name: display_name.to_string(),
        });

        let Some(sponsor) = sponsor_id else {
            return Ok(RegistrationReport {
                member_id: member_id.to_string(),
                slot: None,
                spillover: false,
                closed_cycle: None,
                payout: None,
                failed_payout_legs: 0,
            });
        };

        sponsor::set_sponsor(&mut self.state, member_id, sponsor)?;
        let slot = placement::place_member(
            &mut self.state,
            member_id,
            sponsor,
            self.config.max_search_depth,
        )?;

        let closed =
            cycle::on_slot_filled(&mut self.state, slot.upline_id(), &self.config.rates)?;

        let (payout, failed_legs) = match &closed {
            Some(cycle) => match self.distributor.distribute(
                &mut self.state,
                cycle,
                self.wallet.as_mut(),
                self.notifier.as_mut(),
            ) {
                Ok(record) => (Some(record), 0),
                // Partial payout: alert, but the cycle closure stands
                Err(PayoutError::PartialFailure { record, failed, .. }) => {
                    (Some(record), failed)
                }
                Err(PayoutError::InvalidRates(msg)) => {
                    return Err(EngineError::InvalidConfig(msg))
                }
            },
            None => (None, 0),
        };

        Ok(RegistrationReport {
            member_id: member_id.to_string(),
            spillover: slot.is_spillover(),
            slot: Some(slot),
            closed_cycle: closed,
            payout,
            failed_payout_legs: failed_legs,
        })
    }

    /// Change a member's status (soft activation/deactivation)
    pub fn set_member_status(
        &mut self,
        member_id: &str,
        status: MemberStatus,
    ) -> Result<(), EngineError> {
        let member = self
            .state
            .member_mut(member_id)
            .ok_or_else(|| EngineError::UnknownMember(member_id.to_string()))?;
        if member.status() == status {
            return Ok(()); // idempotent
        }
        let seq = member.joined_seq();
        member.set_status(status);
        self.state.log_event(Event::StatusChanged {
            seq,
            member_id: member_id.to_string(),
            active: status == MemberStatus::Active,
        });
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Get a member
    pub fn member(&self, member_id: &str) -> Option<&Member> {
        self.state.member(member_id)
    }

    /// Number of registered members
    pub fn num_members(&self) -> usize {
        self.state.num_members()
    }

    /// Immediate unilevel sponsor
    pub fn sponsor_of(&self, member_id: &str) -> Option<&Member> {
        sponsor::sponsor_of(&self.state, member_id)
    }

    /// Direct referrals, FIFO by join order
    pub fn direct_referrals(&self, member_id: &str) -> Vec<&Member> {
        sponsor::direct_referrals(&self.state, member_id)
    }

    /// Occupied matrix slots directly under an upline, in position order
    pub fn matrix_children(&self, upline_id: &str) -> Vec<(u8, &str)> {
        self.state
            .matrix_children(upline_id)
            .iter()
            .enumerate()
            .filter_map(|(idx, occ)| occ.as_deref().map(|id| ((idx + 1) as u8, id)))
            .collect()
    }

    /// The matrix slot a member occupies
    pub fn placement_of(&self, member_id: &str) -> Option<&MatrixSlot> {
        self.state.placement(member_id)
    }

    /// A member's cycle accumulator
    pub fn accumulator(&self, member_id: &str) -> Option<&CycleAccumulator> {
        self.state.accumulator(member_id)
    }

    /// The closed-cycle ledger
    pub fn closed_cycles(&self) -> &[ClosedCycle] {
        self.state.closed_cycles()
    }

    /// The audit log
    pub fn events(&self) -> &EventLog {
        self.state.events()
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Read-only view of the full state (snapshots, diagnostics)
    pub fn state(&self) -> &NetworkState {
        &self.state
    }
}
