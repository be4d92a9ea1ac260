//! External collaborator ports
//!
//! The engine's side effects go through narrow trait seams: a
//! wallet/ledger service for credits and pool contributions, a
//! notification service for settlement summaries, and a member
//! directory for existence/status lookups. Production deployments adapt
//! their RPC clients behind these traits; this crate ships recording
//! implementations used by the integration tests and the CLI runner
//! (the same pattern as shipping a mock policy for test wiring).

use crate::models::member::MemberStatus;
use crate::models::state::NetworkState;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

/// Shared accumulation pools funded by closed cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolType {
    /// Monthly fidelity pool
    Fidelity,
    /// Ranking-based pool
    TopRank,
}

impl fmt::Display for PoolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolType::Fidelity => write!(f, "fidelity"),
            PoolType::TopRank => write!(f, "top_rank"),
        }
    }
}

/// Wallet/ledger call failures
///
/// Transient failures are retried with backoff; permanent failures are
/// not retried.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WalletError {
    #[error("transient wallet failure: {0}")]
    Transient(String),

    #[error("permanent wallet failure: {0}")]
    Permanent(String),
}

/// Notification call failures
#[derive(Debug, Clone, Error, PartialEq)]
pub enum NotificationError {
    #[error("transient notification failure: {0}")]
    Transient(String),

    #[error("permanent notification failure: {0}")]
    Permanent(String),
}

/// External wallet/ledger service
pub trait WalletService {
    /// Direct credit to a member's wallet
    fn credit(&mut self, member_id: &str, amount: i64, reason: &str) -> Result<(), WalletError>;

    /// Record a pending pool contribution (not an immediate payout)
    fn record_pool_contribution(
        &mut self,
        pool: PoolType,
        amount: i64,
        source_member_id: &str,
    ) -> Result<(), WalletError>;
}

/// External notification/messaging service
pub trait NotificationService {
    fn notify(
        &mut self,
        member_id: &str,
        template_id: &str,
        payload: &serde_json::Value,
    ) -> Result<(), NotificationError>;
}

/// Member existence/status lookups
///
/// The engine's own state is the in-process implementation; deployments
/// fronted by an external directory adapt their client here.
pub trait MemberDirectory {
    fn member_exists(&self, member_id: &str) -> bool;
    fn member_status(&self, member_id: &str) -> Option<MemberStatus>;
}

impl MemberDirectory for NetworkState {
    fn member_exists(&self, member_id: &str) -> bool {
        self.member(member_id).is_some()
    }

    fn member_status(&self, member_id: &str) -> Option<MemberStatus> {
        self.member(member_id).map(|m| m.status())
    }
}

// ============================================================================
// Recording implementations (tests, CLI)
// ============================================================================

/// A wallet credit captured by [`RecordingWallet`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCredit {
    pub member_id: String,
    pub amount: i64,
    pub reason: String,
}

/// A pool contribution captured by [`RecordingWallet`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedContribution {
    pub pool: PoolType,
    pub amount: i64,
    pub source_member_id: String,
}

/// In-memory wallet that records every call and never fails
#[derive(Debug, Clone, Default)]
pub struct RecordingWallet {
    pub credits: Vec<RecordedCredit>,
    pub contributions: Vec<RecordedContribution>,
}

impl RecordingWallet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total credited to one member (cents)
    pub fn balance_of(&self, member_id: &str) -> i64 {
        self.credits
            .iter()
            .filter(|c| c.member_id == member_id)
            .map(|c| c.amount)
            .sum()
    }

    /// Total contributed to one pool (cents)
    pub fn pool_total(&self, pool: PoolType) -> i64 {
        self.contributions
            .iter()
            .filter(|c| c.pool == pool)
            .map(|c| c.amount)
            .sum()
    }
}

impl WalletService for RecordingWallet {
    fn credit(&mut self, member_id: &str, amount: i64, reason: &str) -> Result<(), WalletError> {
        self.credits.push(RecordedCredit {
            member_id: member_id.to_string(),
            amount,
            reason: reason.to_string(),
        });
        Ok(())
    }

    fn record_pool_contribution(
        &mut self,
        pool: PoolType,
        amount: i64,
        source_member_id: &str,
    ) -> Result<(), WalletError> {
        self.contributions.push(RecordedContribution {
            pool,
            amount,
            source_member_id: source_member_id.to_string(),
        });
        Ok(())
    }
}

/// Wallet that fails a configured number of calls before succeeding
///
/// Used to exercise the distributor's retry path. Failures can be
/// transient (retried) or permanent (not retried).
#[derive(Debug, Default)]
pub struct FlakyWallet {
    inner: RecordingWallet,
    failures_remaining: u32,
    permanent: bool,
    pub attempts: u32,
}

impl FlakyWallet {
    /// Fail the next `failures` calls with transient errors
    pub fn transient(failures: u32) -> Self {
        Self {
            inner: RecordingWallet::new(),
            failures_remaining: failures,
            permanent: false,
            attempts: 0,
        }
    }

    /// Fail the next `failures` calls with permanent errors
    pub fn permanent(failures: u32) -> Self {
        Self {
            inner: RecordingWallet::new(),
            failures_remaining: failures,
            permanent: true,
            attempts: 0,
        }
    }

    pub fn recorded(&self) -> &RecordingWallet {
        &self.inner
    }

    fn maybe_fail(&mut self) -> Result<(), WalletError> {
        self.attempts += 1;
        if self.failures_remaining > 0 {
            self.failures_remaining -= 1;
            return if self.permanent {
                Err(WalletError::Permanent("injected failure".to_string()))
            } else {
                Err(WalletError::Transient("injected failure".to_string()))
            };
        }
        Ok(())
    }
}

impl WalletService for FlakyWallet {
    fn credit(&mut self, member_id: &str, amount: i64, reason: &str) -> Result<(), WalletError> {
        self.maybe_fail()?;
        self.inner.credit(member_id, amount, reason)
    }

    fn record_pool_contribution(
        &mut self,
        pool: PoolType,
        amount: i64,
        source_member_id: &str,
    ) -> Result<(), WalletError> {
        self.maybe_fail()?;
        self.inner.record_pool_contribution(pool, amount, source_member_id)
    }
}

/// In-memory notifier that records every notification
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    pub sent: Vec<(String, String, serde_json::Value)>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NotificationService for RecordingNotifier {
    fn notify(
        &mut self,
        member_id: &str,
        template_id: &str,
        payload: &serde_json::Value,
    ) -> Result<(), NotificationError> {
        self.sent
            .push((member_id.to_string(), template_id.to_string(), payload.clone()));
        Ok(())
    }
}

/// Cloneable handle over a [`RecordingWallet`]
///
/// The engine takes ownership of its wallet box; tests and the CLI keep
/// a second handle to inspect what was credited.
#[derive(Debug, Clone, Default)]
pub struct SharedWallet(Rc<RefCell<RecordingWallet>>);

impl SharedWallet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, member_id: &str) -> i64 {
        self.0.borrow().balance_of(member_id)
    }

    pub fn pool_total(&self, pool: PoolType) -> i64 {
        self.0.borrow().pool_total(pool)
    }

    pub fn credits(&self) -> Vec<RecordedCredit> {
        self.0.borrow().credits.clone()
    }

    pub fn contributions(&self) -> Vec<RecordedContribution> {
        self.0.borrow().contributions.clone()
    }
}

impl WalletService for SharedWallet {
    fn credit(&mut self, member_id: &str, amount: i64, reason: &str) -> Result<(), WalletError> {
        self.0.borrow_mut().credit(member_id, amount, reason)
    }

    fn record_pool_contribution(
        &mut self,
        pool: PoolType,
        amount: i64,
        source_member_id: &str,
    ) -> Result<(), WalletError> {
        self.0
            .borrow_mut()
            .record_pool_contribution(pool, amount, source_member_id)
    }
}

/// Cloneable handle over a [`RecordingNotifier`]
#[derive(Debug, Clone, Default)]
pub struct SharedNotifier(Rc<RefCell<RecordingNotifier>>);

impl SharedNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(String, String, serde_json::Value)> {
        self.0.borrow().sent.clone()
    }
}

impl NotificationService for SharedNotifier {
    fn notify(
        &mut self,
        member_id: &str,
        template_id: &str,
        payload: &serde_json::Value,
    ) -> Result<(), NotificationError> {
        self.0.borrow_mut().notify(member_id, template_id, payload)
    }
}
