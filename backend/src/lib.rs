//! Matrix Engine Core - Rust Engine
//!
//! Matrix placement and cycle settlement engine for a 1×6 forced-matrix
//! referral network with deterministic, auditable settlement.
//!
//! # Architecture
//!
//! - **models**: Domain types (Member, MatrixSlot, CycleAccumulator, State)
//! - **sponsor**: Unilevel sponsor tree store
//! - **placement**: Breadth-first matrix placement with spillover
//! - **cycle**: Cycle detection and closing
//! - **payout**: Basis-point payout math and the retrying distributor
//! - **external**: Wallet/notification trait seams and recording impls
//! - **engine**: The MatrixEngine facade and snapshot checkpointing
//!
//! # Critical Invariants
//!
//! 1. All money values are i64 (cents); payout splits use integer
//!    basis-point math with floor division
//! 2. The sponsor tree is append-mostly and always acyclic
//! 3. A member occupies at most one matrix slot, ever
//! 4. A cycle closes exactly once per generation; the ledger is
//!    append-only

// Module declarations
pub mod cycle;
pub mod engine;
pub mod external;
pub mod models;
pub mod payout;
pub mod placement;
pub mod sponsor;

// Re-exports for convenience
pub use engine::{
    compute_config_hash, validate_snapshot, EngineConfig, EngineError, MatrixEngine,
    RegistrationReport, StateSnapshot,
};
pub use external::{
    FlakyWallet, MemberDirectory, NotificationError, NotificationService, PoolType,
    RecordingNotifier, RecordingWallet, SharedNotifier, SharedWallet, WalletError, WalletService,
};
pub use models::{
    ClosedCycle, CycleAccumulator, CyclePhase, Event, EventLog, MatrixSlot, Member, MemberStatus,
    NetworkState, PayoutBreakdown, MATRIX_WIDTH,
};
pub use payout::{Distributor, PayoutError, PayoutRates, PayoutRecord, RetryPolicy};
pub use placement::{PlacementError, DEFAULT_MAX_SEARCH_DEPTH};
pub use sponsor::SponsorError;

// FFI module (when feature enabled)
#[cfg(feature = "pyo3")]
pub mod ffi;

// PyO3 exports (when feature enabled)
#[cfg(feature = "pyo3")]
use pyo3::prelude::*;

#[cfg(feature = "pyo3")]
#[pymodule]
fn matrix_engine_core_rs(_py: Python<'_>, m: &PyModule) -> PyResult<()> {
    m.add_class::<ffi::PyMatrixEngine>()?;
    Ok(())
}
