//! Engine orchestration
//!
//! - **runtime**: the `MatrixEngine` facade owning all state and wiring
//!   the sponsor store, placement engine, cycle closer, and payout
//!   distributor into one registration cascade
//! - **checkpoint**: snapshot save/restore with config hashing and
//!   structural integrity validation

pub mod checkpoint;
mod runtime;

pub use checkpoint::{compute_config_hash, validate_snapshot, StateSnapshot};
pub use runtime::{EngineConfig, EngineError, MatrixEngine, RegistrationReport};
