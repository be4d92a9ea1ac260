//! Domain models for the matrix network engine

pub mod cycle;
pub mod event;
pub mod member;
pub mod slot;
pub mod state;

pub use cycle::{ClosedCycle, CycleAccumulator, CyclePhase, PayoutBreakdown};
pub use event::{Event, EventLog};
pub use member::{Member, MemberStatus};
pub use slot::{MatrixSlot, MATRIX_WIDTH};
pub use state::NetworkState;
