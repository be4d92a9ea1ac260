//! Member model
//!
//! A network participant. Members are created on registration and are
//! never hard-deleted: deactivation flips the status flag only.
//!
//! The `joined_seq` field is the engine-assigned join sequence number.
//! It is the FIFO tie-break everywhere ordering matters (referral order,
//! spillover order), replacing the creation timestamp of the legacy
//! data model with a value that is deterministic under replay.

use serde::{Deserialize, Serialize};

/// Member activity status
///
/// Members are soft-deactivated only; no bonus rule in this engine
/// inspects status (payout legs are owed regardless of activity).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    Active,
    Inactive,
}

/// A participant in the referral network
///
/// # Example
/// ```
/// use matrix_engine_core_rs::models::Member;
///
/// let member = Member::new("M001".to_string(), "Alice".to_string(), 1);
/// assert!(member.is_active());
/// assert_eq!(member.joined_seq(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    /// Unique member identifier
    id: String,

    /// Display name (informational only)
    display_name: String,

    /// Current status
    status: MemberStatus,

    /// Join sequence number, assigned monotonically at registration
    joined_seq: u64,
}

impl Member {
    /// Create a new active member
    ///
    /// # Panics
    /// Panics if `id` is empty.
    pub fn new(id: String, display_name: String, joined_seq: u64) -> Self {
        assert!(!id.is_empty(), "member id must not be empty");
        Self {
            id,
            display_name,
            status: MemberStatus::Active,
            joined_seq,
        }
    }

    /// Get member ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get display name
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Get current status
    pub fn status(&self) -> MemberStatus {
        self.status
    }

    /// Check if member is active
    pub fn is_active(&self) -> bool {
        self.status == MemberStatus::Active
    }

    /// Get join sequence number
    pub fn joined_seq(&self) -> u64 {
        self.joined_seq
    }

    /// Set status (idempotent)
    pub fn set_status(&mut self, status: MemberStatus) {
        self.status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_member_is_active() {
        let member = Member::new("M1".to_string(), "Alice".to_string(), 1);
        assert!(member.is_active());
        assert_eq!(member.id(), "M1");
        assert_eq!(member.display_name(), "Alice");
    }

    #[test]
    fn test_deactivate_is_soft() {
        let mut member = Member::new("M1".to_string(), "Alice".to_string(), 1);
        member.set_status(MemberStatus::Inactive);
        assert!(!member.is_active());

        // Reactivation is allowed
        member.set_status(MemberStatus::Active);
        assert!(member.is_active());
    }

    #[test]
    #[should_panic(expected = "member id must not be empty")]
    fn test_empty_id_panics() {
        Member::new(String::new(), "Alice".to_string(), 1);
    }
}
