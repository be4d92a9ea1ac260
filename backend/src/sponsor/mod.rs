//! Sponsor Tree Store
//!
//! Persists and queries the unilevel (direct-referral) sponsor
//! relationship. The sponsor structure is a forest: multiple root
//! members with no sponsor are allowed, every other member has exactly
//! one sponsor.
//!
//! # Critical Invariants
//!
//! - **Acyclicity**: a member can never sponsor one of its own
//!   ancestors; violations abort the operation and leave the tree
//!   untouched
//! - **Referral FIFO**: direct referrals are ordered by join sequence —
//!   this ordering is load-bearing, it drives spillover order in the
//!   placement engine
//! - **Single link**: re-linking to a different sponsor is an explicit
//!   error, never a silent overwrite (silent re-links are how the
//!   legacy data got corrupted)

use crate::models::member::Member;
use crate::models::state::NetworkState;
use crate::models::Event;
use thiserror::Error;

/// Sponsor-tree integrity errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SponsorError {
    #[error("member {member_id} cannot sponsor themselves")]
    SelfReference { member_id: String },

    #[error("sponsor {sponsor_id} is a descendant of {member_id}; linking would create a cycle")]
    CycleDetected {
        member_id: String,
        sponsor_id: String,
    },

    #[error("member {member_id} is already sponsored by {existing_sponsor_id}")]
    ConflictingSponsor {
        member_id: String,
        existing_sponsor_id: String,
    },

    #[error("unknown member: {0}")]
    UnknownMember(String),
}

/// Record the unilevel sponsor link for a member
///
/// Idempotent when the identical link already exists. Fails with
/// `SelfReference` for self-sponsorship, `CycleDetected` when the
/// sponsor is a descendant of the member, and `ConflictingSponsor` when
/// a different link already exists. The tree is unchanged on any error.
pub fn set_sponsor(
    state: &mut NetworkState,
    member_id: &str,
    sponsor_id: &str,
) -> Result<(), SponsorError> {
    if member_id == sponsor_id {
        return Err(SponsorError::SelfReference {
            member_id: member_id.to_string(),
        });
    }

    let member = state
        .member(member_id)
        .ok_or_else(|| SponsorError::UnknownMember(member_id.to_string()))?;
    let member_seq = member.joined_seq();
    if state.member(sponsor_id).is_none() {
        return Err(SponsorError::UnknownMember(sponsor_id.to_string()));
    }

    if let Some(existing) = state.sponsor_id_of(member_id) {
        if existing == sponsor_id {
            return Ok(()); // idempotent
        }
        return Err(SponsorError::ConflictingSponsor {
            member_id: member_id.to_string(),
            existing_sponsor_id: existing.to_string(),
        });
    }

    if is_descendant(state, sponsor_id, member_id) {
        return Err(SponsorError::CycleDetected {
            member_id: member_id.to_string(),
            sponsor_id: sponsor_id.to_string(),
        });
    }

    state.record_sponsor_link(member_id, sponsor_id);
    state.log_event(Event::SponsorLinked {
        seq: member_seq,
        member_id: member_id.to_string(),
        sponsor_id: sponsor_id.to_string(),
    });
    Ok(())
}

/// Immediate sponsor of a member, or None for roots
pub fn sponsor_of<'a>(state: &'a NetworkState, member_id: &str) -> Option<&'a Member> {
    state
        .sponsor_id_of(member_id)
        .and_then(|sponsor_id| state.member(sponsor_id))
}

/// Direct referrals of a member, FIFO by join sequence
pub fn direct_referrals<'a>(state: &'a NetworkState, member_id: &str) -> Vec<&'a Member> {
    state
        .referral_ids(member_id)
        .iter()
        .filter_map(|id| state.member(id))
        .collect()
}

/// Check whether `candidate` sits somewhere below `ancestor` in the
/// unilevel tree
///
/// Iterative frontier expansion over the referral lists; no recursion,
/// so arbitrarily deep trees cannot exhaust the stack.
pub fn is_descendant(state: &NetworkState, candidate: &str, ancestor: &str) -> bool {
    let mut frontier: Vec<&str> = state.referral_ids(ancestor).iter().map(|s| s.as_str()).collect();

    while let Some(current) = frontier.pop() {
        if current == candidate {
            return true;
        }
        frontier.extend(state.referral_ids(current).iter().map(|s| s.as_str()));
    }
    false
}
