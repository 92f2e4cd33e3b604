//! Error types for the match layer.

use encore_protocol::{MatchId, MatchStatus, UserId};

/// Errors that can occur during match operations.
///
/// Every operation checks all of its preconditions before mutating, so an
/// `Err` always means the match is exactly as it was.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    /// The match does not exist.
    #[error("match {0} not found")]
    NotFound(MatchId),

    /// No free slot left.
    #[error("match {0} is full")]
    Full(MatchId),

    /// The match has a password and the supplied one doesn't match.
    #[error("wrong password for match {0}")]
    WrongPassword(MatchId),

    /// The player already occupies a slot in this match.
    #[error("user {0} already in match {1}")]
    AlreadyInMatch(UserId, MatchId),

    /// The player doesn't occupy a slot in this match.
    #[error("user {0} not in match {1}")]
    NotInMatch(UserId, MatchId),

    /// A host-only operation was attempted by someone else.
    #[error("user {0} is not the host of match {1}")]
    NotHost(UserId, MatchId),

    /// The slot index is outside the slot table.
    #[error("slot {0} out of range")]
    InvalidSlot(usize),

    /// The operation needs an occupied slot and this one is empty.
    #[error("slot {0} is not occupied")]
    SlotNotOccupied(usize),

    /// The slot is locked, taken, or otherwise can't be used.
    #[error("slot {0} is unavailable")]
    SlotUnavailable(usize),

    /// The match status doesn't allow this operation (e.g. starting a
    /// match that's already playing).
    #[error("match {match_id} is {status}: {reason}")]
    InvalidState {
        match_id: MatchId,
        status: MatchStatus,
        reason: &'static str,
    },
}
