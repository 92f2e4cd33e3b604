//! Unified error type for the Encore server.

use encore_match::MatchError;
use encore_protocol::ProtocolError;
use encore_scoring::ScoringError;
use encore_session::SessionError;

use crate::ConfigError;

/// Errors raised by packet dispatch itself, before any handler runs.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// No live session for the request's token, or the session was
    /// evicted by a newer login.
    #[error("unauthenticated request")]
    Unauthenticated,
}

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum EncoreError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// A payload couldn't be decoded or a reply encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Login or session lookup failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A match operation was refused.
    #[error(transparent)]
    Match(#[from] MatchError),

    /// Score submission or the backing store failed.
    #[error(transparent)]
    Scoring(#[from] ScoringError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Coarse classification used by transports to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unauthenticated,
    NotFound,
    PrivilegeDenied,
    ValidationFailed,
    Conflict,
    InvalidInput,
    Internal,
}

impl EncoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Dispatch(DispatchError::Unauthenticated) => ErrorKind::Unauthenticated,
            Self::Protocol(_) => ErrorKind::InvalidInput,
            Self::Session(e) => match e {
                SessionError::AuthFailed(_) => ErrorKind::Unauthenticated,
                SessionError::Restricted(_) => ErrorKind::PrivilegeDenied,
                SessionError::NotFound(_) | SessionError::UnknownUsername(_) => ErrorKind::NotFound,
            },
            Self::Match(e) => match e {
                MatchError::NotFound(_) => ErrorKind::NotFound,
                MatchError::Full(_)
                | MatchError::WrongPassword(_)
                | MatchError::AlreadyInMatch(..) => ErrorKind::Conflict,
                MatchError::NotHost(..) => ErrorKind::PrivilegeDenied,
                MatchError::NotInMatch(..)
                | MatchError::InvalidSlot(_)
                | MatchError::SlotNotOccupied(_)
                | MatchError::SlotUnavailable(_)
                | MatchError::InvalidState { .. } => ErrorKind::InvalidInput,
            },
            Self::Scoring(e) => match e {
                ScoringError::Validation(_) => ErrorKind::ValidationFailed,
                ScoringError::UserNotFound(_) => ErrorKind::NotFound,
                ScoringError::Storage(_) | ScoringError::Rating(_) | ScoringError::Cancelled => {
                    ErrorKind::Internal
                }
            },
            Self::Config(_) => ErrorKind::Internal,
        }
    }
}
