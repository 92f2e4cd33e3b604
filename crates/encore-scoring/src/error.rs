//! Error types for the scoring layer.

use std::fmt;

use encore_protocol::{Mods, UserId};

/// Why a submission failed validation. Each variant names one check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// `b{version}` doesn't match the version the session logged in with.
    ClientVersionMismatch { submitted: String, authenticated: String },
    /// The client hash differs from the one stored at login.
    ClientHashMismatch,
    /// The recomputed online checksum differs from the reported one.
    ScoreChecksumMismatch,
    /// No beatmap with the reported checksum.
    BeatmapNotFound(String),
    /// The resolved beatmap's checksum isn't the reported one.
    BeatmapChecksumMismatch,
    /// Relax, Autoplay, Target, or ScoreV2.
    DisallowedMods(Mods),
    /// A score with this checksum was already stored.
    Duplicate,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientVersionMismatch {
                submitted,
                authenticated,
            } => write!(
                f,
                "client version {submitted} does not match session version {authenticated}"
            ),
            Self::ClientHashMismatch => write!(f, "client hash does not match session"),
            Self::ScoreChecksumMismatch => write!(f, "score checksum mismatch"),
            Self::BeatmapNotFound(checksum) => write!(f, "beatmap {checksum} not found"),
            Self::BeatmapChecksumMismatch => write!(f, "beatmap checksum mismatch"),
            Self::DisallowedMods(mods) => write!(f, "disallowed mods {:#x}", mods.bits()),
            Self::Duplicate => write!(f, "duplicate score"),
        }
    }
}

/// Errors that can occur while submitting a score.
#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    /// The submission failed an integrity or mod check. Nothing was
    /// persisted.
    #[error("score rejected: {0}")]
    Validation(RejectReason),

    /// The submitting user doesn't exist in the store.
    #[error("user {0} not found")]
    UserNotFound(UserId),

    /// The backing store failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// The rating collaborator failed.
    #[error("rating error: {0}")]
    Rating(String),

    /// The request was aborted before the score was committed.
    #[error("submission cancelled")]
    Cancelled,
}

impl From<RejectReason> for ScoringError {
    fn from(reason: RejectReason) -> Self {
        Self::Validation(reason)
    }
}
