//! Client telemetry flags and automatic restriction.
//!
//! The client periodically reports a bit set of things its own integrity
//! checks noticed (the "last.fm" report, `a{flags}`). Most bits are noisy
//! and only logged. A few identify known cheat clients or multi-account
//! tooling; those restrict the account on the spot, whether or not the
//! player ever submits a score.

use std::fmt;

use encore_protocol::UserId;

use crate::{ScoreStore, ScoringError};

/// Bit set reported by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ClientFlags(pub u32);

impl ClientFlags {
    pub const CLEAN: ClientFlags = ClientFlags(0);
    pub const SPEED_HACK: ClientFlags = ClientFlags(1 << 1);
    pub const INCORRECT_MOD_VALUE: ClientFlags = ClientFlags(1 << 2);
    pub const MULTIPLE_CLIENTS: ClientFlags = ClientFlags(1 << 3);
    pub const CHECKSUM_FAILURE: ClientFlags = ClientFlags(1 << 4);
    pub const FLASHLIGHT_CHECKSUM: ClientFlags = ClientFlags(1 << 5);
    pub const EXECUTABLE_CHECKSUM: ClientFlags = ClientFlags(1 << 6);
    pub const MISSING_PROCESSES: ClientFlags = ClientFlags(1 << 7);
    pub const FLASHLIGHT_IMAGE_HACK: ClientFlags = ClientFlags(1 << 8);
    pub const SPINNER_HACK: ClientFlags = ClientFlags(1 << 9);
    pub const TRANSPARENT_WINDOW: ClientFlags = ClientFlags(1 << 10);
    pub const FAST_PRESS: ClientFlags = ClientFlags(1 << 11);
    pub const RAW_MOUSE_DISCREPANCY: ClientFlags = ClientFlags(1 << 12);
    pub const RAW_KEYBOARD_DISCREPANCY: ClientFlags = ClientFlags(1 << 13);
    pub const RUN_WITH_LD_FLAG: ClientFlags = ClientFlags(1 << 14);
    pub const CONSOLE_OPEN: ClientFlags = ClientFlags(1 << 15);
    pub const EXTRA_THREADS: ClientFlags = ClientFlags(1 << 16);
    pub const HQ_ASSEMBLY: ClientFlags = ClientFlags(1 << 17);
    pub const HQ_FILE: ClientFlags = ClientFlags(1 << 18);
    pub const REGISTRY_EDITS: ClientFlags = ClientFlags(1 << 19);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn intersects(self, other: ClientFlags) -> bool {
        self.0 & other.0 != 0
    }

    /// Parses the report query, `a` followed by the decimal flag value.
    /// Returns `None` for anything else.
    pub fn parse_report(query: &str) -> Option<Self> {
        query.strip_prefix('a')?.parse().ok().map(ClientFlags)
    }

    /// The restriction reason these flags warrant, if any.
    pub fn restriction_reason(self) -> Option<RestrictionReason> {
        if self.intersects(ClientFlags(Self::HQ_ASSEMBLY.0 | Self::HQ_FILE.0)) {
            Some(RestrictionReason::CheatClient)
        } else if self.intersects(Self::REGISTRY_EDITS) {
            Some(RestrictionReason::MultiAccountRegistry)
        } else {
            None
        }
    }
}

/// Why telemetry restricted an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestrictionReason {
    CheatClient,
    MultiAccountRegistry,
}

impl RestrictionReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CheatClient => "hq!osu found running",
            Self::MultiAccountRegistry => "multi account registry edits found",
        }
    }
}

impl fmt::Display for RestrictionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Applies a telemetry report for `user_id`, restricting the account
/// (with no moderator) when the flags call for it.
///
/// Returns the reason when the account was restricted.
pub async fn apply_client_flags<S: ScoreStore>(
    store: &S,
    user_id: UserId,
    flags: ClientFlags,
) -> Result<Option<RestrictionReason>, ScoringError> {
    let Some(reason) = flags.restriction_reason() else {
        if flags != ClientFlags::CLEAN {
            tracing::debug!(%user_id, flags = flags.bits(), "client flags reported");
        }
        return Ok(None);
    };

    store.restrict_user(user_id, None, reason.as_str()).await?;
    tracing::warn!(%user_id, flags = flags.bits(), %reason, "account restricted by client flags");
    Ok(Some(reason))
}
