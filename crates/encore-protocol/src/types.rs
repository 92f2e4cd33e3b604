//! Core identity and domain types shared by every Encore crate.
//!
//! These are the small, copyable values that show up everywhere: who a
//! player is, which match they're in, which game mode a score belongs to,
//! which mods were active, and what privileges an account carries.

use std::borrow::Borrow;
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A player's stable numeric identity.
///
/// Newtype over `i32` because the client protocol carries user ids as
/// signed 32-bit integers. Serialized transparently as a plain number.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub i32);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U-{}", self.0)
    }
}

/// Identifies one multiplayer match (a "room" in lobby terms).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MatchId(pub u32);

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M-{}", self.0)
    }
}

/// The opaque token a client presents on every request after login.
///
/// `Borrow<str>` lets the session directory look tokens up by `&str`
/// without allocating a fresh `SessionToken` for each request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(pub String);

impl SessionToken {
    /// Returns the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for SessionToken {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Only the first 8 characters: enough to correlate log lines
        // without printing a usable credential.
        let shown: String = self.0.chars().take(8).collect();
        write!(f, "{shown}…")
    }
}

// ---------------------------------------------------------------------------
// GameMode
// ---------------------------------------------------------------------------

/// The four rulesets a score or a player's status can belong to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
pub enum GameMode {
    #[default]
    Standard,
    Taiko,
    Catch,
    Mania,
}

impl GameMode {
    /// Every mode, in wire order.
    pub const ALL: [GameMode; 4] =
        [Self::Standard, Self::Taiko, Self::Catch, Self::Mania];

    /// Converts the client's numeric mode id. Unknown ids yield `None`.
    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }

    /// The numeric id used on the wire and inside score checksums.
    pub fn id(self) -> u8 {
        match self {
            Self::Standard => 0,
            Self::Taiko => 1,
            Self::Catch => 2,
            Self::Mania => 3,
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Standard => "standard",
            Self::Taiko => "taiko",
            Self::Catch => "catch",
            Self::Mania => "mania",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Mods
// ---------------------------------------------------------------------------

/// A set of gameplay modifiers, stored as the client's bitmask.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Mods(pub u32);

impl Mods {
    pub const NONE: Mods = Mods(0);
    pub const NO_FAIL: Mods = Mods(1);
    pub const EASY: Mods = Mods(1 << 1);
    pub const TOUCH_DEVICE: Mods = Mods(1 << 2);
    pub const HIDDEN: Mods = Mods(1 << 3);
    pub const HARD_ROCK: Mods = Mods(1 << 4);
    pub const SUDDEN_DEATH: Mods = Mods(1 << 5);
    pub const DOUBLE_TIME: Mods = Mods(1 << 6);
    pub const RELAX: Mods = Mods(1 << 7);
    pub const HALF_TIME: Mods = Mods(1 << 8);
    pub const NIGHTCORE: Mods = Mods(1 << 9);
    pub const FLASHLIGHT: Mods = Mods(1 << 10);
    pub const AUTOPLAY: Mods = Mods(1 << 11);
    pub const SPUN_OUT: Mods = Mods(1 << 12);
    pub const AUTOPILOT: Mods = Mods(1 << 13);
    pub const PERFECT: Mods = Mods(1 << 14);
    pub const TARGET: Mods = Mods(1 << 23);
    pub const SCORE_V2: Mods = Mods(1 << 29);

    /// Mods that change playback speed. In free-mod matches these stay
    /// match-wide; everything else becomes per-player.
    pub const SPEED_CHANGING: Mods =
        Mods(Self::DOUBLE_TIME.0 | Self::NIGHTCORE.0 | Self::HALF_TIME.0);

    /// Returns the raw bitmask.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// `true` if every bit of `other` is set in `self`.
    pub fn contains(self, other: Mods) -> bool {
        self.0 & other.0 == other.0
    }

    /// `true` if any bit of `other` is set in `self`.
    pub fn intersects(self, other: Mods) -> bool {
        self.0 & other.0 != 0
    }

    /// Returns `self` with every bit of `other` cleared.
    pub fn without(self, other: Mods) -> Mods {
        Mods(self.0 & !other.0)
    }

    /// Folds Nightcore into Double Time so both count as the same
    /// leaderboard variant.
    pub fn leaderboard_variant(self) -> Mods {
        self.without(Self::NIGHTCORE)
    }
}

impl BitOr for Mods {
    type Output = Mods;

    fn bitor(self, rhs: Mods) -> Mods {
        Mods(self.0 | rhs.0)
    }
}

impl BitOrAssign for Mods {
    fn bitor_assign(&mut self, rhs: Mods) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Mods {
    type Output = Mods;

    fn bitand(self, rhs: Mods) -> Mods {
        Mods(self.0 & rhs.0)
    }
}

// ---------------------------------------------------------------------------
// Rank (privileges)
// ---------------------------------------------------------------------------

/// An account's privilege level.
///
/// The variants are ordered from least to most privileged, so a single
/// comparison answers "is this account allowed to do X?":
///
/// ```text
/// Player < Supporter < Bat < SuperMod < Developer
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    Serialize,
    Deserialize,
)]
pub enum Rank {
    #[default]
    Player,
    Supporter,
    /// Beatmap nominators and admins.
    Bat,
    SuperMod,
    Developer,
}

impl Rank {
    /// `true` if this rank is at least `minimum`.
    pub fn meets(self, minimum: Rank) -> bool {
        self >= minimum
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Player => "player",
            Self::Supporter => "supporter",
            Self::Bat => "bat",
            Self::SuperMod => "supermod",
            Self::Developer => "developer",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// UserStats
// ---------------------------------------------------------------------------

/// Aggregate statistics for one user in one game mode.
///
/// Global rank is deliberately absent: it depends on every other user's
/// stats and is always asked of the store at the moment it's needed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UserStats {
    pub user_id: UserId,
    pub mode: GameMode,
    pub ranked_score: u64,
    pub total_score: u64,
    pub play_count: u32,
    /// Weighted accuracy as a percentage (0–100).
    pub accuracy: f64,
    /// Weighted performance points.
    pub performance: f64,
    pub max_combo: u32,
}

impl UserStats {
    /// Fresh, all-zero stats for a user who has never played `mode`.
    pub fn empty(user_id: UserId, mode: GameMode) -> Self {
        Self {
            user_id,
            mode,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&UserId(1001)).unwrap();
        assert_eq!(json, "1001");
    }

    #[test]
    fn test_user_id_and_match_id_display() {
        assert_eq!(UserId(7).to_string(), "U-7");
        assert_eq!(MatchId(3).to_string(), "M-3");
    }

    #[test]
    fn test_session_token_display_truncates() {
        let token = SessionToken("0123456789abcdef".into());
        assert_eq!(token.to_string(), "01234567…");
    }

    #[test]
    fn test_session_token_borrows_as_str_for_map_lookup() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(SessionToken("abc".into()), 1);
        assert_eq!(map.get("abc"), Some(&1));
    }

    #[test]
    fn test_game_mode_from_id_round_trips_known_ids() {
        for mode in GameMode::ALL {
            assert_eq!(GameMode::from_id(mode.id()), Some(mode));
        }
        assert_eq!(GameMode::from_id(4), None);
    }

    #[test]
    fn test_mods_contains_and_intersects() {
        let mods = Mods::HIDDEN | Mods::DOUBLE_TIME;
        assert!(mods.contains(Mods::HIDDEN));
        assert!(!mods.contains(Mods::HIDDEN | Mods::HARD_ROCK));
        assert!(mods.intersects(Mods::HIDDEN | Mods::HARD_ROCK));
        assert!(!mods.intersects(Mods::RELAX));
    }

    #[test]
    fn test_mods_leaderboard_variant_drops_nightcore() {
        let mods = Mods::DOUBLE_TIME | Mods::NIGHTCORE | Mods::HIDDEN;
        assert_eq!(
            mods.leaderboard_variant(),
            Mods::DOUBLE_TIME | Mods::HIDDEN
        );
    }

    #[test]
    fn test_rank_meets_is_ordered() {
        assert!(Rank::Developer.meets(Rank::SuperMod));
        assert!(Rank::SuperMod.meets(Rank::SuperMod));
        assert!(!Rank::Bat.meets(Rank::SuperMod));
        assert!(Rank::Player.meets(Rank::Player));
    }

    #[test]
    fn test_user_stats_empty_is_zeroed() {
        let stats = UserStats::empty(UserId(5), GameMode::Taiko);
        assert_eq!(stats.user_id, UserId(5));
        assert_eq!(stats.mode, GameMode::Taiko);
        assert_eq!(stats.play_count, 0);
        assert_eq!(stats.performance, 0.0);
    }
}
