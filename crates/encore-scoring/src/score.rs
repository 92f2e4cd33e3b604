//! Score, beatmap, and submission types.

use chrono::{DateTime, NaiveDateTime, Utc};
use encore_protocol::{GameMode, Mods, UserId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Hit counts
// ---------------------------------------------------------------------------

/// Judgement counts for one play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HitCounts {
    pub n300: u32,
    pub n100: u32,
    pub n50: u32,
    pub geki: u32,
    pub katu: u32,
    pub miss: u32,
}

// ---------------------------------------------------------------------------
// Beatmap
// ---------------------------------------------------------------------------

/// Leaderboard status of a beatmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BeatmapStatus {
    Graveyard,
    #[default]
    Pending,
    Ranked,
    Approved,
    Qualified,
    Loved,
}

impl BeatmapStatus {
    /// Ranked and approved maps award ranked score and performance.
    pub fn is_ranked(self) -> bool {
        matches!(self, Self::Ranked | Self::Approved)
    }
}

/// A beatmap as the store knows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beatmap {
    pub id: i32,
    pub set_id: i32,
    /// MD5 of the `.osu` file.
    pub checksum: String,
    pub status: BeatmapStatus,
    pub play_count: u64,
    pub pass_count: u64,
    pub last_updated: DateTime<Utc>,
    pub url: String,
}

// ---------------------------------------------------------------------------
// Submission input
// ---------------------------------------------------------------------------

/// What the client uploads when a play ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSubmission {
    pub beatmap_checksum: String,
    /// The client's online checksum for this score.
    pub score_checksum: String,
    pub hits: HitCounts,
    pub max_combo: u32,
    pub perfect: bool,
    pub total_score: u64,
    pub grade: String,
    pub mods: Mods,
    pub passed: bool,
    pub mode: GameMode,
    /// Client clock at submission, as reported.
    pub client_time: NaiveDateTime,
    /// Bare build number, e.g. `20240123` (no `b`, no suffix).
    pub client_version: String,
    pub client_hash: String,
    pub storyboard_checksum: Option<String>,
}

/// Identity of the submitting session, taken from what it authenticated
/// with rather than from the upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submitter {
    pub user_id: UserId,
    pub username: String,
    /// Full client version from login, e.g. `b20240123.2cuttingedge`.
    pub client_version: String,
    pub client_hash: String,
}

// ---------------------------------------------------------------------------
// Score (persisted)
// ---------------------------------------------------------------------------

/// How a stored score relates to the user's other scores on the beatmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubmissionStatus {
    /// Not passed (and no NoFail).
    Failed,
    /// Passed but not better than the previous best.
    Submitted,
    /// The user's best on this beatmap and mode.
    Best,
}

/// A persisted play. Immutable once committed, apart from
/// `leaderboard_position` which the store fills in at read time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    /// Assigned by the store on commit; `0` before that.
    pub id: u64,
    pub user_id: UserId,
    pub beatmap_id: i32,
    pub beatmap_checksum: String,
    pub score_checksum: String,
    pub hits: HitCounts,
    pub max_combo: u32,
    pub perfect: bool,
    pub total_score: u64,
    pub grade: String,
    pub mods: Mods,
    pub passed: bool,
    pub status: SubmissionStatus,
    pub mode: GameMode,
    pub played_at: DateTime<Utc>,
    pub client_time: NaiveDateTime,
    pub client_version: String,
    pub beatmap_status: BeatmapStatus,
    /// Percentage, `0.0..=100.0`.
    pub accuracy: f64,
    pub performance: f64,
    #[serde(default)]
    pub leaderboard_position: Option<u32>,
}

impl Score {
    /// `true` when the play didn't pass and NoFail wasn't on.
    pub fn is_failed(&self) -> bool {
        is_failed(self.passed, self.mods)
    }

    pub fn is_ranked(&self) -> bool {
        self.beatmap_status.is_ranked()
    }
}

pub(crate) fn is_failed(passed: bool, mods: Mods) -> bool {
    !passed && !mods.contains(Mods::NO_FAIL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_failed_respects_no_fail() {
        assert!(is_failed(false, Mods::NONE));
        assert!(!is_failed(false, Mods::NO_FAIL));
        assert!(!is_failed(true, Mods::NONE));
    }

    #[test]
    fn test_beatmap_status_is_ranked() {
        assert!(BeatmapStatus::Ranked.is_ranked());
        assert!(BeatmapStatus::Approved.is_ranked());
        assert!(!BeatmapStatus::Loved.is_ranked());
        assert!(!BeatmapStatus::Pending.is_ranked());
    }
}
