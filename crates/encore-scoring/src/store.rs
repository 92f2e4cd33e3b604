//! Collaborator traits for score submission.
//!
//! The scoring layer doesn't own a database, a beatmap mirror, or a
//! performance calculator. The pipeline is generic over these traits and
//! production plugs in the real implementations; tests use the in-memory
//! ones in [`crate::memory`].
//!
//! All async methods return `impl Future + Send` so the pipeline can run
//! on a multi-threaded runtime.

use std::future::Future;

use encore_protocol::{GameMode, Mods, Rank, UserId, UserStats};

use crate::{Beatmap, HitCounts, Score, ScoringError};

/// The account fields the scoring layer needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreUser {
    pub id: UserId,
    pub username: String,
    pub rank: Rank,
    pub restricted: bool,
}

/// Persistent storage for users, beatmaps, scores, and stats.
///
/// Every method is a single round-trip. `commit_submission` is the only
/// write on the submission path and must be atomic: either the score and
/// the stats are both stored, or neither is.
pub trait ScoreStore: Send + Sync + 'static {
    fn user(
        &self,
        id: UserId,
    ) -> impl Future<Output = Result<Option<ScoreUser>, ScoringError>> + Send;

    /// Looks up a user by name, ignoring case.
    fn user_by_name(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Option<ScoreUser>, ScoringError>> + Send;

    /// Stats for `mode`. Users who never played it get
    /// [`UserStats::empty`].
    fn user_stats(
        &self,
        id: UserId,
        mode: GameMode,
    ) -> impl Future<Output = Result<UserStats, ScoringError>> + Send;

    /// Global rank by performance in `mode`, 1-based. `None` for users
    /// without stats or who are restricted.
    fn user_rank(
        &self,
        id: UserId,
        mode: GameMode,
    ) -> impl Future<Output = Result<Option<u32>, ScoringError>> + Send;

    /// The user's best scores on ranked beatmaps in `mode`, in rank
    /// order, skipping `excluding` when given.
    fn best_scores(
        &self,
        id: UserId,
        mode: GameMode,
        excluding: Option<i32>,
    ) -> impl Future<Output = Result<Vec<Score>, ScoringError>> + Send;

    fn best_score_on_beatmap(
        &self,
        id: UserId,
        beatmap_id: i32,
        mode: GameMode,
    ) -> impl Future<Output = Result<Option<Score>, ScoringError>> + Send;

    fn beatmap_by_checksum(
        &self,
        checksum: &str,
    ) -> impl Future<Output = Result<Option<Beatmap>, ScoringError>> + Send;

    /// `true` if a score with this online checksum is already stored.
    fn score_exists(
        &self,
        score_checksum: &str,
    ) -> impl Future<Output = Result<bool, ScoringError>> + Send;

    /// Stores `score` and replaces the user's stats for its mode with
    /// `stats`.
    ///
    /// When `score` is a new best, the previous best on the same beatmap
    /// and mode is demoted to `Submitted`. Returns the stored score with
    /// its id and leaderboard position filled in.
    fn commit_submission(
        &self,
        score: Score,
        stats: UserStats,
    ) -> impl Future<Output = Result<Score, ScoringError>> + Send;

    /// Restricts a user. `moderator` is `None` for automatic restrictions.
    fn restrict_user(
        &self,
        id: UserId,
        moderator: Option<UserId>,
        reason: &str,
    ) -> impl Future<Output = Result<(), ScoringError>> + Send;

    fn is_restricted(&self, id: UserId) -> impl Future<Output = Result<bool, ScoringError>> + Send;
}

/// Output of a rating computation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rating {
    pub stars: f64,
    pub performance: f64,
}

/// Computes star rating and performance for one play.
///
/// The computation itself is opaque; implementations typically wrap a
/// native library and run it on a blocking thread.
pub trait RatingCalculator: Send + Sync + 'static {
    fn compute(
        &self,
        beatmap: &[u8],
        mode: GameMode,
        mods: Mods,
        hits: &HitCounts,
        max_combo: u32,
    ) -> impl Future<Output = Result<Rating, ScoringError>> + Send;
}

/// Access to raw `.osu` files.
pub trait BeatmapFiles: Send + Sync + 'static {
    /// `None` when the file isn't available locally or upstream.
    fn beatmap_file(&self, beatmap_id: i32) -> impl Future<Output = Option<Vec<u8>>> + Send;
}

/// Decides which medals a committed score unlocks.
pub trait MedalEvaluator: Send + Sync + 'static {
    /// Ids of newly unlocked medals, in unlock order.
    fn evaluate(&self, score: &Score, beatmap: &Beatmap, stats: &UserStats) -> Vec<u32>;
}
