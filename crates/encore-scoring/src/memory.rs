//! In-memory collaborators.
//!
//! [`MemoryStore`] keeps everything in one `Mutex`-guarded struct, which
//! makes `commit_submission` trivially atomic. Used by tests and by local
//! development servers that don't need persistence.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use encore_protocol::{GameMode, Mods, UserId, UserStats};

use crate::ranking::sort_bests;
use crate::{
    Beatmap, BeatmapFiles, HitCounts, MedalEvaluator, Rating, RatingCalculator, Score, ScoreStore,
    ScoreUser, ScoringError, SubmissionStatus,
};

/// A recorded restriction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Restriction {
    pub user_id: UserId,
    pub moderator: Option<UserId>,
    pub reason: String,
}

#[derive(Debug, Default)]
struct State {
    users: HashMap<UserId, ScoreUser>,
    stats: HashMap<(UserId, GameMode), UserStats>,
    beatmaps: HashMap<String, Beatmap>,
    scores: Vec<Score>,
    restrictions: Vec<Restriction>,
    next_score_id: u64,
}

impl State {
    fn is_restricted(&self, id: UserId) -> bool {
        self.users.get(&id).is_some_and(|u| u.restricted)
    }

    fn rank_of(&self, id: UserId, mode: GameMode) -> Option<u32> {
        if self.is_restricted(id) {
            return None;
        }
        let own = self.stats.get(&(id, mode))?.performance;
        let above = self
            .stats
            .iter()
            .filter(|((user, m), stats)| {
                *m == mode && *user != id && !self.is_restricted(*user) && stats.performance > own
            })
            .count();
        Some(above as u32 + 1)
    }

    fn leaderboard_position(&self, score: &Score) -> u32 {
        let above = self
            .scores
            .iter()
            .filter(|s| {
                s.status == SubmissionStatus::Best
                    && s.beatmap_id == score.beatmap_id
                    && s.mode == score.mode
                    && s.user_id != score.user_id
                    && !self.is_restricted(s.user_id)
                    && s.total_score > score.total_score
            })
            .count();
        above as u32 + 1
    }
}

/// A [`ScoreStore`] backed by process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert_user(&self, user: ScoreUser) {
        self.state().users.insert(user.id, user);
    }

    /// Inserts or replaces a beatmap by checksum.
    pub fn insert_beatmap(&self, beatmap: Beatmap) {
        self.state().beatmaps.insert(beatmap.checksum.clone(), beatmap);
    }

    pub fn insert_stats(&self, stats: UserStats) {
        self.state().stats.insert((stats.user_id, stats.mode), stats);
    }

    /// Stores a score as-is, assigning an id if it has none.
    pub fn insert_score(&self, mut score: Score) -> Score {
        let mut state = self.state();
        if score.id == 0 {
            state.next_score_id += 1;
            score.id = state.next_score_id;
        }
        state.scores.push(score.clone());
        score
    }

    /// Every stored score, in insertion order.
    pub fn scores(&self) -> Vec<Score> {
        self.state().scores.clone()
    }

    pub fn restrictions(&self) -> Vec<Restriction> {
        self.state().restrictions.clone()
    }
}

impl ScoreStore for MemoryStore {
    async fn user(&self, id: UserId) -> Result<Option<ScoreUser>, ScoringError> {
        Ok(self.state().users.get(&id).cloned())
    }

    async fn user_by_name(&self, username: &str) -> Result<Option<ScoreUser>, ScoringError> {
        Ok(self
            .state()
            .users
            .values()
            .find(|u| u.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    async fn user_stats(&self, id: UserId, mode: GameMode) -> Result<UserStats, ScoringError> {
        Ok(self
            .state()
            .stats
            .get(&(id, mode))
            .cloned()
            .unwrap_or_else(|| UserStats::empty(id, mode)))
    }

    async fn user_rank(&self, id: UserId, mode: GameMode) -> Result<Option<u32>, ScoringError> {
        Ok(self.state().rank_of(id, mode))
    }

    async fn best_scores(
        &self,
        id: UserId,
        mode: GameMode,
        excluding: Option<i32>,
    ) -> Result<Vec<Score>, ScoringError> {
        let mut bests: Vec<Score> = self
            .state()
            .scores
            .iter()
            .filter(|s| {
                s.user_id == id
                    && s.mode == mode
                    && s.status == SubmissionStatus::Best
                    && s.is_ranked()
                    && Some(s.beatmap_id) != excluding
            })
            .cloned()
            .collect();
        sort_bests(&mut bests);
        Ok(bests)
    }

    async fn best_score_on_beatmap(
        &self,
        id: UserId,
        beatmap_id: i32,
        mode: GameMode,
    ) -> Result<Option<Score>, ScoringError> {
        let state = self.state();
        Ok(state
            .scores
            .iter()
            .find(|s| {
                s.user_id == id
                    && s.beatmap_id == beatmap_id
                    && s.mode == mode
                    && s.status == SubmissionStatus::Best
            })
            .map(|s| Score {
                leaderboard_position: Some(state.leaderboard_position(s)),
                ..s.clone()
            }))
    }

    async fn beatmap_by_checksum(&self, checksum: &str) -> Result<Option<Beatmap>, ScoringError> {
        Ok(self.state().beatmaps.get(checksum).cloned())
    }

    async fn score_exists(&self, score_checksum: &str) -> Result<bool, ScoringError> {
        Ok(self.state().scores.iter().any(|s| s.score_checksum == score_checksum))
    }

    async fn commit_submission(
        &self,
        mut score: Score,
        stats: UserStats,
    ) -> Result<Score, ScoringError> {
        let mut state = self.state();

        if score.status == SubmissionStatus::Best {
            for previous in state.scores.iter_mut().filter(|s| {
                s.user_id == score.user_id
                    && s.beatmap_id == score.beatmap_id
                    && s.mode == score.mode
                    && s.status == SubmissionStatus::Best
            }) {
                previous.status = SubmissionStatus::Submitted;
            }
        }

        if let Some(beatmap) = state.beatmaps.get_mut(&score.beatmap_checksum) {
            beatmap.play_count += 1;
            if score.passed {
                beatmap.pass_count += 1;
            }
        }

        state.next_score_id += 1;
        score.id = state.next_score_id;
        score.leaderboard_position =
            (score.status == SubmissionStatus::Best).then(|| state.leaderboard_position(&score));
        state.scores.push(score.clone());
        state.stats.insert((stats.user_id, stats.mode), stats);
        Ok(score)
    }

    async fn restrict_user(
        &self,
        id: UserId,
        moderator: Option<UserId>,
        reason: &str,
    ) -> Result<(), ScoringError> {
        let mut state = self.state();
        let user = state
            .users
            .get_mut(&id)
            .ok_or(ScoringError::UserNotFound(id))?;
        user.restricted = true;
        state.restrictions.push(Restriction {
            user_id: id,
            moderator,
            reason: reason.to_owned(),
        });
        Ok(())
    }

    async fn is_restricted(&self, id: UserId) -> Result<bool, ScoringError> {
        Ok(self.state().is_restricted(id))
    }
}

/// Returns the same rating for every play.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedRating(pub Rating);

impl FixedRating {
    pub fn performance(performance: f64) -> Self {
        Self(Rating {
            stars: 5.0,
            performance,
        })
    }
}

impl RatingCalculator for FixedRating {
    async fn compute(
        &self,
        _beatmap: &[u8],
        _mode: GameMode,
        _mods: Mods,
        _hits: &HitCounts,
        _max_combo: u32,
    ) -> Result<Rating, ScoringError> {
        Ok(self.0)
    }
}

/// Beatmap files held in memory, keyed by beatmap id.
#[derive(Debug, Default)]
pub struct MemoryFiles {
    files: Mutex<HashMap<i32, Vec<u8>>>,
}

impl MemoryFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, beatmap_id: i32, contents: Vec<u8>) {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(beatmap_id, contents);
    }
}

impl BeatmapFiles for MemoryFiles {
    async fn beatmap_file(&self, beatmap_id: i32) -> Option<Vec<u8>> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&beatmap_id)
            .cloned()
    }
}

/// Awards the listed medals on every passed score.
#[derive(Debug, Clone, Default)]
pub struct FixedMedals(pub Vec<u32>);

impl MedalEvaluator for FixedMedals {
    fn evaluate(&self, score: &Score, _beatmap: &Beatmap, _stats: &UserStats) -> Vec<u32> {
        if score.is_failed() { Vec::new() } else { self.0.clone() }
    }
}
