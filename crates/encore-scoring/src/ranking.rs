//! The weighted ranking engine.
//!
//! A user's profile accuracy and performance are not averages: best
//! scores are sorted by performance and each one counts for 95% of the one
//! above it. A small bonus rewards the total number of best scores.
//!
//! ```text
//! accuracy    = Σ 0.95^i · acc_i · 100 / (20 · (1 − 0.95^N)) / 100
//! performance = Σ 0.95^i · pp_i  + 416.6667 · (1 − 0.9994^N)
//! ```
//!
//! The sums run over the top 100 scores; `N` is the full best-score count.

use std::cmp::Ordering;

use encore_protocol::UserStats;

use crate::{Score, SubmissionStatus};

/// Only this many best scores contribute to the weighted sums.
pub const WEIGHTED_SCORES: usize = 100;

const DECAY: f64 = 0.95;
const BONUS_PERFORMANCE: f64 = 416.6667;
const BONUS_DECAY: f64 = 0.9994;

/// Weighted profile values derived from a set of best scores.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WeightedStats {
    /// Percentage, `0.0..=100.0`.
    pub accuracy: f64,
    pub performance: f64,
}

impl WeightedStats {
    /// Computes both values from `bests`, which must already be in rank
    /// order (see [`sort_bests`]).
    pub fn from_bests(bests: &[Score]) -> Self {
        let count = bests.len();
        Self {
            accuracy: weighted_accuracy(bests.iter().map(|s| s.accuracy), count),
            performance: weighted_performance(bests.iter().map(|s| s.performance), count),
        }
    }
}

/// Weighted accuracy of rank-ordered accuracies, with the bonus computed
/// from `count` best scores. Returns `0.0` when `count` is zero.
pub fn weighted_accuracy(accuracies: impl IntoIterator<Item = f64>, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    let weighted: f64 = accuracies
        .into_iter()
        .take(WEIGHTED_SCORES)
        .enumerate()
        .map(|(i, acc)| DECAY.powi(i as i32) * acc)
        .sum();
    let bonus = 100.0 / (20.0 * (1.0 - DECAY.powi(count as i32)));
    weighted * bonus / 100.0
}

/// Weighted performance of rank-ordered performance values, plus the
/// play-count bonus for `count` best scores.
pub fn weighted_performance(performances: impl IntoIterator<Item = f64>, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    let weighted: f64 = performances
        .into_iter()
        .take(WEIGHTED_SCORES)
        .enumerate()
        .map(|(i, pp)| DECAY.powi(i as i32) * pp)
        .sum();
    weighted + BONUS_PERFORMANCE * (1.0 - BONUS_DECAY.powi(count as i32))
}

/// Rank order: performance descending, newest first on ties.
pub fn rank_order(a: &Score, b: &Score) -> Ordering {
    b.performance
        .total_cmp(&a.performance)
        .then_with(|| b.played_at.cmp(&a.played_at))
}

/// Sorts best scores into rank order.
pub fn sort_bests(bests: &mut [Score]) {
    bests.sort_by(rank_order);
}

/// Inserts `new` into rank-ordered `bests` at its rank position, replacing
/// any previous best on the same beatmap and mode.
pub fn insert_best(mut bests: Vec<Score>, new: Score) -> Vec<Score> {
    bests.retain(|s| !(s.beatmap_id == new.beatmap_id && s.mode == new.mode));
    let position = bests
        .iter()
        .position(|s| rank_order(&new, s) == Ordering::Less)
        .unwrap_or(bests.len());
    bests.insert(position, new);
    bests
}

/// The user's stats after `score` is committed.
///
/// - play count and total score always grow;
/// - ranked score and the weighted values only change when `score` is a
///   new best on a ranked beatmap;
/// - `previous_best` is the user's best on the same beatmap before this
///   submission, `other_bests` their bests on every other beatmap.
pub fn next_stats(
    previous: &UserStats,
    score: &Score,
    previous_best: Option<&Score>,
    other_bests: Vec<Score>,
) -> UserStats {
    let mut next = previous.clone();
    next.play_count = next.play_count.saturating_add(1);
    next.total_score = next.total_score.saturating_add(score.total_score);
    next.max_combo = next.max_combo.max(score.max_combo);

    if score.status == SubmissionStatus::Best && score.is_ranked() {
        let replaced = previous_best
            .filter(|best| best.is_ranked())
            .map_or(0, |best| best.total_score);
        next.ranked_score = next
            .ranked_score
            .saturating_sub(replaced)
            .saturating_add(score.total_score);

        let bests = insert_best(other_bests, score.clone());
        let weighted = WeightedStats::from_bests(&bests);
        next.accuracy = weighted.accuracy;
        next.performance = weighted.performance;
    }
    next
}
