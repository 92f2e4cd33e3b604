//! The score submission pipeline.
//!
//! ```text
//! submit()
//!   ├─ per-user lock            (one submission per user at a time)
//!   ├─ resolve beatmap          (read-through cache → store)
//!   ├─ validate                 (version, hash, checksum, beatmap, mods)
//!   ├─ duplicate check
//!   ├─ accuracy + rating        (performance 0 without a beatmap file)
//!   ├─ status vs previous best
//!   ├─ next stats               (weighted ranking engine)
//!   ├─ commit                   (single store call)
//!   └─ medals + chart
//! ```
//!
//! Every wait before the commit races the caller's `CancellationToken`.
//! Once the commit starts it runs to completion, so a cancelled
//! submission has either been stored in full or not at all.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use encore_protocol::{Mods, UserId};
use tokio_util::sync::CancellationToken;

use crate::chart::{ChartResponse, RankedStats, score_chart, stats_chart};
use crate::ranking::next_stats;
use crate::score::is_failed;
use crate::{
    Beatmap, BeatmapCache, BeatmapFiles, MedalEvaluator, RatingCalculator, RejectReason, Score,
    ScoreStore, ScoreSubmission, ScoringError, SubmissionStatus, Submitter, accuracy, validate,
};

/// Decides how a new play relates to the user's previous best.
///
/// - `Failed` if it didn't pass and NoFail wasn't on;
/// - `Best` if there's no previous best, or it has more performance, or
///   equal performance and more score;
/// - `Submitted` otherwise.
pub fn decide_status(
    passed: bool,
    mods: Mods,
    total_score: u64,
    performance: f64,
    previous_best: Option<&Score>,
) -> SubmissionStatus {
    if is_failed(passed, mods) {
        return SubmissionStatus::Failed;
    }
    let Some(previous) = previous_best else {
        return SubmissionStatus::Best;
    };
    let better = performance > previous.performance
        || (performance == previous.performance && total_score > previous.total_score);
    if better {
        SubmissionStatus::Best
    } else {
        SubmissionStatus::Submitted
    }
}

/// Everything a successful submission produced.
#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    /// The stored score, with id and leaderboard position.
    pub score: Score,
    pub beatmap: Beatmap,
    pub previous_best: Option<Score>,
    pub before: RankedStats,
    pub after: RankedStats,
    pub new_medals: Vec<u32>,
    pub chart: ChartResponse,
}

/// Validates, rates, ranks, and stores score submissions.
///
/// Generic over its collaborators so tests can run it entirely in memory.
pub struct ScorePipeline<S, R, F, M> {
    store: Arc<S>,
    rating: R,
    files: F,
    medals: M,
    cache: BeatmapCache,
    user_locks: Mutex<HashMap<UserId, Arc<tokio::sync::Mutex<()>>>>,
    domain: String,
}

impl<S, R, F, M> ScorePipeline<S, R, F, M>
where
    S: ScoreStore,
    R: RatingCalculator,
    F: BeatmapFiles,
    M: MedalEvaluator,
{
    pub fn new(store: Arc<S>, rating: R, files: F, medals: M) -> Self {
        Self {
            store,
            rating,
            files,
            medals,
            cache: BeatmapCache::new(),
            user_locks: Mutex::new(HashMap::new()),
            domain: "localhost".into(),
        }
    }

    /// Sets the domain used for profile links in the chart.
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn cache(&self) -> &BeatmapCache {
        &self.cache
    }

    fn user_lock(&self, user_id: UserId) -> Arc<tokio::sync::Mutex<()>> {
        self.user_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(user_id)
            .or_default()
            .clone()
    }

    /// Runs one submission end to end.
    ///
    /// # Errors
    /// - `Validation`: a check failed; logged at `warn`, nothing stored.
    /// - `UserNotFound`: the submitter has no account.
    /// - `Cancelled`: `cancel` fired before the commit; nothing stored.
    /// - `Storage` / `Rating`: a collaborator failed.
    pub async fn submit(
        &self,
        submission: ScoreSubmission,
        submitter: Submitter,
        cancel: &CancellationToken,
    ) -> Result<SubmissionOutcome, ScoringError> {
        let lock = self.user_lock(submitter.user_id);
        let _serialized = cancellable(cancel, async move { Ok(lock.lock_owned().await) }).await?;

        let result = self.process(&submission, &submitter, cancel).await;
        if let Err(ScoringError::Validation(reason)) = &result {
            tracing::warn!(
                score_checksum = %submission.score_checksum,
                username = %submitter.username,
                user_id = %submitter.user_id,
                %reason,
                "score rejected"
            );
        }
        result
    }

    async fn process(
        &self,
        submission: &ScoreSubmission,
        submitter: &Submitter,
        cancel: &CancellationToken,
    ) -> Result<SubmissionOutcome, ScoringError> {
        let store = self.store.as_ref();

        let beatmap =
            cancellable(cancel, self.cache.resolve(store, &submission.beatmap_checksum)).await?;
        validate(submission, submitter, beatmap.as_ref())?;
        let beatmap = beatmap
            .ok_or_else(|| RejectReason::BeatmapNotFound(submission.beatmap_checksum.clone()))?;

        if cancellable(cancel, store.score_exists(&submission.score_checksum)).await? {
            return Err(RejectReason::Duplicate.into());
        }
        if cancellable(cancel, store.user(submitter.user_id)).await?.is_none() {
            return Err(ScoringError::UserNotFound(submitter.user_id));
        }

        let accuracy = accuracy(submission.mode, &submission.hits);
        let file =
            cancellable(cancel, async { Ok(self.files.beatmap_file(beatmap.id).await) }).await?;
        let performance = match file {
            Some(file) => {
                let rating = self.rating.compute(
                    &file,
                    submission.mode,
                    submission.mods,
                    &submission.hits,
                    submission.max_combo,
                );
                cancellable(cancel, rating).await?.performance
            }
            None => {
                tracing::debug!(beatmap_id = beatmap.id, "no beatmap file, performance is 0");
                0.0
            }
        };

        let previous_best = cancellable(
            cancel,
            store.best_score_on_beatmap(submitter.user_id, beatmap.id, submission.mode),
        )
        .await?;
        let status = decide_status(
            submission.passed,
            submission.mods,
            submission.total_score,
            performance,
            previous_best.as_ref(),
        );

        let score = Score {
            id: 0,
            user_id: submitter.user_id,
            beatmap_id: beatmap.id,
            beatmap_checksum: beatmap.checksum.clone(),
            score_checksum: submission.score_checksum.clone(),
            hits: submission.hits,
            max_combo: submission.max_combo,
            perfect: submission.perfect,
            total_score: submission.total_score,
            grade: submission.grade.clone(),
            mods: submission.mods,
            passed: submission.passed,
            status,
            mode: submission.mode,
            played_at: Utc::now(),
            client_time: submission.client_time,
            client_version: submission.client_version.clone(),
            beatmap_status: beatmap.status,
            accuracy,
            performance,
            leaderboard_position: None,
        };

        let stats_before =
            cancellable(cancel, store.user_stats(submitter.user_id, submission.mode)).await?;
        let rank_before =
            cancellable(cancel, store.user_rank(submitter.user_id, submission.mode)).await?;
        let other_bests = cancellable(
            cancel,
            store.best_scores(submitter.user_id, submission.mode, Some(beatmap.id)),
        )
        .await?;
        let stats_after = next_stats(&stats_before, &score, previous_best.as_ref(), other_bests);

        if cancel.is_cancelled() {
            return Err(ScoringError::Cancelled);
        }
        let score = store.commit_submission(score, stats_after.clone()).await?;
        let rank_after = store.user_rank(submitter.user_id, submission.mode).await?;

        let new_medals = self.medals.evaluate(&score, &beatmap, &stats_after);
        let before = RankedStats {
            stats: stats_before,
            rank: rank_before,
        };
        let after = RankedStats {
            stats: stats_after,
            rank: rank_after,
        };
        let chart = ChartResponse::new(
            &beatmap,
            format!("https://{}/user/{}", self.domain, submitter.user_id.0),
            score_chart(previous_best.as_ref(), &score),
            &score,
            stats_chart(&before, &after),
            new_medals.clone(),
        );

        tracing::info!(
            score_id = score.id,
            user_id = %submitter.user_id,
            beatmap_id = beatmap.id,
            status = ?score.status,
            performance = score.performance,
            "score submitted"
        );

        Ok(SubmissionOutcome {
            score,
            beatmap,
            previous_best,
            before,
            after,
            new_medals,
            chart,
        })
    }
}

/// Awaits `future` unless `cancel` fires first.
async fn cancellable<T>(
    cancel: &CancellationToken,
    future: impl Future<Output = Result<T, ScoringError>>,
) -> Result<T, ScoringError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(ScoringError::Cancelled),
        result = future => result,
    }
}
