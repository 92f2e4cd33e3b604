//! Integration tests for the score submission pipeline.
//!
//! Everything runs against the in-memory collaborators: `MemoryStore`,
//! a fixed rating, in-memory beatmap files, and fixed medals.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use encore_protocol::{GameMode, Mods, Rank, UserId};
use encore_scoring::memory::{FixedMedals, FixedRating, MemoryFiles, MemoryStore};
use encore_scoring::{
    Beatmap, BeatmapStatus, HitCounts, RejectReason, ScorePipeline, ScoreStore, ScoreSubmission,
    ScoreUser, ScoringError, SubmissionStatus, Submitter, online_checksum,
};
use tokio_util::sync::CancellationToken;

const MAP: &str = "a5b99395a42bd55bc5eb1d2411cbdf8b";
const USER: UserId = UserId(3);

type Pipeline = ScorePipeline<MemoryStore, FixedRating, MemoryFiles, FixedMedals>;

// =========================================================================
// Helpers
// =========================================================================

fn store() -> Arc<MemoryStore> {
    let store = MemoryStore::new();
    store.insert_user(ScoreUser {
        id: USER,
        username: "Ayame".into(),
        rank: Rank::Player,
        restricted: false,
    });
    store.insert_beatmap(Beatmap {
        id: 75,
        set_id: 1,
        checksum: MAP.into(),
        status: BeatmapStatus::Ranked,
        play_count: 0,
        pass_count: 0,
        last_updated: Utc::now(),
        url: "https://osu.example/b/75".into(),
    });
    Arc::new(store)
}

fn pipeline(store: Arc<MemoryStore>, performance: f64) -> Pipeline {
    let files = MemoryFiles::new();
    files.insert(75, b"osu file format v14".to_vec());
    ScorePipeline::new(store, FixedRating::performance(performance), files, FixedMedals(vec![12]))
        .with_domain("osu.example")
}

fn submitter() -> Submitter {
    Submitter {
        user_id: USER,
        username: "Ayame".into(),
        client_version: "b20240123.2cuttingedge".into(),
        client_hash: "client-hash".into(),
    }
}

/// A correctly signed submission.
fn submission(total_score: u64, passed: bool) -> ScoreSubmission {
    let mut submission = ScoreSubmission {
        beatmap_checksum: MAP.into(),
        score_checksum: String::new(),
        hits: HitCounts {
            n300: 180,
            n100: 15,
            n50: 3,
            miss: 2,
            ..HitCounts::default()
        },
        max_combo: 240,
        perfect: false,
        total_score,
        grade: if passed { "A".into() } else { "F".into() },
        mods: Mods::HIDDEN,
        passed,
        mode: GameMode::Standard,
        client_time: NaiveDate::from_ymd_opt(2024, 2, 1)
            .and_then(|d| d.and_hms_opt(12, 0, total_score as u32 % 60))
            .unwrap(),
        client_version: "20240123".into(),
        client_hash: "client-hash".into(),
        storyboard_checksum: None,
    };
    submission.score_checksum = online_checksum(&submission, "Ayame");
    submission
}

// =========================================================================
// Happy paths
// =========================================================================

#[tokio::test]
async fn test_submit_first_pass_is_best_and_updates_stats() {
    let store = store();
    let pipeline = pipeline(store.clone(), 200.0);

    let outcome = pipeline
        .submit(submission(500_000, true), submitter(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.score.status, SubmissionStatus::Best);
    assert!(outcome.score.id > 0);
    assert_eq!(outcome.score.leaderboard_position, Some(1));
    assert_eq!(outcome.after.stats.play_count, 1);
    assert_eq!(outcome.after.stats.ranked_score, 500_000);
    assert!((outcome.after.stats.performance - 200.25).abs() < 1e-3);
    assert_eq!(outcome.after.rank, Some(1));
    assert_eq!(outcome.new_medals, vec![12]);

    let stored = store.user_stats(USER, GameMode::Standard).await.unwrap();
    assert_eq!(stored, outcome.after.stats);

    let chart = outcome.chart.to_string();
    assert_eq!(chart.lines().count(), 3);
    assert!(chart.contains("chartUrl:https://osu.example/user/3"));
    assert!(chart.ends_with("achievements-new:12"));
}

#[tokio::test]
async fn test_submit_worse_replay_is_submitted_and_keeps_best() {
    let store = store();
    let pipeline = pipeline(store.clone(), 150.0);
    let cancel = CancellationToken::new();
    pipeline.submit(submission(800_000, true), submitter(), &cancel).await.unwrap();

    let outcome = pipeline.submit(submission(700_000, true), submitter(), &cancel).await.unwrap();

    assert_eq!(outcome.score.status, SubmissionStatus::Submitted);
    assert_eq!(outcome.after.stats.ranked_score, 800_000);
    assert_eq!(outcome.after.stats.total_score, 1_500_000);
    assert_eq!(outcome.after.stats.play_count, 2);
    let best = store
        .best_score_on_beatmap(USER, 75, GameMode::Standard)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(best.total_score, 800_000);
}

#[tokio::test]
async fn test_submit_equal_performance_higher_score_replaces_best() {
    let store = store();
    let pipeline = pipeline(store.clone(), 150.0);
    let cancel = CancellationToken::new();
    pipeline.submit(submission(700_000, true), submitter(), &cancel).await.unwrap();

    let outcome = pipeline.submit(submission(800_000, true), submitter(), &cancel).await.unwrap();

    assert_eq!(outcome.score.status, SubmissionStatus::Best);
    assert_eq!(outcome.previous_best.map(|s| s.total_score), Some(700_000));
    assert_eq!(outcome.after.stats.ranked_score, 800_000);
    let bests = store.best_scores(USER, GameMode::Standard, None).await.unwrap();
    assert_eq!(bests.len(), 1);
}

#[tokio::test]
async fn test_submit_failed_play_counts_but_does_not_rank() {
    let store = store();
    let pipeline = pipeline(store.clone(), 150.0);

    let outcome = pipeline
        .submit(submission(100_000, false), submitter(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.score.status, SubmissionStatus::Failed);
    assert_eq!(outcome.after.stats.play_count, 1);
    assert_eq!(outcome.after.stats.ranked_score, 0);
    assert_eq!(outcome.after.stats.performance, 0.0);
    assert!(outcome.new_medals.is_empty());
}

#[tokio::test]
async fn test_submit_without_beatmap_file_has_zero_performance() {
    let store = store();
    let pipeline = ScorePipeline::new(
        store.clone(),
        FixedRating::performance(300.0),
        MemoryFiles::new(),
        FixedMedals::default(),
    );

    let outcome = pipeline
        .submit(submission(500_000, true), submitter(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.score.performance, 0.0);
    assert_eq!(outcome.score.status, SubmissionStatus::Best);
}

// =========================================================================
// Rejections
// =========================================================================

#[tokio::test]
async fn test_submit_client_hash_mismatch_persists_nothing() {
    let store = store();
    let pipeline = pipeline(store.clone(), 150.0);
    let mut submitter = submitter();
    submitter.client_hash = "logged-in-with-another-hash".into();

    let result = pipeline
        .submit(submission(500_000, true), submitter, &CancellationToken::new())
        .await;

    assert!(matches!(
        result,
        Err(ScoringError::Validation(RejectReason::ClientHashMismatch))
    ));
    assert!(store.scores().is_empty());
    let stats = store.user_stats(USER, GameMode::Standard).await.unwrap();
    assert_eq!(stats.play_count, 0);
}

#[tokio::test]
async fn test_submit_tampered_score_checksum_rejected_and_not_stored() {
    let store = store();
    let pipeline = pipeline(store.clone(), 150.0);
    let mut s = submission(500_000, true);
    s.score_checksum = "f".repeat(32);

    let result = pipeline.submit(s, submitter(), &CancellationToken::new()).await;

    assert!(matches!(
        result,
        Err(ScoringError::Validation(RejectReason::ScoreChecksumMismatch))
    ));
    assert!(store.scores().is_empty());
    let stats = store.user_stats(USER, GameMode::Standard).await.unwrap();
    assert_eq!(stats.play_count, 0);
}

#[tokio::test]
async fn test_submit_unknown_beatmap_rejected() {
    let store = store();
    let pipeline = pipeline(store.clone(), 150.0);
    let mut s = submission(500_000, true);
    s.beatmap_checksum = "00000000000000000000000000000000".into();
    s.score_checksum = online_checksum(&s, "Ayame");

    let result = pipeline.submit(s, submitter(), &CancellationToken::new()).await;

    assert!(matches!(
        result,
        Err(ScoringError::Validation(RejectReason::BeatmapNotFound(_)))
    ));
    assert!(store.scores().is_empty());
}

#[tokio::test]
async fn test_submit_duplicate_checksum_rejected() {
    let store = store();
    let pipeline = pipeline(store.clone(), 150.0);
    let cancel = CancellationToken::new();
    pipeline.submit(submission(500_000, true), submitter(), &cancel).await.unwrap();

    let result = pipeline.submit(submission(500_000, true), submitter(), &cancel).await;

    assert!(matches!(
        result,
        Err(ScoringError::Validation(RejectReason::Duplicate))
    ));
    assert_eq!(store.scores().len(), 1);
}

#[tokio::test]
async fn test_submit_unknown_user_rejected() {
    let store = store();
    let pipeline = pipeline(store.clone(), 150.0);
    let mut submitter = submitter();
    submitter.user_id = UserId(999);

    let result = pipeline
        .submit(submission(500_000, true), submitter, &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(ScoringError::UserNotFound(UserId(999)))));
}

// =========================================================================
// Cancellation and serialization
// =========================================================================

#[tokio::test]
async fn test_submit_cancelled_persists_nothing() {
    let store = store();
    let pipeline = pipeline(store.clone(), 150.0);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = pipeline.submit(submission(500_000, true), submitter(), &cancel).await;

    assert!(matches!(result, Err(ScoringError::Cancelled)));
    assert!(store.scores().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_submit_concurrent_same_user_leaves_single_best() {
    let store = store();
    let pipeline = Arc::new(pipeline(store.clone(), 150.0));

    let handles: Vec<_> = [600_000, 650_000, 700_000, 750_000]
        .into_iter()
        .map(|total| {
            let pipeline = pipeline.clone();
            tokio::spawn(async move {
                pipeline
                    .submit(submission(total, true), submitter(), &CancellationToken::new())
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let scores = store.scores();
    assert_eq!(scores.len(), 4);
    let bests: Vec<_> = scores
        .iter()
        .filter(|s| s.status == SubmissionStatus::Best)
        .collect();
    assert_eq!(bests.len(), 1);
    assert_eq!(bests[0].total_score, 750_000);

    let stats = store.user_stats(USER, GameMode::Standard).await.unwrap();
    assert_eq!(stats.play_count, 4);
    assert_eq!(stats.ranked_score, 750_000);
}
