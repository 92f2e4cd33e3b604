//! Score submission and ranking for Encore.
//!
//! A finished play arrives as a [`ScoreSubmission`]. The
//! [`ScorePipeline`] checks it against what the session authenticated
//! with, rates it, decides whether it's a new best, folds it into the
//! user's weighted stats, stores it, and renders the chart the client
//! shows on the results screen.
//!
//! # Layout
//!
//! - [`accuracy`], [`online_checksum`], [`validate`]: pure functions
//! - [`ranking`]: the weighted accuracy/performance engine
//! - [`store`]: collaborator traits ([`ScoreStore`], [`RatingCalculator`],
//!   [`BeatmapFiles`], [`MedalEvaluator`])
//! - [`BeatmapCache`]: read-through cache in front of the store
//! - [`chart`]: the results-screen response
//! - [`anticheat`]: client telemetry flags
//! - [`memory`]: in-memory collaborators for tests and development

#![allow(async_fn_in_trait)]

mod accuracy;
pub mod anticheat;
mod cache;
pub mod chart;
mod checksum;
mod error;
pub mod memory;
mod pipeline;
pub mod ranking;
mod score;
pub mod store;
mod validation;

pub use accuracy::accuracy;
pub use anticheat::{ClientFlags, RestrictionReason, apply_client_flags};
pub use cache::BeatmapCache;
pub use chart::ChartResponse;
pub use checksum::online_checksum;
pub use error::{RejectReason, ScoringError};
pub use pipeline::{ScorePipeline, SubmissionOutcome, decide_status};
pub use ranking::WeightedStats;
pub use score::{
    Beatmap, BeatmapStatus, HitCounts, Score, ScoreSubmission, SubmissionStatus, Submitter,
};
pub use store::{BeatmapFiles, MedalEvaluator, Rating, RatingCalculator, ScoreStore, ScoreUser};
pub use validation::{DISALLOWED_MODS, check_mods, validate};
