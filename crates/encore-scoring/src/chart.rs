//! The chart text returned to the client after a submission.
//!
//! ```text
//! beatmapId:75|beatmapSetId:1|beatmapPlaycount:10|beatmapPasscount:4|approvedDate:2024-01-01
//! chartId:beatmap|chartUrl:…|chartName:Beatmap Ranking|rankBefore:|…|onlineScoreId:7
//! chartId:overall|chartUrl:…|chartName:Overall Ranking|rankBefore:12|…|achievements-new:3/7
//! ```
//!
//! Each chart is an ordered list of before/after pairs. A missing value
//! (no previous best, no rank yet) renders as an empty string.

use std::fmt;

use encore_protocol::UserStats;

use crate::{Beatmap, Score};

/// One `{name}Before:…|{name}After:…` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartEntry {
    pub name: &'static str,
    pub before: Option<String>,
    pub after: Option<String>,
}

impl ChartEntry {
    fn new(name: &'static str, before: Option<String>, after: Option<String>) -> Self {
        Self { name, before, after }
    }
}

impl fmt::Display for ChartEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{name}Before:{}|{name}After:{}",
            self.before.as_deref().unwrap_or_default(),
            self.after.as_deref().unwrap_or_default(),
            name = self.name,
        )
    }
}

/// Stats and rank on one side of a submission.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedStats {
    pub stats: UserStats,
    pub rank: Option<u32>,
}

/// Pairs for the beatmap chart. Ranked score here is the score's own
/// total score.
pub fn score_chart(previous: Option<&Score>, new: &Score) -> Vec<ChartEntry> {
    let pair = |f: fn(&Score) -> Option<String>| (previous.and_then(f), f(new));
    let entries: [(&'static str, fn(&Score) -> Option<String>); 6] = [
        ("rank", |s| s.leaderboard_position.map(|p| p.to_string())),
        ("rankedScore", |s| Some(s.total_score.to_string())),
        ("totalScore", |s| Some(s.total_score.to_string())),
        ("maxCombo", |s| Some(s.max_combo.to_string())),
        ("accuracy", |s| Some(format!("{:.2}", s.accuracy))),
        ("pp", |s| Some(format!("{:.2}", s.performance))),
    ];
    entries
        .into_iter()
        .map(|(name, f)| {
            let (before, after) = pair(f);
            ChartEntry::new(name, before, after)
        })
        .collect()
}

/// Pairs for the overall chart.
pub fn stats_chart(before: &RankedStats, after: &RankedStats) -> Vec<ChartEntry> {
    let entries: [(&'static str, fn(&RankedStats) -> Option<String>); 6] = [
        ("rank", |s| s.rank.map(|r| r.to_string())),
        ("rankedScore", |s| Some(s.stats.ranked_score.to_string())),
        ("totalScore", |s| Some(s.stats.total_score.to_string())),
        ("maxCombo", |s| Some(s.stats.max_combo.to_string())),
        ("accuracy", |s| Some(format!("{:.2}", s.stats.accuracy))),
        ("pp", |s| Some(format!("{:.2}", s.stats.performance))),
    ];
    entries
        .into_iter()
        .map(|(name, f)| ChartEntry::new(name, f(before), f(after)))
        .collect()
}

/// The full three-line response.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartResponse {
    pub beatmap_id: i32,
    pub beatmap_set_id: i32,
    pub beatmap_play_count: u64,
    pub beatmap_pass_count: u64,
    /// `YYYY-MM-DD`.
    pub approved_date: String,
    pub beatmap_url: String,
    pub score_entries: Vec<ChartEntry>,
    pub online_score_id: u64,
    pub user_url: String,
    pub overall_entries: Vec<ChartEntry>,
    pub new_medals: Vec<u32>,
}

impl ChartResponse {
    pub fn new(
        beatmap: &Beatmap,
        user_url: String,
        score_entries: Vec<ChartEntry>,
        score: &Score,
        overall_entries: Vec<ChartEntry>,
        new_medals: Vec<u32>,
    ) -> Self {
        Self {
            beatmap_id: beatmap.id,
            beatmap_set_id: beatmap.set_id,
            beatmap_play_count: beatmap.play_count,
            beatmap_pass_count: beatmap.pass_count,
            approved_date: beatmap.last_updated.format("%Y-%m-%d").to_string(),
            beatmap_url: beatmap.url.clone(),
            score_entries,
            online_score_id: score.id,
            user_url,
            overall_entries,
            new_medals,
        }
    }
}

fn join(entries: &[ChartEntry]) -> String {
    entries
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("|")
}

impl fmt::Display for ChartResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "beatmapId:{}|beatmapSetId:{}|beatmapPlaycount:{}|beatmapPasscount:{}|approvedDate:{}",
            self.beatmap_id,
            self.beatmap_set_id,
            self.beatmap_play_count,
            self.beatmap_pass_count,
            self.approved_date,
        )?;
        writeln!(
            f,
            "chartId:beatmap|chartUrl:{}|chartName:Beatmap Ranking|{}|onlineScoreId:{}",
            self.beatmap_url,
            join(&self.score_entries),
            self.online_score_id,
        )?;
        let medals = self
            .new_medals
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join("/");
        write!(
            f,
            "chartId:overall|chartUrl:{}|chartName:Overall Ranking|{}|achievements-new:{}",
            self.user_url,
            join(&self.overall_entries),
            medals,
        )
    }
}
