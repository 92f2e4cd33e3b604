//! The online score checksum.
//!
//! The client signs each upload with an MD5 over a fixed-order string of
//! the score's fields, its username, its client hash, and the storyboard
//! checksum. Recomputing it server-side binds the hit counts to the
//! beatmap, the player, and the client build.

use md5::{Digest, Md5};

use crate::ScoreSubmission;

/// Recomputes the online checksum of `submission` as uploaded by
/// `username`. Returns lowercase hex.
pub fn online_checksum(submission: &ScoreSubmission, username: &str) -> String {
    let hits = &submission.hits;
    let signed = format!(
        "chickenmcnuggets{}o15{}{}smustard{}{}uu{}{}{}{}{}{}{}Q{}{}{}{}{}{}",
        u64::from(hits.n300) + u64::from(hits.n100),
        hits.n50,
        hits.geki,
        hits.katu,
        hits.miss,
        submission.beatmap_checksum,
        submission.max_combo,
        bool_text(submission.perfect),
        username,
        submission.total_score,
        submission.grade,
        submission.mods.bits(),
        bool_text(submission.passed),
        submission.mode.id(),
        submission.client_version,
        submission.client_time.format("%y%m%d%H%M%S"),
        submission.client_hash,
        submission.storyboard_checksum.as_deref().unwrap_or_default(),
    );

    let mut hasher = Md5::new();
    hasher.update(signed.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn bool_text(value: bool) -> &'static str {
    if value { "True" } else { "False" }
}
