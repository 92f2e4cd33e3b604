//! Integrity checks for an uploaded score.
//!
//! Checks run in a fixed order and the first failure wins:
//!
//! 1. client version matches the session's login version
//! 2. client hash matches the session's login hash
//! 3. recomputed online checksum matches the reported one
//! 4. the beatmap resolved by checksum exists and matches
//! 5. no disallowed mods
//!
//! These are pure functions; the pipeline resolves the beatmap first and
//! passes it in.

use encore_protocol::Mods;

use crate::{Beatmap, RejectReason, ScoreSubmission, Submitter, online_checksum};

/// Mods that can never be submitted.
pub const DISALLOWED_MODS: Mods =
    Mods(Mods::RELAX.0 | Mods::AUTOPLAY.0 | Mods::TARGET.0 | Mods::SCORE_V2.0);

/// Runs every check against `submission`.
///
/// `beatmap` is what the cache/store returned for
/// `submission.beatmap_checksum`.
pub fn validate(
    submission: &ScoreSubmission,
    submitter: &Submitter,
    beatmap: Option<&Beatmap>,
) -> Result<(), RejectReason> {
    check_client_version(submission, submitter)?;
    check_client_hash(submission, submitter)?;
    check_score_checksum(submission, submitter)?;
    check_beatmap(submission, beatmap)?;
    check_mods(submission.mods)
}

fn check_client_version(
    submission: &ScoreSubmission,
    submitter: &Submitter,
) -> Result<(), RejectReason> {
    let submitted = format!("b{}", submission.client_version);
    let authenticated = submitter
        .client_version
        .split('.')
        .next()
        .unwrap_or_default();
    if submitted != authenticated {
        return Err(RejectReason::ClientVersionMismatch {
            submitted,
            authenticated: authenticated.to_owned(),
        });
    }
    Ok(())
}

fn check_client_hash(
    submission: &ScoreSubmission,
    submitter: &Submitter,
) -> Result<(), RejectReason> {
    if submission.client_hash != submitter.client_hash {
        return Err(RejectReason::ClientHashMismatch);
    }
    Ok(())
}

fn check_score_checksum(
    submission: &ScoreSubmission,
    submitter: &Submitter,
) -> Result<(), RejectReason> {
    if online_checksum(submission, &submitter.username) != submission.score_checksum {
        return Err(RejectReason::ScoreChecksumMismatch);
    }
    Ok(())
}

fn check_beatmap(
    submission: &ScoreSubmission,
    beatmap: Option<&Beatmap>,
) -> Result<(), RejectReason> {
    let beatmap = beatmap
        .ok_or_else(|| RejectReason::BeatmapNotFound(submission.beatmap_checksum.clone()))?;
    if beatmap.checksum != submission.beatmap_checksum {
        return Err(RejectReason::BeatmapChecksumMismatch);
    }
    Ok(())
}

/// Rejects Relax, Autoplay, Target, and ScoreV2.
pub fn check_mods(mods: Mods) -> Result<(), RejectReason> {
    if mods.intersects(DISALLOWED_MODS) {
        return Err(RejectReason::DisallowedMods(mods & DISALLOWED_MODS));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use encore_protocol::{GameMode, UserId};

    use super::*;
    use crate::{BeatmapStatus, HitCounts};

    const MAP: &str = "a5b99395a42bd55bc5eb1d2411cbdf8b";

    fn submitter() -> Submitter {
        Submitter {
            user_id: UserId(3),
            username: "Ayame".into(),
            client_version: "b20240123.2cuttingedge".into(),
            client_hash: "client-hash".into(),
        }
    }

    fn beatmap() -> Beatmap {
        Beatmap {
            id: 75,
            set_id: 1,
            checksum: MAP.into(),
            status: BeatmapStatus::Ranked,
            play_count: 0,
            pass_count: 0,
            last_updated: Utc::now(),
            url: "https://osu.example/beatmaps/75".into(),
        }
    }

    /// A submission that passes every check.
    fn valid() -> ScoreSubmission {
        let mut submission = ScoreSubmission {
            beatmap_checksum: MAP.into(),
            score_checksum: String::new(),
            hits: HitCounts {
                n300: 200,
                ..HitCounts::default()
            },
            max_combo: 250,
            perfect: true,
            total_score: 1_000_000,
            grade: "X".into(),
            mods: Mods::NONE,
            passed: true,
            mode: GameMode::Standard,
            client_time: NaiveDate::from_ymd_opt(2024, 2, 1)
                .and_then(|d| d.and_hms_opt(12, 0, 0))
                .unwrap(),
            client_version: "20240123".into(),
            client_hash: "client-hash".into(),
            storyboard_checksum: None,
        };
        submission.score_checksum = online_checksum(&submission, "Ayame");
        submission
    }

    #[test]
    fn test_validate_clean_submission_passes() {
        assert_eq!(validate(&valid(), &submitter(), Some(&beatmap())), Ok(()));
    }

    #[test]
    fn test_validate_version_mismatch_rejected() {
        let mut s = valid();
        s.client_version = "20230101".into();

        let result = validate(&s, &submitter(), Some(&beatmap()));

        assert!(matches!(result, Err(RejectReason::ClientVersionMismatch { .. })));
    }

    #[test]
    fn test_validate_client_hash_mismatch_rejected() {
        let mut s = valid();
        s.client_hash = "other".into();

        let result = validate(&s, &submitter(), Some(&beatmap()));

        assert_eq!(result, Err(RejectReason::ClientHashMismatch));
    }

    #[test]
    fn test_validate_tampered_hits_fail_checksum() {
        let mut s = valid();
        s.hits.miss = 3;

        let result = validate(&s, &submitter(), Some(&beatmap()));

        assert_eq!(result, Err(RejectReason::ScoreChecksumMismatch));
    }

    #[test]
    fn test_validate_checksum_mismatch_wins_over_bad_mods() {
        let mut s = valid();
        s.mods = Mods::RELAX;

        let result = validate(&s, &submitter(), Some(&beatmap()));

        assert_eq!(result, Err(RejectReason::ScoreChecksumMismatch));
    }

    #[test]
    fn test_validate_missing_beatmap_rejected() {
        let result = validate(&valid(), &submitter(), None);
        assert!(matches!(result, Err(RejectReason::BeatmapNotFound(_))));
    }

    #[test]
    fn test_validate_beatmap_checksum_mismatch_rejected() {
        let mut map = beatmap();
        map.checksum = "ffffffffffffffffffffffffffffffff".into();

        let result = validate(&valid(), &submitter(), Some(&map));

        assert_eq!(result, Err(RejectReason::BeatmapChecksumMismatch));
    }

    #[test]
    fn test_validate_relax_rejected_even_with_valid_checksum() {
        let mut s = valid();
        s.mods = Mods::RELAX | Mods::HIDDEN;
        s.score_checksum = online_checksum(&s, "Ayame");

        let result = validate(&s, &submitter(), Some(&beatmap()));

        assert_eq!(result, Err(RejectReason::DisallowedMods(Mods::RELAX)));
    }

    #[test]
    fn test_check_mods_allows_ordinary_mods() {
        assert!(check_mods(Mods::HIDDEN | Mods::HARD_ROCK | Mods::DOUBLE_TIME).is_ok());
        assert!(check_mods(Mods::AUTOPLAY).is_err());
        assert!(check_mods(Mods::TARGET).is_err());
        assert!(check_mods(Mods::SCORE_V2).is_err());
    }
}
