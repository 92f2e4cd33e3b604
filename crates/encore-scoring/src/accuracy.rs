//! Per-mode accuracy.
//!
//! Each mode weights its judgements differently. The result is always a
//! percentage in `0.0..=100.0`, and `0.0` when nothing was hit or missed.

use encore_protocol::GameMode;

use crate::HitCounts;

/// Computes accuracy for `hits` under `mode`'s judgement weights.
///
/// ```text
/// Standard  (300·n300 + 100·n100 + 50·n50) / (300·total)
/// Taiko     (300·n300 + 150·n100) / (300·total)
/// Catch     (n300 + n100 + n50) / total
/// Mania     (300·(n300+geki) + 200·katu + 100·n100 + 50·n50) / (300·total)
/// ```
///
/// `total` counts 300s, 100s, 50s, and misses; mania also counts gekis
/// and katus.
pub fn accuracy(mode: GameMode, hits: &HitCounts) -> f64 {
    let total = total_hits(mode, hits);
    if total == 0 {
        return 0.0;
    }

    let n300 = f64::from(hits.n300);
    let n100 = f64::from(hits.n100);
    let n50 = f64::from(hits.n50);
    let geki = f64::from(hits.geki);
    let katu = f64::from(hits.katu);
    let total = total as f64;

    let ratio = match mode {
        GameMode::Standard => (300.0 * n300 + 100.0 * n100 + 50.0 * n50) / (300.0 * total),
        GameMode::Taiko => (300.0 * n300 + 150.0 * n100) / (300.0 * total),
        GameMode::Catch => (n300 + n100 + n50) / total,
        GameMode::Mania => {
            (300.0 * (n300 + geki) + 200.0 * katu + 100.0 * n100 + 50.0 * n50) / (300.0 * total)
        }
    };
    ratio * 100.0
}

fn total_hits(mode: GameMode, hits: &HitCounts) -> u64 {
    let base = u64::from(hits.n300)
        + u64::from(hits.n100)
        + u64::from(hits.n50)
        + u64::from(hits.miss);
    match mode {
        GameMode::Mania => base + u64::from(hits.geki) + u64::from(hits.katu),
        _ => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hits(n300: u32, n100: u32, n50: u32, miss: u32) -> HitCounts {
        HitCounts {
            n300,
            n100,
            n50,
            miss,
            ..HitCounts::default()
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_accuracy_standard_all_300s_is_100() {
        assert!(approx(accuracy(GameMode::Standard, &hits(100, 0, 0, 0)), 100.0));
    }

    #[test]
    fn test_accuracy_standard_all_misses_is_0() {
        assert!(approx(accuracy(GameMode::Standard, &hits(0, 0, 0, 100)), 0.0));
    }

    #[test]
    fn test_accuracy_no_hits_is_0_in_every_mode() {
        for mode in GameMode::ALL {
            assert_eq!(accuracy(mode, &HitCounts::default()), 0.0);
        }
    }

    #[test]
    fn test_accuracy_standard_mixed() {
        // (300·90 + 100·6 + 50·2) / (300·100) = 27700 / 30000
        let acc = accuracy(GameMode::Standard, &hits(90, 6, 2, 2));
        assert!(approx(acc, 27_700.0 / 30_000.0 * 100.0));
    }

    #[test]
    fn test_accuracy_taiko_goods_count_half() {
        let acc = accuracy(GameMode::Taiko, &hits(50, 50, 0, 0));
        assert!(approx(acc, 75.0));
    }

    #[test]
    fn test_accuracy_catch_ignores_judgement_weight() {
        let acc = accuracy(GameMode::Catch, &hits(10, 5, 5, 5));
        assert!(approx(acc, 80.0));
    }

    #[test]
    fn test_accuracy_mania_counts_geki_and_katu() {
        let hits = HitCounts {
            n300: 10,
            geki: 10,
            katu: 10,
            n100: 0,
            n50: 0,
            miss: 0,
        };
        // (300·20 + 200·10) / (300·30) = 8000 / 9000
        let acc = accuracy(GameMode::Mania, &hits);
        assert!(approx(acc, 8_000.0 / 9_000.0 * 100.0));
    }

    #[test]
    fn test_accuracy_geki_katu_ignored_outside_mania() {
        let mut with_extras = hits(100, 0, 0, 0);
        with_extras.geki = 40;
        with_extras.katu = 40;
        assert!(approx(accuracy(GameMode::Standard, &with_extras), 100.0));
    }
}
