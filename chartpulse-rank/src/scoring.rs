//! Momentum scoring
//!
//! Scores one artist from exactly two snapshots:
//! - `recent`: newest snapshot at or before `now`
//! - `baseline`: newest snapshot at or before `now - window`
//!
//! # Score
//! ```text
//! score = popularity_weight * (Δpopularity / popularity_scale)
//!       + followers_weight  * (Δfollowers% / percent_scale)
//!       + social_weight     * (mean platform Δ% / percent_scale)
//! ```
//! Only components present in both snapshots contribute. Percentages are
//! fractions (0.10 = 10%). Results are full precision; rounding is the
//! caller's business.
//!
//! Missing data is reported as [`InsufficientData`], never as a zero score.

use chartpulse_common::config::ScoringConfig;
use chartpulse_common::{ArtistSnapshot, SocialSignal, WindowDays};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Momentum direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Rising,
    Declining,
    Stable,
}

/// Why an artist could not be scored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsufficientData {
    #[error("no snapshot at or before the scoring time")]
    NoRecentSnapshot,

    #[error("no snapshot at or before the start of the window")]
    NoBaselineSnapshot,

    /// Only one observation covers both ends of the window
    #[error("recent and baseline are the same observation")]
    SameObservation,

    #[error("no metric present in both snapshots")]
    NoComparableSignals,
}

/// Derived momentum for one artist and window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentumResult {
    pub momentum_score: f64,
    pub delta_popularity: Option<i32>,
    /// Fractional follower change (0.10 = +10%)
    pub delta_followers_pct: Option<f64>,
    /// Fractional change per comparable social platform
    pub per_platform_delta_pct: BTreeMap<String, f64>,
    pub window_days: WindowDays,
    pub classification: Classification,
    pub recent_captured_at: DateTime<Utc>,
    pub baseline_captured_at: DateTime<Utc>,
}

/// Newest snapshot with `captured_at <= at`; on equal timestamps the later element wins
///
/// # Returns
/// Index into `history` and the snapshot
pub fn latest_at_or_before(
    history: &[ArtistSnapshot],
    at: DateTime<Utc>,
) -> Option<(usize, &ArtistSnapshot)> {
    history
        .iter()
        .enumerate()
        .filter(|(_, s)| s.captured_at <= at)
        .fold(None, |best, (i, s)| match best {
            Some((_, b)) if b.captured_at > s.captured_at => best,
            _ => Some((i, s)),
        })
}

/// Pick the `(recent, baseline)` pair for a window
///
/// `history` need not be sorted.
pub fn select_pair(
    history: &[ArtistSnapshot],
    window: WindowDays,
    now: DateTime<Utc>,
) -> Result<(&ArtistSnapshot, &ArtistSnapshot), InsufficientData> {
    let (recent_idx, recent) =
        latest_at_or_before(history, now).ok_or(InsufficientData::NoRecentSnapshot)?;
    let cutoff = window
        .start_before(now)
        .ok_or(InsufficientData::NoBaselineSnapshot)?;
    let (baseline_idx, baseline) =
        latest_at_or_before(history, cutoff).ok_or(InsufficientData::NoBaselineSnapshot)?;

    if recent_idx == baseline_idx {
        return Err(InsufficientData::SameObservation);
    }
    Ok((recent, baseline))
}

/// Score an artist's history over `window` as of `now`
pub fn score(
    history: &[ArtistSnapshot],
    window: WindowDays,
    now: DateTime<Utc>,
    config: &ScoringConfig,
) -> Result<MomentumResult, InsufficientData> {
    let (recent, baseline) = select_pair(history, window, now)?;
    score_pair(recent, baseline, window, config)
}

/// Score an already-selected pair
pub fn score_pair(
    recent: &ArtistSnapshot,
    baseline: &ArtistSnapshot,
    window: WindowDays,
    config: &ScoringConfig,
) -> Result<MomentumResult, InsufficientData> {
    let delta_popularity = match (recent.popularity, baseline.popularity) {
        (Some(r), Some(b)) => Some(i32::from(r) - i32::from(b)),
        _ => None,
    };

    let delta_followers_pct = match (recent.followers, baseline.followers) {
        (Some(r), Some(b)) => ratio_change(r, b),
        _ => None,
    };

    let per_platform_delta_pct: BTreeMap<String, f64> = recent
        .social_mentions
        .iter()
        .filter_map(|(platform, r)| {
            let b = baseline.social_mentions.get(platform)?;
            signal_change(*r, *b).map(|delta| (platform.clone(), delta))
        })
        .collect();

    let social_mean = (!per_platform_delta_pct.is_empty()).then(|| {
        per_platform_delta_pct.values().sum::<f64>() / per_platform_delta_pct.len() as f64
    });

    let components = [
        delta_popularity
            .map(|d| config.popularity_weight * (f64::from(d) / config.popularity_scale)),
        delta_followers_pct.map(|d| config.followers_weight * (d / config.percent_scale)),
        social_mean.map(|m| config.social_weight * (m / config.percent_scale)),
    ];

    if components.iter().all(Option::is_none) {
        return Err(InsufficientData::NoComparableSignals);
    }
    let momentum_score: f64 = components.iter().flatten().sum();

    Ok(MomentumResult {
        momentum_score,
        delta_popularity,
        delta_followers_pct,
        per_platform_delta_pct,
        window_days: window,
        classification: classify(momentum_score, config.classification_threshold),
        recent_captured_at: recent.captured_at,
        baseline_captured_at: baseline.captured_at,
    })
}

/// Strict thresholds: a score exactly at `±threshold` is Stable
pub fn classify(score: f64, threshold: f64) -> Classification {
    if score > threshold {
        Classification::Rising
    } else if score < -threshold {
        Classification::Declining
    } else {
        Classification::Stable
    }
}

/// `(recent - baseline) / baseline`; undefined for a zero baseline
fn ratio_change(recent: u64, baseline: u64) -> Option<f64> {
    if baseline == 0 {
        return None;
    }
    let change = (recent as f64 - baseline as f64) / baseline as f64;
    change.is_finite().then_some(change)
}

/// Fractional change between two observations of one platform
fn signal_change(recent: SocialSignal, baseline: SocialSignal) -> Option<f64> {
    let change = match (recent, baseline) {
        (SocialSignal::Count(r), SocialSignal::Count(b)) => return ratio_change(r, b),
        // Provider-reported growth in percent points, converted to a fraction
        (SocialSignal::PercentChange(r), SocialSignal::PercentChange(b)) => (r - b) / 100.0,
        _ => return None,
    };
    change.is_finite().then_some(change)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn day(d: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(d)
    }

    fn snap(d: i64, popularity: Option<u8>, followers: Option<u64>) -> ArtistSnapshot {
        let mut s = ArtistSnapshot::new("artist", day(d));
        s.popularity = popularity;
        s.followers = followers;
        s
    }

    fn window(days: u32) -> WindowDays {
        WindowDays::new(days).unwrap()
    }

    #[test]
    fn test_two_week_rise_scenario() {
        let history = vec![snap(0, Some(50), Some(1000)), snap(14, Some(58), Some(1100))];
        let result = score(&history, window(14), day(14), &ScoringConfig::default()).unwrap();

        assert_eq!(result.delta_popularity, Some(8));
        assert!((result.delta_followers_pct.unwrap() - 0.10).abs() < 1e-12);
        // 1.0 * 0.8 + 0.5 * 1.0
        assert!((result.momentum_score - 1.3).abs() < 1e-9);
        assert_eq!(result.classification, Classification::Rising);
        assert_eq!(result.recent_captured_at, day(14));
        assert_eq!(result.baseline_captured_at, day(0));
    }

    #[test]
    fn test_zero_and_one_snapshot_are_insufficient() {
        let config = ScoringConfig::default();
        assert_eq!(
            score(&[], window(7), day(30), &config).unwrap_err(),
            InsufficientData::NoRecentSnapshot
        );

        let one = vec![snap(0, Some(50), Some(10))];
        assert_eq!(
            score(&one, window(7), day(30), &config).unwrap_err(),
            InsufficientData::SameObservation
        );
        assert_eq!(
            score(&one, window(7), day(3), &config).unwrap_err(),
            InsufficientData::NoBaselineSnapshot
        );
    }

    #[test]
    fn test_window_reaching_past_calendar_has_no_baseline() {
        let history = vec![snap(0, Some(50), None), snap(14, Some(58), None)];
        let result = score(&history, window(u32::MAX), day(14), &ScoringConfig::default());
        assert_eq!(result, Err(InsufficientData::NoBaselineSnapshot));
    }

    #[test]
    fn test_future_snapshots_are_ignored() {
        let history = vec![
            snap(0, Some(50), None),
            snap(10, Some(60), None),
            snap(40, Some(99), None),
        ];
        let result = score(&history, window(7), day(10), &ScoringConfig::default()).unwrap();
        assert_eq!(result.delta_popularity, Some(10));
    }

    #[test]
    fn test_unsorted_history_and_timestamp_ties() {
        let history = vec![
            snap(14, Some(70), None),
            snap(0, Some(40), None),
            // Same capture time as the first element; appears later, so it wins
            snap(14, Some(58), None),
        ];
        let result = score(&history, window(14), day(20), &ScoringConfig::default()).unwrap();
        assert_eq!(result.delta_popularity, Some(18));
    }

    #[test]
    fn test_zero_baseline_followers_omitted() {
        let history = vec![snap(0, Some(50), Some(0)), snap(7, Some(52), Some(500))];
        let result = score(&history, window(7), day(7), &ScoringConfig::default()).unwrap();
        assert_eq!(result.delta_followers_pct, None);
        assert_eq!(result.delta_popularity, Some(2));
    }

    #[test]
    fn test_no_shared_metric_is_insufficient() {
        let history = vec![snap(0, Some(50), None), snap(7, None, Some(500))];
        assert_eq!(
            score(&history, window(7), day(7), &ScoringConfig::default()).unwrap_err(),
            InsufficientData::NoComparableSignals
        );
    }

    #[test]
    fn test_follower_delta_sign_and_continuity() {
        let baseline = 10_000u64;
        let mut previous: Option<f64> = None;
        for recent in (9_000u64..=11_000).step_by(50) {
            let delta = ratio_change(recent, baseline).unwrap();
            assert_eq!(
                delta.partial_cmp(&0.0),
                (recent as f64 - baseline as f64).partial_cmp(&0.0)
            );
            if let Some(prev) = previous {
                // 50 followers on a base of 10k is a 0.5% step
                assert!((delta - prev - 0.005).abs() < 1e-9);
            }
            previous = Some(delta);
        }
    }

    #[test]
    fn test_score_monotonic_in_popularity() {
        let config = ScoringConfig::default();
        let mut last = f64::NEG_INFINITY;
        for p in 0..=100u8 {
            let history = vec![snap(0, Some(50), Some(1000)), snap(7, Some(p), Some(1000))];
            let s = score(&history, window(7), day(7), &config).unwrap().momentum_score;
            assert!(s > last);
            last = s;
        }
    }

    #[test]
    fn test_threshold_is_strict() {
        assert_eq!(classify(0.5, 0.5), Classification::Stable);
        assert_eq!(classify(0.5000001, 0.5), Classification::Rising);
        assert_eq!(classify(-0.5, 0.5), Classification::Stable);
        assert_eq!(classify(-0.51, 0.5), Classification::Declining);
    }

    #[test]
    fn test_score_exactly_at_threshold_is_stable() {
        // Δpop = 5 → 1.0 * 5 / 10 = 0.5
        let history = vec![snap(0, Some(50), None), snap(7, Some(55), None)];
        let result = score(&history, window(7), day(7), &ScoringConfig::default()).unwrap();
        assert_eq!(result.momentum_score, 0.5);
        assert_eq!(result.classification, Classification::Stable);
    }

    #[test]
    fn test_social_signals_only_compared_within_kind() {
        let mut base = snap(0, None, None);
        base.social_mentions
            .insert("shortvideo".to_string(), SocialSignal::Count(200));
        base.social_mentions
            .insert("microblog".to_string(), SocialSignal::PercentChange(5.0));
        base.social_mentions
            .insert("radio".to_string(), SocialSignal::Count(10));

        let mut recent = snap(7, None, None);
        recent
            .social_mentions
            .insert("shortvideo".to_string(), SocialSignal::Count(300));
        recent
            .social_mentions
            .insert("microblog".to_string(), SocialSignal::PercentChange(15.0));
        recent
            .social_mentions
            .insert("radio".to_string(), SocialSignal::PercentChange(3.0));

        let result = score(&[base, recent], window(7), day(7), &ScoringConfig::default()).unwrap();

        assert_eq!(result.per_platform_delta_pct.len(), 2);
        assert!((result.per_platform_delta_pct["shortvideo"] - 0.5).abs() < 1e-12);
        assert!((result.per_platform_delta_pct["microblog"] - 0.1).abs() < 1e-12);
        // mean 0.3 / 0.1 * 0.25
        assert!((result.momentum_score - 0.75).abs() < 1e-9);
        assert_eq!(result.delta_popularity, None);
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let history = vec![snap(0, Some(31), Some(777)), snap(30, Some(29), Some(901))];
        let config = ScoringConfig::default();
        let a = score(&history, window(30), day(31), &config).unwrap();
        let b = score(&history, window(30), day(31), &config).unwrap();
        assert_eq!(a, b);
    }
}
