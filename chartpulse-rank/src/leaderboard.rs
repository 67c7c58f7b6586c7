//! Leaderboard ranking
//!
//! Filters candidates by genre, scores them in parallel, drops the unscorable,
//! and orders the rest by score descending with `artist_id` as tie-break.
//! Output depends only on the inputs.

use crate::scoring::{self, latest_at_or_before, InsufficientData, MomentumResult};
use chartpulse_common::config::ScoringConfig;
use chartpulse_common::snapshot::normalize_genre;
use chartpulse_common::{ArtistSnapshot, WindowDays};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeSet;

/// One artist's snapshots (any order)
#[derive(Debug, Clone, PartialEq)]
pub struct ArtistHistory {
    pub artist_id: String,
    pub snapshots: Vec<ArtistSnapshot>,
}

/// Leaderboard row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedArtist {
    pub artist_id: String,
    /// Genres of the snapshot the score was taken at
    pub genres: BTreeSet<String>,
    pub momentum: MomentumResult,
}

/// Case-insensitive genre filter; empty matches everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenreFilter {
    genres: BTreeSet<String>,
}

impl GenreFilter {
    pub fn new<I, S>(genres: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            genres: genres
                .into_iter()
                .map(|g| normalize_genre(g.as_ref()))
                .filter(|g| !g.is_empty())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.genres.is_empty()
    }

    pub fn matches(&self, snapshot: &ArtistSnapshot) -> bool {
        self.is_empty() || !self.genres.is_disjoint(&snapshot.normalized_genres())
    }
}

/// Rank candidates with the pure scoring engine
pub fn rank(
    candidates: &[ArtistHistory],
    filter: &GenreFilter,
    window: WindowDays,
    now: DateTime<Utc>,
    limit: usize,
    offset: usize,
    config: &ScoringConfig,
) -> Vec<RankedArtist> {
    rank_with(candidates, filter, now, limit, offset, |candidate| {
        scoring::score(&candidate.snapshots, window, now, config)
    })
}

/// Rank candidates with a caller-supplied scorer
///
/// `score_fn` runs on rayon worker threads and must not depend on call order.
pub fn rank_with<F>(
    candidates: &[ArtistHistory],
    filter: &GenreFilter,
    now: DateTime<Utc>,
    limit: usize,
    offset: usize,
    score_fn: F,
) -> Vec<RankedArtist>
where
    F: Fn(&ArtistHistory) -> Result<MomentumResult, InsufficientData> + Sync,
{
    let mut ranked: Vec<RankedArtist> = candidates
        .par_iter()
        .filter_map(|candidate| {
            let (_, current) = latest_at_or_before(&candidate.snapshots, now)?;
            if !filter.matches(current) {
                return None;
            }
            let momentum = score_fn(candidate).ok()?;
            Some(RankedArtist {
                artist_id: candidate.artist_id.clone(),
                genres: current.genres.clone(),
                momentum,
            })
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.momentum
            .momentum_score
            .total_cmp(&a.momentum.momentum_score)
            .then_with(|| a.artist_id.cmp(&b.artist_id))
    });

    ranked.into_iter().skip(offset).take(limit).collect()
}
