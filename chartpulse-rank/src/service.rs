//! Leaderboard and artist detail views over the snapshot store
//!
//! Loads only the two snapshots scoring needs per artist (newest at or before
//! `now`, newest at or before `now - window`), then ranks with the momentum
//! cache in front of the scoring engine.

use crate::cache::{CacheKey, MomentumCache};
use crate::leaderboard::{rank_with, ArtistHistory, GenreFilter, RankedArtist};
use crate::pagination::calculate_pagination;
use crate::scoring::{score_pair, select_pair, InsufficientData, MomentumResult};
use chartpulse_common::config::{RankingConfig, ScoringConfig};
use chartpulse_common::time::{Clock, SystemClock};
use chartpulse_common::{ArtistSnapshot, Error, Result, SnapshotStore, WindowDays};
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Leaderboard request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeaderboardQuery {
    /// Any-of genre filter; empty = all genres
    pub genres: Vec<String>,
    pub window_days: u32,
    /// 1-indexed; 0 is treated as 1
    pub page: usize,
    /// `None` uses the configured default
    pub page_size: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardPage {
    pub entries: Vec<RankedArtist>,
    pub has_more: bool,
    pub page: usize,
    pub page_size: usize,
    pub window_days: WindowDays,
}

/// Momentum for the detail view; "no data" and "zero" are distinct variants
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum Momentum {
    Scored(MomentumResult),
    Unranked(InsufficientData),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtistDetail {
    pub latest: ArtistSnapshot,
    pub momentum: Momentum,
}

pub struct LeaderboardService {
    store: Arc<dyn SnapshotStore>,
    scoring: ScoringConfig,
    ranking: RankingConfig,
    cache: MomentumCache,
    clock: Arc<dyn Clock>,
}

impl LeaderboardService {
    pub fn new(store: Arc<dyn SnapshotStore>, scoring: ScoringConfig, ranking: RankingConfig) -> Self {
        Self {
            store,
            scoring,
            ranking,
            cache: MomentumCache::new(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn cache(&self) -> &MomentumCache {
        &self.cache
    }

    /// One page of the momentum leaderboard
    ///
    /// # Errors
    /// `InvalidInput` for a window outside `supported_windows`; store errors
    pub async fn leaderboard(&self, query: LeaderboardQuery) -> Result<LeaderboardPage> {
        let window = self.supported_window(query.window_days)?;
        let pagination = calculate_pagination(
            query.page,
            query.page_size.unwrap_or(self.ranking.default_page_size),
            self.ranking.max_page_size,
        );
        let now = self.clock.now();

        let artist_ids = self.store.artist_ids().await?;
        let candidates: Vec<ArtistHistory> = try_join_all(
            artist_ids
                .iter()
                .map(|artist_id| self.load_candidate(artist_id, window, now)),
        )
        .await?
        .into_iter()
        .flatten()
        .collect();

        let filter = GenreFilter::new(&query.genres);
        let mut entries = rank_with(
            &candidates,
            &filter,
            now,
            pagination.fetch_limit(),
            pagination.offset,
            |candidate| self.score_cached(candidate, window, now),
        );

        let has_more = entries.len() > pagination.page_size;
        entries.truncate(pagination.page_size);

        debug!(
            window = %window,
            candidates = candidates.len(),
            page = pagination.page,
            returned = entries.len(),
            has_more,
            "Leaderboard ranked"
        );

        Ok(LeaderboardPage {
            entries,
            has_more,
            page: pagination.page,
            page_size: pagination.page_size,
            window_days: window,
        })
    }

    /// Latest snapshot plus momentum over the default window
    ///
    /// # Errors
    /// `NotFound` if the artist has no snapshot at or before now
    pub async fn artist_detail(&self, artist_id: &str) -> Result<ArtistDetail> {
        let window = WindowDays::new(self.ranking.default_window_days)?;
        let now = self.clock.now();

        let candidate = self
            .load_candidate(artist_id, window, now)
            .await?
            .ok_or_else(|| Error::NotFound(format!("artist {}", artist_id)))?;

        let momentum = match self.score_cached(&candidate, window, now) {
            Ok(result) => Momentum::Scored(result),
            Err(reason) => Momentum::Unranked(reason),
        };

        let latest = candidate
            .snapshots
            .into_iter()
            .last()
            .ok_or_else(|| Error::Internal(format!("empty history for {}", artist_id)))?;

        Ok(ArtistDetail { latest, momentum })
    }

    fn supported_window(&self, days: u32) -> Result<WindowDays> {
        if !self.ranking.supported_windows.contains(&days) {
            return Err(Error::InvalidInput(format!(
                "window {} days not supported (supported: {:?})",
                days, self.ranking.supported_windows
            )));
        }
        WindowDays::new(days)
    }

    /// `[baseline, recent]` for one artist; `None` when nothing exists at or before `now`
    async fn load_candidate(
        &self,
        artist_id: &str,
        window: WindowDays,
        now: DateTime<Utc>,
    ) -> Result<Option<ArtistHistory>> {
        let Some(recent) = self.store.latest_at_or_before(artist_id, now).await? else {
            return Ok(None);
        };
        let baseline = match window.start_before(now) {
            Some(cutoff) => self.store.latest_at_or_before(artist_id, cutoff).await?,
            None => None,
        };

        let mut snapshots = Vec::with_capacity(2);
        // Same stored row on both ends collapses to one element
        if let Some(baseline) = baseline.filter(|b| *b != recent) {
            snapshots.push(baseline);
        }
        snapshots.push(recent);

        Ok(Some(ArtistHistory {
            artist_id: artist_id.to_string(),
            snapshots,
        }))
    }

    fn score_cached(
        &self,
        candidate: &ArtistHistory,
        window: WindowDays,
        now: DateTime<Utc>,
    ) -> std::result::Result<MomentumResult, InsufficientData> {
        let (recent, baseline) = select_pair(&candidate.snapshots, window, now)?;
        let key = CacheKey::new(&candidate.artist_id, window, recent, baseline);
        self.cache.get_or_compute(key, recent, baseline, || {
            score_pair(recent, baseline, window, &self.scoring)
        })
    }
}
