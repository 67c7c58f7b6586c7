//! Momentum result cache
//!
//! A result depends only on the `(recent, baseline)` pair and the scoring
//! configuration, which is fixed for the life of a service. Entries are keyed
//! by artist, window, and both capture times, and a hit is only served when
//! the stored pair equals the requested pair (equal timestamps may be appended
//! twice).

use crate::scoring::{InsufficientData, MomentumResult};
use chartpulse_common::{ArtistSnapshot, WindowDays};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

/// Entries held before the cache is flushed
pub const DEFAULT_CAPACITY: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub artist_id: String,
    pub window: WindowDays,
    pub recent_captured_at: DateTime<Utc>,
    pub baseline_captured_at: DateTime<Utc>,
}

impl CacheKey {
    pub fn new(
        artist_id: &str,
        window: WindowDays,
        recent: &ArtistSnapshot,
        baseline: &ArtistSnapshot,
    ) -> Self {
        Self {
            artist_id: artist_id.to_string(),
            window,
            recent_captured_at: recent.captured_at,
            baseline_captured_at: baseline.captured_at,
        }
    }
}

struct CacheEntry {
    recent: ArtistSnapshot,
    baseline: ArtistSnapshot,
    result: Result<MomentumResult, InsufficientData>,
}

/// Hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

pub struct MomentumCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for MomentumCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl MomentumCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Cached result for this exact pair, or compute and store it
    pub fn get_or_compute<F>(
        &self,
        key: CacheKey,
        recent: &ArtistSnapshot,
        baseline: &ArtistSnapshot,
        compute: F,
    ) -> Result<MomentumResult, InsufficientData>
    where
        F: FnOnce() -> Result<MomentumResult, InsufficientData>,
    {
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = entries.get(&key) {
                if entry.recent == *recent && entry.baseline == *baseline {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return entry.result.clone();
                }
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let result = compute();

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            entries.clear();
        }
        entries.insert(
            key,
            CacheEntry {
                recent: recent.clone(),
                baseline: baseline.clone(),
                result: result.clone(),
            },
        );
        result
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
