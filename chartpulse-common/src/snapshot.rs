//! Artist snapshot data model
//!
//! One [`ArtistSnapshot`] is one point-in-time observation of an artist's public
//! metrics. Every numeric field is optional: `None` means the provider had no
//! data, which is not the same thing as an observed zero.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Metric families a provider can supply
///
/// Ingestion tracks which provider supplied each family so that a lower-priority
/// provider only fills the gaps left by higher-priority ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricFamily {
    Popularity,
    Followers,
    Genres,
    AudioFeatures,
    SocialMentions,
}

impl MetricFamily {
    /// All families, in declaration order
    pub const ALL: [MetricFamily; 5] = [
        MetricFamily::Popularity,
        MetricFamily::Followers,
        MetricFamily::Genres,
        MetricFamily::AudioFeatures,
        MetricFamily::SocialMentions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricFamily::Popularity => "popularity",
            MetricFamily::Followers => "followers",
            MetricFamily::Genres => "genres",
            MetricFamily::AudioFeatures => "audio_features",
            MetricFamily::SocialMentions => "social_mentions",
        }
    }
}

impl fmt::Display for MetricFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One platform's social signal
///
/// Providers report either a raw count (e.g. videos using the artist's sound) or
/// their own growth percentage. Two observations are only comparable when both
/// use the same variant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SocialSignal {
    Count(u64),
    PercentChange(f64),
}

/// Which [`SocialSignal`] variant a raw provider value should become
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    #[default]
    Count,
    PercentChange,
}

/// Point-in-time observation of one artist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistSnapshot {
    /// Opaque artist identifier
    pub artist_id: String,
    /// Capture time (non-decreasing across one artist's history)
    pub captured_at: DateTime<Utc>,
    /// Platform popularity index, 0-100
    #[serde(default)]
    pub popularity: Option<u8>,
    /// Follower count
    #[serde(default)]
    pub followers: Option<u64>,
    #[serde(default)]
    pub genres: BTreeSet<String>,
    /// Named audio signals in each provider's native range (tempo in BPM, most others 0-1)
    #[serde(default)]
    pub audio_features: BTreeMap<String, f64>,
    /// Platform name -> signal; an absent key means the provider had no data
    #[serde(default)]
    pub social_mentions: BTreeMap<String, SocialSignal>,
}

impl ArtistSnapshot {
    /// Create an empty snapshot (no metric observed yet)
    pub fn new(artist_id: impl Into<String>, captured_at: DateTime<Utc>) -> Self {
        Self {
            artist_id: artist_id.into(),
            captured_at,
            popularity: None,
            followers: None,
            genres: BTreeSet::new(),
            audio_features: BTreeMap::new(),
            social_mentions: BTreeMap::new(),
        }
    }

    /// Families that carry at least one observed value
    pub fn families(&self) -> BTreeSet<MetricFamily> {
        let mut present = BTreeSet::new();
        if self.popularity.is_some() {
            present.insert(MetricFamily::Popularity);
        }
        if self.followers.is_some() {
            present.insert(MetricFamily::Followers);
        }
        if !self.genres.is_empty() {
            present.insert(MetricFamily::Genres);
        }
        if !self.audio_features.is_empty() {
            present.insert(MetricFamily::AudioFeatures);
        }
        if !self.social_mentions.is_empty() {
            present.insert(MetricFamily::SocialMentions);
        }
        present
    }

    /// True when no metric at all was observed
    pub fn is_empty(&self) -> bool {
        self.families().is_empty()
    }

    /// Genres lowercased and trimmed, for filter matching
    pub fn normalized_genres(&self) -> BTreeSet<String> {
        self.genres.iter().map(|g| normalize_genre(g)).collect()
    }
}

/// Canonical form used when comparing genre labels
pub fn normalize_genre(genre: &str) -> String {
    genre.trim().to_lowercase()
}
