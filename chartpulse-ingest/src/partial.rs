//! Partial snapshots and gap-filling merge
//!
//! A provider's normalized output is a [`PartialSnapshot`]: the same shape as an
//! [`ArtistSnapshot`] minus identity and capture time. The orchestrator folds
//! partials into one snapshot in provider priority order; a value already
//! present is never overwritten.

use chartpulse_common::{ArtistSnapshot, MetricFamily, SocialSignal};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// One fillable position in a snapshot
///
/// Scalar families (popularity, followers, genres) have no key. Map families
/// either name one entry (`key = Some("tempo")`) or stand for the whole map.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldSlot {
    pub family: MetricFamily,
    pub key: Option<String>,
}

impl FieldSlot {
    pub fn family(family: MetricFamily) -> Self {
        Self { family, key: None }
    }

    pub fn keyed(family: MetricFamily, key: impl Into<String>) -> Self {
        Self {
            family,
            key: Some(key.into()),
        }
    }

    /// Whether `snapshot` already holds a value for this slot
    pub fn is_filled(&self, snapshot: &ArtistSnapshot) -> bool {
        match (self.family, self.key.as_deref()) {
            (MetricFamily::Popularity, _) => snapshot.popularity.is_some(),
            (MetricFamily::Followers, _) => snapshot.followers.is_some(),
            (MetricFamily::Genres, _) => !snapshot.genres.is_empty(),
            (MetricFamily::AudioFeatures, Some(key)) => snapshot.audio_features.contains_key(key),
            (MetricFamily::AudioFeatures, None) => !snapshot.audio_features.is_empty(),
            (MetricFamily::SocialMentions, Some(key)) => snapshot.social_mentions.contains_key(key),
            (MetricFamily::SocialMentions, None) => !snapshot.social_mentions.is_empty(),
        }
    }
}

impl fmt::Display for FieldSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{}.{}", self.family, key),
            None => write!(f, "{}", self.family),
        }
    }
}

/// Normalized output of one provider for one artist
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialSnapshot {
    pub popularity: Option<u8>,
    pub followers: Option<u64>,
    pub genres: BTreeSet<String>,
    pub audio_features: BTreeMap<String, f64>,
    pub social_mentions: BTreeMap<String, SocialSignal>,
}

impl PartialSnapshot {
    pub fn is_empty(&self) -> bool {
        self.popularity.is_none()
            && self.followers.is_none()
            && self.genres.is_empty()
            && self.audio_features.is_empty()
            && self.social_mentions.is_empty()
    }

    /// Fold this partial into `target`, filling only what `target` lacks
    ///
    /// Genres are taken as a whole set, and only when `target` has none, so
    /// two providers' vocabularies are never mixed. Map families are merged
    /// key by key.
    ///
    /// # Returns
    /// Families to which this partial contributed at least one value
    pub fn merge_into(self, target: &mut ArtistSnapshot) -> BTreeSet<MetricFamily> {
        let mut contributed = BTreeSet::new();

        if target.popularity.is_none() && self.popularity.is_some() {
            target.popularity = self.popularity;
            contributed.insert(MetricFamily::Popularity);
        }

        if target.followers.is_none() && self.followers.is_some() {
            target.followers = self.followers;
            contributed.insert(MetricFamily::Followers);
        }

        if target.genres.is_empty() && !self.genres.is_empty() {
            target.genres = self.genres;
            contributed.insert(MetricFamily::Genres);
        }

        for (name, value) in self.audio_features {
            if !target.audio_features.contains_key(&name) {
                target.audio_features.insert(name, value);
                contributed.insert(MetricFamily::AudioFeatures);
            }
        }

        for (platform, signal) in self.social_mentions {
            if !target.social_mentions.contains_key(&platform) {
                target.social_mentions.insert(platform, signal);
                contributed.insert(MetricFamily::SocialMentions);
            }
        }

        contributed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn streaming_partial() -> PartialSnapshot {
        PartialSnapshot {
            popularity: Some(61),
            followers: Some(12_000),
            genres: ["Indie Pop".to_string()].into_iter().collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_merge_fills_empty_snapshot() {
        let mut snap = ArtistSnapshot::new("a", Utc::now());
        let families = streaming_partial().merge_into(&mut snap);

        assert_eq!(snap.popularity, Some(61));
        assert_eq!(snap.followers, Some(12_000));
        assert_eq!(
            families,
            [MetricFamily::Popularity, MetricFamily::Followers, MetricFamily::Genres]
                .into_iter()
                .collect()
        );
    }

    #[test]
    fn test_merge_never_overwrites() {
        let mut snap = ArtistSnapshot::new("a", Utc::now());
        snap.popularity = Some(40);
        snap.genres.insert("jazz".to_string());

        let families = streaming_partial().merge_into(&mut snap);

        assert_eq!(snap.popularity, Some(40));
        assert_eq!(snap.genres.len(), 1);
        assert!(snap.genres.contains("jazz"));
        assert_eq!(families, [MetricFamily::Followers].into_iter().collect());
    }

    #[test]
    fn test_merge_map_families_key_by_key() {
        let mut snap = ArtistSnapshot::new("a", Utc::now());
        snap.social_mentions
            .insert("shortvideo".to_string(), SocialSignal::Count(10));

        let mut partial = PartialSnapshot::default();
        partial
            .social_mentions
            .insert("shortvideo".to_string(), SocialSignal::Count(99));
        partial
            .social_mentions
            .insert("microblog".to_string(), SocialSignal::PercentChange(3.0));

        let families = partial.merge_into(&mut snap);

        assert_eq!(snap.social_mentions["shortvideo"], SocialSignal::Count(10));
        assert_eq!(snap.social_mentions["microblog"], SocialSignal::PercentChange(3.0));
        assert_eq!(families, [MetricFamily::SocialMentions].into_iter().collect());
    }

    #[test]
    fn test_slot_filled() {
        let mut snap = ArtistSnapshot::new("a", Utc::now());
        let tempo = FieldSlot::keyed(MetricFamily::AudioFeatures, "tempo");
        let any_audio = FieldSlot::family(MetricFamily::AudioFeatures);

        assert!(!tempo.is_filled(&snap));
        snap.audio_features.insert("energy".to_string(), 0.7);
        assert!(!tempo.is_filled(&snap));
        assert!(any_audio.is_filled(&snap));

        assert_eq!(tempo.to_string(), "audio_features.tempo");
    }
}
