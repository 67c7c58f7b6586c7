//! In-memory snapshot store (tests and dry runs)

use super::{HistoryOrder, SnapshotStore};
use crate::{ArtistSnapshot, Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Snapshot store backed by a map of per-artist vectors in append order
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    histories: RwLock<BTreeMap<String, Vec<ArtistSnapshot>>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total snapshots across all artists
    pub async fn len(&self) -> usize {
        self.histories.read().await.values().map(Vec::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn append(&self, snapshot: &ArtistSnapshot) -> Result<()> {
        let mut histories = self.histories.write().await;
        let history = histories.entry(snapshot.artist_id.clone()).or_default();

        if let Some(latest) = history.last() {
            if snapshot.captured_at < latest.captured_at {
                return Err(Error::OutOfOrder {
                    artist_id: snapshot.artist_id.clone(),
                    captured_at: snapshot.captured_at,
                    latest: latest.captured_at,
                });
            }
        }

        history.push(snapshot.clone());
        Ok(())
    }

    async fn query_history(
        &self,
        artist_id: &str,
        max_results: usize,
        order: HistoryOrder,
    ) -> Result<Vec<ArtistSnapshot>> {
        let histories = self.histories.read().await;
        let Some(history) = histories.get(artist_id) else {
            return Ok(Vec::new());
        };

        let selected = match order {
            HistoryOrder::NewestFirst => history.iter().rev().take(max_results).cloned().collect(),
            HistoryOrder::OldestFirst => history.iter().take(max_results).cloned().collect(),
        };
        Ok(selected)
    }

    async fn latest_at_or_before(
        &self,
        artist_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<ArtistSnapshot>> {
        let histories = self.histories.read().await;
        Ok(histories
            .get(artist_id)
            .and_then(|history| history.iter().rev().find(|s| s.captured_at <= at))
            .cloned())
    }

    async fn artist_ids(&self) -> Result<Vec<String>> {
        Ok(self.histories.read().await.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn snap(artist: &str, day: u32, popularity: u8) -> ArtistSnapshot {
        let mut s = ArtistSnapshot::new(artist, Utc.with_ymd_and_hms(2024, 5, day, 0, 0, 0).unwrap());
        s.popularity = Some(popularity);
        s
    }

    #[tokio::test]
    async fn test_append_and_query_newest_first() {
        let store = MemorySnapshotStore::new();
        store.append(&snap("a", 1, 10)).await.unwrap();
        store.append(&snap("a", 2, 20)).await.unwrap();
        store.append(&snap("a", 3, 30)).await.unwrap();

        let history = store.query_history("a", 2, HistoryOrder::NewestFirst).await.unwrap();
        let pops: Vec<_> = history.iter().map(|s| s.popularity).collect();
        assert_eq!(pops, vec![Some(30), Some(20)]);

        let history = store.query_history("a", 2, HistoryOrder::OldestFirst).await.unwrap();
        let pops: Vec<_> = history.iter().map(|s| s.popularity).collect();
        assert_eq!(pops, vec![Some(10), Some(20)]);
    }

    #[tokio::test]
    async fn test_out_of_order_append_rejected() {
        let store = MemorySnapshotStore::new();
        store.append(&snap("a", 5, 10)).await.unwrap();

        let err = store.append(&snap("a", 4, 11)).await.unwrap_err();
        assert!(matches!(err, Error::OutOfOrder { .. }));
        assert_eq!(store.len().await, 1);

        // Other artists are independent
        store.append(&snap("b", 4, 11)).await.unwrap();
    }

    #[tokio::test]
    async fn test_equal_timestamps_last_appended_wins() {
        let store = MemorySnapshotStore::new();
        store.append(&snap("a", 5, 10)).await.unwrap();
        store.append(&snap("a", 5, 12)).await.unwrap();

        let at = Utc.with_ymd_and_hms(2024, 5, 5, 0, 0, 0).unwrap();
        let latest = store.latest_at_or_before("a", at).await.unwrap().unwrap();
        assert_eq!(latest.popularity, Some(12));
    }

    #[tokio::test]
    async fn test_latest_at_or_before() {
        let store = MemorySnapshotStore::new();
        store.append(&snap("a", 1, 10)).await.unwrap();
        store.append(&snap("a", 10, 20)).await.unwrap();

        let mid = Utc.with_ymd_and_hms(2024, 5, 6, 0, 0, 0).unwrap();
        let found = store.latest_at_or_before("a", mid).await.unwrap().unwrap();
        assert_eq!(found.popularity, Some(10));

        let before_all = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        assert!(store.latest_at_or_before("a", before_all).await.unwrap().is_none());
        assert!(store.latest_at_or_before("missing", mid).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_artist_ids_sorted() {
        let store = MemorySnapshotStore::new();
        store.append(&snap("zeta", 1, 1)).await.unwrap();
        store.append(&snap("alpha", 1, 1)).await.unwrap();
        assert_eq!(store.artist_ids().await.unwrap(), vec!["alpha", "zeta"]);
    }
}
