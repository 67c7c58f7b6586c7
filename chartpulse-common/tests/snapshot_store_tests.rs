//! Integration tests for the file-backed snapshot store
//!
//! Covers:
//! - Persistence across reopen
//! - Append ordering per artist
//! - At-or-before lookup used by the scoring read path

use chartpulse_common::store::{HistoryOrder, SnapshotStore, SqliteSnapshotStore};
use chartpulse_common::{ArtistSnapshot, Error, SocialSignal};
use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::TempDir;

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()
}

fn snapshot(artist: &str, day: i64, popularity: u8, followers: u64) -> ArtistSnapshot {
    let mut s = ArtistSnapshot::new(artist, base_time() + Duration::days(day));
    s.popularity = Some(popularity);
    s.followers = Some(followers);
    s.genres.insert("indie".to_string());
    s
}

#[tokio::test]
async fn test_snapshots_survive_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("chartpulse.db");

    {
        let store = SqliteSnapshotStore::open(&db_path).await.unwrap();
        store.append(&snapshot("artist-a", 0, 50, 1000)).await.unwrap();
        store.append(&snapshot("artist-a", 14, 58, 1100)).await.unwrap();
        store.pool().close().await;
    }

    let store = SqliteSnapshotStore::open(&db_path).await.unwrap();
    let history = store
        .query_history("artist-a", 10, HistoryOrder::OldestFirst)
        .await
        .unwrap();

    assert_eq!(history.len(), 2);
    assert_eq!(history[0].popularity, Some(50));
    assert_eq!(history[1].followers, Some(1100));
    assert!(history[1].genres.contains("indie"));
}

#[tokio::test]
async fn test_append_order_is_per_artist() {
    let temp_dir = TempDir::new().unwrap();
    let store = SqliteSnapshotStore::open(&temp_dir.path().join("db.sqlite"))
        .await
        .unwrap();

    store.append(&snapshot("artist-a", 10, 50, 1000)).await.unwrap();
    // Earlier timestamp for a different artist is fine
    store.append(&snapshot("artist-b", 1, 40, 500)).await.unwrap();

    let err = store
        .append(&snapshot("artist-a", 3, 51, 1001))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::OutOfOrder { ref artist_id, .. } if artist_id == "artist-a"));

    assert_eq!(
        store.artist_ids().await.unwrap(),
        vec!["artist-a".to_string(), "artist-b".to_string()]
    );
}

#[tokio::test]
async fn test_latest_at_or_before_boundaries() {
    let store = SqliteSnapshotStore::in_memory().await.unwrap();
    store.append(&snapshot("a", 0, 50, 1000)).await.unwrap();
    store.append(&snapshot("a", 7, 54, 1050)).await.unwrap();
    store.append(&snapshot("a", 14, 58, 1100)).await.unwrap();

    // Exactly on a capture time is inclusive
    let exact = store
        .latest_at_or_before("a", base_time() + Duration::days(7))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(exact.popularity, Some(54));

    let between = store
        .latest_at_or_before("a", base_time() + Duration::days(13))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(between.popularity, Some(54));

    assert!(store
        .latest_at_or_before("a", base_time() - Duration::seconds(1))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_social_signals_keep_their_kind() {
    let store = SqliteSnapshotStore::in_memory().await.unwrap();
    let mut s = ArtistSnapshot::new("a", base_time());
    s.social_mentions
        .insert("shortvideo".to_string(), SocialSignal::Count(320));
    s.social_mentions
        .insert("microblog".to_string(), SocialSignal::PercentChange(-4.5));
    s.audio_features.insert("tempo".to_string(), 128.0);
    store.append(&s).await.unwrap();

    let loaded = store
        .query_history("a", 1, HistoryOrder::NewestFirst)
        .await
        .unwrap()
        .remove(0);
    assert_eq!(
        loaded.social_mentions.get("shortvideo"),
        Some(&SocialSignal::Count(320))
    );
    assert_eq!(
        loaded.social_mentions.get("microblog"),
        Some(&SocialSignal::PercentChange(-4.5))
    );
    assert_eq!(loaded.audio_features.get("tempo"), Some(&128.0));
}
