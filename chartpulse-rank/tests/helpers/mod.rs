//! Test Helper Utilities
//!
//! Snapshot seeding for chartpulse-rank tests

use chartpulse_common::store::SqliteSnapshotStore;
use chartpulse_common::{ArtistSnapshot, SnapshotStore};
use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::TempDir;

/// Day `d` of the test calendar
pub fn day(d: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(d)
}

/// Snapshot with popularity, followers and genres
pub fn snapshot(
    artist_id: &str,
    d: i64,
    popularity: Option<u8>,
    followers: Option<u64>,
    genres: &[&str],
) -> ArtistSnapshot {
    let mut s = ArtistSnapshot::new(artist_id, day(d));
    s.popularity = popularity;
    s.followers = followers;
    s.genres = genres.iter().map(|g| g.to_string()).collect();
    s
}

/// File-backed store in a temp dir (keep the `TempDir` alive for the test)
pub async fn create_test_store() -> (TempDir, SqliteSnapshotStore) {
    let temp_dir = TempDir::new().unwrap();
    let store = SqliteSnapshotStore::open(&temp_dir.path().join("chartpulse.db"))
        .await
        .unwrap();
    (temp_dir, store)
}

pub async fn seed(store: &SqliteSnapshotStore, snapshots: Vec<ArtistSnapshot>) {
    for s in snapshots {
        store.append(&s).await.unwrap();
    }
}
