//! Snapshot persistence boundary
//!
//! The core never filters history beyond "most recent at or before a timestamp".
//! Retention and deduplication are the store's business, not the orchestrator's.

pub mod memory;
pub mod sqlite;

pub use memory::MemorySnapshotStore;
pub use sqlite::SqliteSnapshotStore;

use crate::{ArtistSnapshot, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Sort order for [`SnapshotStore::query_history`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryOrder {
    NewestFirst,
    OldestFirst,
}

/// Append-only snapshot history, keyed by artist
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Append one snapshot
    ///
    /// Fails with [`crate::Error::OutOfOrder`] if `captured_at` is earlier than
    /// the artist's latest stored snapshot. Equal timestamps are accepted.
    async fn append(&self, snapshot: &ArtistSnapshot) -> Result<()>;

    /// Up to `max_results` snapshots, sorted by `order` then truncated
    async fn query_history(
        &self,
        artist_id: &str,
        max_results: usize,
        order: HistoryOrder,
    ) -> Result<Vec<ArtistSnapshot>>;

    /// Newest snapshot with `captured_at <= at`; ties resolve to the last appended
    async fn latest_at_or_before(
        &self,
        artist_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<ArtistSnapshot>>;

    /// Every artist with at least one stored snapshot, ascending
    async fn artist_ids(&self) -> Result<Vec<String>>;
}
