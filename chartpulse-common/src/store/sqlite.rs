//! SQLite snapshot store
//!
//! Timestamps are stored as UTC microseconds so ordering and the
//! at-or-before lookup are plain integer comparisons. Map and set fields are
//! JSON text columns.

use super::{HistoryOrder, SnapshotStore};
use crate::{ArtistSnapshot, Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use tracing::{debug, info};

const SNAPSHOT_COLUMNS: &str =
    "artist_id, captured_at_us, popularity, followers, genres, audio_features, social_mentions";

/// Snapshot store on a SQLite pool
#[derive(Debug, Clone)]
pub struct SqliteSnapshotStore {
    pool: SqlitePool,
}

impl SqliteSnapshotStore {
    /// Open (or create) the database file and ensure the schema exists
    pub async fn open(db_path: &Path) -> Result<Self> {
        let newly_created = !db_path.exists();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(&db_url)
            .await?;

        // WAL: concurrent readers alongside one writer
        sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
        sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

        if newly_created {
            info!("Initialized new database: {}", db_path.display());
        } else {
            info!("Opened existing database: {}", db_path.display());
        }

        Self::from_pool(pool).await
    }

    /// Private in-memory database (single connection so every query sees the same data)
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, creating tables if needed
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        create_snapshot_table(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn latest_captured_at(&self, artist_id: &str) -> Result<Option<DateTime<Utc>>> {
        let latest: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(captured_at_us) FROM artist_snapshots WHERE artist_id = ?",
        )
        .bind(artist_id)
        .fetch_one(&self.pool)
        .await?;

        latest.map(micros_to_datetime).transpose()
    }
}

/// Create the snapshot table and its lookup index (idempotent)
async fn create_snapshot_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS artist_snapshots (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            artist_id TEXT NOT NULL,
            captured_at_us INTEGER NOT NULL,
            popularity INTEGER CHECK (popularity IS NULL OR popularity BETWEEN 0 AND 100),
            followers INTEGER CHECK (followers IS NULL OR followers >= 0),
            genres TEXT NOT NULL DEFAULT '[]',
            audio_features TEXT NOT NULL DEFAULT '{}',
            social_mentions TEXT NOT NULL DEFAULT '{}'
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_artist_snapshots_artist_time
        ON artist_snapshots (artist_id, captured_at_us, seq)
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

fn micros_to_datetime(micros: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| Error::Internal(format!("Stored timestamp out of range: {}", micros)))
}

fn snapshot_from_row(row: &SqliteRow) -> Result<ArtistSnapshot> {
    let popularity: Option<i64> = row.try_get("popularity")?;
    let followers: Option<i64> = row.try_get("followers")?;
    let genres: String = row.try_get("genres")?;
    let audio_features: String = row.try_get("audio_features")?;
    let social_mentions: String = row.try_get("social_mentions")?;

    Ok(ArtistSnapshot {
        artist_id: row.try_get("artist_id")?,
        captured_at: micros_to_datetime(row.try_get("captured_at_us")?)?,
        popularity: popularity
            .map(u8::try_from)
            .transpose()
            .map_err(|e| Error::Internal(format!("Stored popularity out of range: {}", e)))?,
        followers: followers
            .map(u64::try_from)
            .transpose()
            .map_err(|e| Error::Internal(format!("Stored followers out of range: {}", e)))?,
        genres: serde_json::from_str(&genres)?,
        audio_features: serde_json::from_str(&audio_features)?,
        social_mentions: serde_json::from_str(&social_mentions)?,
    })
}

#[async_trait]
impl SnapshotStore for SqliteSnapshotStore {
    async fn append(&self, snapshot: &ArtistSnapshot) -> Result<()> {
        let captured_at_us = snapshot.captured_at.timestamp_micros();
        let followers = snapshot
            .followers
            .map(i64::try_from)
            .transpose()
            .map_err(|_| Error::InvalidInput("follower count exceeds storage range".to_string()))?;

        // Insert only when nothing newer exists, in one statement
        let result = sqlx::query(&format!(
            r#"
            INSERT INTO artist_snapshots ({SNAPSHOT_COLUMNS})
            SELECT ?, ?, ?, ?, ?, ?, ?
            WHERE NOT EXISTS (
                SELECT 1 FROM artist_snapshots WHERE artist_id = ? AND captured_at_us > ?
            )
            "#
        ))
        .bind(&snapshot.artist_id)
        .bind(captured_at_us)
        .bind(snapshot.popularity.map(i64::from))
        .bind(followers)
        .bind(serde_json::to_string(&snapshot.genres)?)
        .bind(serde_json::to_string(&snapshot.audio_features)?)
        .bind(serde_json::to_string(&snapshot.social_mentions)?)
        .bind(&snapshot.artist_id)
        .bind(captured_at_us)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let latest = self
                .latest_captured_at(&snapshot.artist_id)
                .await?
                .unwrap_or(snapshot.captured_at);
            return Err(Error::OutOfOrder {
                artist_id: snapshot.artist_id.clone(),
                captured_at: snapshot.captured_at,
                latest,
            });
        }

        debug!(
            artist_id = %snapshot.artist_id,
            captured_at = %snapshot.captured_at,
            "Snapshot appended"
        );
        Ok(())
    }

    async fn query_history(
        &self,
        artist_id: &str,
        max_results: usize,
        order: HistoryOrder,
    ) -> Result<Vec<ArtistSnapshot>> {
        let direction = match order {
            HistoryOrder::NewestFirst => "DESC",
            HistoryOrder::OldestFirst => "ASC",
        };
        let limit = i64::try_from(max_results).unwrap_or(i64::MAX);

        let rows = sqlx::query(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM artist_snapshots WHERE artist_id = ? \
             ORDER BY captured_at_us {direction}, seq {direction} LIMIT ?"
        ))
        .bind(artist_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(snapshot_from_row).collect()
    }

    async fn latest_at_or_before(
        &self,
        artist_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<ArtistSnapshot>> {
        let row = sqlx::query(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM artist_snapshots \
             WHERE artist_id = ? AND captured_at_us <= ? \
             ORDER BY captured_at_us DESC, seq DESC LIMIT 1"
        ))
        .bind(artist_id)
        .bind(at.timestamp_micros())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(snapshot_from_row).transpose()
    }

    async fn artist_ids(&self) -> Result<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT artist_id FROM artist_snapshots ORDER BY artist_id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}
