//! Batch ingestion across artists
//!
//! Runs the orchestrator for many artists with bounded concurrency and appends
//! each merged snapshot to the store. Passes for the same artist are
//! serialized by a per-artist lock so captures stay ordered; different
//! artists proceed in parallel.

use crate::error::IngestionFailure;
use crate::orchestrator::{IngestionReport, Orchestrator};
use crate::targets::ArtistTarget;
use chartpulse_common::{Error, SnapshotStore};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Per-artist async locks, created on demand
#[derive(Default)]
pub struct ArtistLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ArtistLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock for `artist_id` (the same lock for every caller)
    pub async fn lock_for(&self, artist_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry(artist_id.to_string()).or_default())
    }

    /// Drop the entry for `artist_id` if nobody else holds it
    async fn release(&self, artist_id: &str) {
        let mut locks = self.locks.lock().await;
        if let Some(lock) = locks.get(artist_id) {
            if Arc::strong_count(lock) == 1 {
                locks.remove(artist_id);
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// What happened to one artist in a batch
#[derive(Debug)]
pub enum ArtistOutcome {
    Stored(Box<IngestionReport>),
    Unresolved(IngestionFailure),
    StoreFailed { artist_id: String, error: Error },
    Cancelled { artist_id: String },
}

/// Batch totals
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestionSummary {
    pub succeeded: usize,
    pub unresolved: usize,
    pub store_errors: usize,
    pub cancelled: usize,
}

impl IngestionSummary {
    fn record(&mut self, outcome: &ArtistOutcome) {
        match outcome {
            ArtistOutcome::Stored(_) => self.succeeded += 1,
            ArtistOutcome::Unresolved(_) => self.unresolved += 1,
            ArtistOutcome::StoreFailed { .. } => self.store_errors += 1,
            ArtistOutcome::Cancelled { .. } => self.cancelled += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.unresolved + self.store_errors + self.cancelled
    }
}

pub struct IngestionPool {
    orchestrator: Arc<Orchestrator>,
    store: Arc<dyn SnapshotStore>,
    max_concurrent: usize,
    locks: ArtistLocks,
}

impl IngestionPool {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        store: Arc<dyn SnapshotStore>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            orchestrator,
            store,
            max_concurrent: max_concurrent.max(1),
            locks: ArtistLocks::new(),
        }
    }

    pub fn locks(&self) -> &ArtistLocks {
        &self.locks
    }

    /// Ingest one artist and append the result
    ///
    /// Waits for any in-flight pass for the same artist first.
    pub async fn ingest_one(&self, target: &ArtistTarget) -> ArtistOutcome {
        let lock = self.locks.lock_for(&target.artist_id).await;
        let outcome = {
            let _guard = lock.lock().await;
            self.ingest_locked(target).await
        };
        drop(lock);
        self.locks.release(&target.artist_id).await;
        outcome
    }

    async fn ingest_locked(&self, target: &ArtistTarget) -> ArtistOutcome {
        let report = match self
            .orchestrator
            .ingest(&target.artist_id, &target.handles)
            .await
        {
            Ok(report) => report,
            Err(failure) => return ArtistOutcome::Unresolved(failure),
        };

        match self.store.append(&report.snapshot).await {
            Ok(()) => ArtistOutcome::Stored(Box::new(report)),
            Err(e) => {
                error!(
                    artist_id = %target.artist_id,
                    error = %e,
                    "Failed to append snapshot"
                );
                ArtistOutcome::StoreFailed {
                    artist_id: target.artist_id.clone(),
                    error: e,
                }
            }
        }
    }

    /// Ingest every target with at most `max_concurrent` in flight
    ///
    /// Cancelling `cancel` stops new artists from starting and abandons
    /// in-flight passes without storing them.
    pub async fn run_batch(
        &self,
        targets: Vec<ArtistTarget>,
        cancel: CancellationToken,
    ) -> IngestionSummary {
        info!(
            artists = targets.len(),
            max_concurrent = self.max_concurrent,
            providers = self.orchestrator.provider_count(),
            "Batch ingestion started"
        );

        let outcomes: Vec<ArtistOutcome> = stream::iter(targets)
            .map(|target| {
                let cancel = cancel.clone();
                async move {
                    if cancel.is_cancelled() {
                        return ArtistOutcome::Cancelled {
                            artist_id: target.artist_id,
                        };
                    }
                    let finished = tokio::select! {
                        outcome = self.ingest_one(&target) => Some(outcome),
                        _ = cancel.cancelled() => None,
                    };
                    match finished {
                        Some(outcome) => outcome,
                        None => {
                            warn!(artist_id = %target.artist_id, "Ingestion cancelled");
                            // The abandoned pass never reached its own release
                            self.locks.release(&target.artist_id).await;
                            ArtistOutcome::Cancelled {
                                artist_id: target.artist_id,
                            }
                        }
                    }
                }
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        let mut summary = IngestionSummary::default();
        for outcome in &outcomes {
            summary.record(outcome);
        }

        info!(
            succeeded = summary.succeeded,
            unresolved = summary.unresolved,
            store_errors = summary.store_errors,
            cancelled = summary.cancelled,
            "Batch ingestion complete"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::mock::{MockAdapter, MockBehavior};
    use crate::orchestrator::IngestionPolicy;
    use chartpulse_common::store::MemorySnapshotStore;
    use chartpulse_common::HistoryOrder;
    use serde_json::json;
    use std::time::Duration;

    fn target(artist_id: &str) -> ArtistTarget {
        ArtistTarget {
            artist_id: artist_id.to_string(),
            handles: [("a".to_string(), format!("{}-handle", artist_id))]
                .into_iter()
                .collect(),
        }
    }

    fn pool(behavior: MockBehavior, store: Arc<MemorySnapshotStore>) -> IngestionPool {
        let adapter = Arc::new(MockAdapter::new("a", behavior));
        let policy = IngestionPolicy {
            per_provider_timeout: Duration::from_secs(30),
            max_attempts_per_provider: 1,
            poll_interval: Duration::from_secs(1),
        };
        let orchestrator = Arc::new(Orchestrator::new(vec![adapter], policy));
        IngestionPool::new(orchestrator, store, 2)
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_stores_every_resolved_artist() {
        let store = Arc::new(MemorySnapshotStore::new());
        let pool = pool(
            MockBehavior::Found(json!({ "popularity": 50 })),
            Arc::clone(&store),
        );

        let summary = pool
            .run_batch(
                vec![target("x"), target("y"), target("z")],
                CancellationToken::new(),
            )
            .await;

        assert_eq!(summary.succeeded, 3);
        assert_eq!(summary.total(), 3);
        assert_eq!(store.len().await, 3);
        assert!(pool.locks().is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unresolved_artists_are_counted_not_stored() {
        let store = Arc::new(MemorySnapshotStore::new());
        let pool = pool(MockBehavior::NotFound, Arc::clone(&store));

        let summary = pool
            .run_batch(vec![target("x")], CancellationToken::new())
            .await;

        assert_eq!(summary.unresolved, 1);
        assert!(store.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_batch_stores_nothing() {
        let store = Arc::new(MemorySnapshotStore::new());
        let pool = pool(MockBehavior::Found(json!({ "popularity": 50 })), Arc::clone(&store));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let summary = pool.run_batch(vec![target("x"), target("y")], cancel).await;

        assert_eq!(summary.cancelled, 2);
        assert!(store.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_artist_passes_are_serialized() {
        let store = Arc::new(MemorySnapshotStore::new());
        let pool = pool(MockBehavior::Found(json!({ "popularity": 50 })), Arc::clone(&store));

        let (x1, x2) = (target("x"), target("x"));
        let (first, second) = tokio::join!(pool.ingest_one(&x1), pool.ingest_one(&x2));
        assert!(matches!(first, ArtistOutcome::Stored(_)));
        assert!(matches!(second, ArtistOutcome::Stored(_)));

        let history = store
            .query_history("x", 10, HistoryOrder::OldestFirst)
            .await
            .unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].captured_at <= history[1].captured_at);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_in_flight_pass_releases_its_lock() {
        let store = Arc::new(MemorySnapshotStore::new());
        let pool = pool(MockBehavior::Hang, Arc::clone(&store));

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            trigger.cancel();
        });

        let summary = pool.run_batch(vec![target("x"), target("y")], cancel).await;

        assert_eq!(summary.cancelled, 2);
        assert!(store.is_empty().await);
        assert!(pool.locks().is_empty().await);
    }
}
