//! Ingestion orchestrator
//!
//! Produces one [`ArtistSnapshot`] per artist per pass by walking the
//! configured providers in priority order.
//!
//! # Algorithm
//! For each provider, in order:
//! 1. Skip it if the artist has no handle for it, or if every slot it can
//!    fill is already filled by a higher-priority provider
//! 2. Run submit → poll → fetch as one attempt under the per-provider timeout
//! 3. Timeout or adapter error: resubmit while attempts remain
//! 4. Not found: move on immediately (the provider answered; retrying will not help)
//! 5. Found: normalize and merge, filling only what is still missing
//!
//! Provider failures never escape; the only failure is
//! [`IngestionFailure::Unresolved`] when no provider supplied any data.

use crate::adapter::{FetchOutcome, JobOptions, ProviderAdapter, RawRecord};
use crate::error::{AdapterError, IngestionFailure};
use chartpulse_common::config::IngestionConfig;
use chartpulse_common::time::{millis_to_duration, Clock, SystemClock};
use chartpulse_common::{ArtistSnapshot, MetricFamily};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Time and retry budget for one provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionPolicy {
    /// Bound on one submit+poll+fetch attempt
    pub per_provider_timeout: Duration,
    pub max_attempts_per_provider: u32,
    pub poll_interval: Duration,
}

impl From<&IngestionConfig> for IngestionPolicy {
    fn from(config: &IngestionConfig) -> Self {
        Self {
            per_provider_timeout: millis_to_duration(config.per_provider_timeout_ms),
            max_attempts_per_provider: config.max_attempts_per_provider,
            poll_interval: millis_to_duration(config.poll_interval_ms),
        }
    }
}

impl Default for IngestionPolicy {
    fn default() -> Self {
        Self::from(&IngestionConfig::default())
    }
}

/// Lifecycle of one provider job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Submitted,
    Polling,
    /// Record fetched (it may still have contributed nothing)
    Succeeded,
    /// Provider finished and has no data for the handle
    NotFound,
    /// Last attempt ended in an adapter error
    Failed,
    /// Last attempt exceeded the per-provider timeout
    TimedOut,
}

/// One provider's part in an ingestion pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderJob {
    pub provider_id: String,
    pub target_handle: String,
    pub state: JobState,
    pub attempts_used: u32,
    /// Families this provider actually filled
    pub families: BTreeSet<MetricFamily>,
    pub last_error: Option<String>,
}

impl ProviderJob {
    fn new(provider_id: &str, target_handle: &str) -> Self {
        Self {
            provider_id: provider_id.to_string(),
            target_handle: target_handle.to_string(),
            state: JobState::Pending,
            attempts_used: 0,
            families: BTreeSet::new(),
            last_error: None,
        }
    }
}

/// Result of one successful ingestion pass
#[derive(Debug, Clone, Serialize)]
pub struct IngestionReport {
    pub run_id: Uuid,
    pub snapshot: ArtistSnapshot,
    /// Jobs in provider priority order (skipped providers have none)
    pub jobs: Vec<ProviderJob>,
    /// Providers that filled each family, in priority order
    pub provenance: BTreeMap<MetricFamily, Vec<String>>,
    /// Providers passed over (no handle, or nothing left for them to fill)
    pub skipped: Vec<String>,
}

pub struct Orchestrator {
    adapters: Vec<Arc<dyn ProviderAdapter>>,
    policy: IngestionPolicy,
    options: JobOptions,
    clock: Arc<dyn Clock>,
}

impl Orchestrator {
    /// Create orchestrator over adapters in priority order (first = highest)
    pub fn new(adapters: Vec<Arc<dyn ProviderAdapter>>, policy: IngestionPolicy) -> Self {
        Self {
            adapters,
            policy,
            options: JobOptions::default(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_options(mut self, options: JobOptions) -> Self {
        self.options = options;
        self
    }

    pub fn policy(&self) -> &IngestionPolicy {
        &self.policy
    }

    pub fn provider_count(&self) -> usize {
        self.adapters.len()
    }

    /// Run one ingestion pass for an artist
    ///
    /// # Arguments
    /// * `artist_id` - Artist the snapshot belongs to
    /// * `handles` - Provider id → the artist's handle at that provider
    ///
    /// # Returns
    /// Merged snapshot (capture time taken once, at the start of the pass) with
    /// per-job detail and provenance
    ///
    /// # Errors
    /// `Unresolved` if no provider yielded a non-empty record
    pub async fn ingest(
        &self,
        artist_id: &str,
        handles: &HashMap<String, String>,
    ) -> Result<IngestionReport, IngestionFailure> {
        let run_id = Uuid::new_v4();
        let mut snapshot = ArtistSnapshot::new(artist_id, self.clock.now());
        let mut jobs = Vec::new();
        let mut provenance: BTreeMap<MetricFamily, Vec<String>> = BTreeMap::new();
        let mut skipped = Vec::new();

        debug!(artist_id, run_id = %run_id, "Ingestion pass started");

        for adapter in &self.adapters {
            let provider_id = adapter.provider_id();

            let Some(handle) = handles.get(provider_id) else {
                debug!(artist_id, provider = provider_id, "No handle for provider, skipping");
                skipped.push(provider_id.to_string());
                continue;
            };

            let slots = adapter.slots();
            if !slots.is_empty() && slots.iter().all(|slot| slot.is_filled(&snapshot)) {
                debug!(
                    artist_id,
                    provider = provider_id,
                    "All provider slots already filled, skipping"
                );
                skipped.push(provider_id.to_string());
                continue;
            }

            let mut job = ProviderJob::new(provider_id, handle);
            if let Some(record) = self.run_job(adapter.as_ref(), &mut job).await {
                let partial = adapter.normalize(&record);
                if partial.is_empty() {
                    warn!(
                        artist_id,
                        provider = provider_id,
                        "Provider record had no usable fields"
                    );
                } else {
                    job.families = partial.merge_into(&mut snapshot);
                    for family in &job.families {
                        provenance
                            .entry(*family)
                            .or_default()
                            .push(provider_id.to_string());
                    }
                    debug!(
                        artist_id,
                        provider = provider_id,
                        families = ?job.families,
                        "Provider data merged"
                    );
                }
            }
            jobs.push(job);
        }

        if snapshot.is_empty() {
            let attempted: Vec<String> = jobs.iter().map(|j| j.provider_id.clone()).collect();
            warn!(
                artist_id,
                run_id = %run_id,
                attempted = ?attempted,
                "Artist unresolved by every provider"
            );
            return Err(IngestionFailure::Unresolved {
                artist_id: artist_id.to_string(),
                attempted,
            });
        }

        info!(
            artist_id,
            run_id = %run_id,
            families = ?snapshot.families(),
            providers = jobs.iter().filter(|j| !j.families.is_empty()).count(),
            "Ingestion pass complete"
        );

        Ok(IngestionReport {
            run_id,
            snapshot,
            jobs,
            provenance,
            skipped,
        })
    }

    /// Drive one provider through its attempt budget
    ///
    /// # Returns
    /// The fetched record, or `None` when the provider had no data or every
    /// attempt failed (the job's state says which)
    async fn run_job(&self, adapter: &dyn ProviderAdapter, job: &mut ProviderJob) -> Option<RawRecord> {
        while job.attempts_used < self.policy.max_attempts_per_provider {
            job.attempts_used += 1;

            let attempt = tokio::time::timeout(
                self.policy.per_provider_timeout,
                self.attempt(adapter, job),
            )
            .await;

            match attempt {
                Ok(Ok(FetchOutcome::Found(record))) => {
                    job.state = JobState::Succeeded;
                    return Some(record);
                }
                Ok(Ok(FetchOutcome::NotFound)) => {
                    job.state = JobState::NotFound;
                    debug!(
                        provider = %job.provider_id,
                        handle = %job.target_handle,
                        "Provider has no data for handle"
                    );
                    return None;
                }
                Ok(Err(e)) => {
                    job.state = JobState::Failed;
                    job.last_error = Some(e.to_string());
                    warn!(
                        provider = %job.provider_id,
                        attempt = job.attempts_used,
                        max_attempts = self.policy.max_attempts_per_provider,
                        error = %e,
                        "Provider attempt failed"
                    );
                }
                Err(_) => {
                    job.state = JobState::TimedOut;
                    job.last_error = Some(format!(
                        "timed out after {} ms",
                        self.policy.per_provider_timeout.as_millis()
                    ));
                    warn!(
                        provider = %job.provider_id,
                        attempt = job.attempts_used,
                        max_attempts = self.policy.max_attempts_per_provider,
                        timeout_ms = self.policy.per_provider_timeout.as_millis() as u64,
                        "Provider attempt timed out"
                    );
                }
            }
        }

        None
    }

    /// One submit → poll → fetch sequence
    async fn attempt(
        &self,
        adapter: &dyn ProviderAdapter,
        job: &mut ProviderJob,
    ) -> Result<FetchOutcome, AdapterError> {
        let handle = adapter.submit(&job.target_handle, &self.options).await?;
        job.state = JobState::Submitted;

        loop {
            let status = adapter.poll_status(&handle).await?;
            if status.done {
                if !status.data_available {
                    return Ok(FetchOutcome::NotFound);
                }
                break;
            }
            job.state = JobState::Polling;
            tokio::time::sleep(self.policy.poll_interval).await;
        }

        adapter.fetch_result(&handle).await
    }
}
