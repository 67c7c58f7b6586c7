//! Provider adapters
//!
//! Every scraping provider is driven through the same asynchronous job
//! protocol: submit a job for an artist handle, poll it until done, fetch the
//! single result record, normalize the record into a [`PartialSnapshot`].
//!
//! # Adapters
//! - **actor_run** - HTTP "actor run" scraping APIs (submit run, poll run, read dataset)
//! - **field_table** - data-driven raw field → metric mapping shared by adapters
//!
//! Adapters do no retrying and no timing of their own; the orchestrator owns
//! the time budget and the attempt count.

pub mod actor_run;
pub mod field_table;

pub use actor_run::ActorRunAdapter;
pub use field_table::{FieldRule, FieldTable};

use crate::error::AdapterError;
use crate::partial::{FieldSlot, PartialSnapshot};
use async_trait::async_trait;
use chartpulse_common::config::{ProviderConfig, ProviderKind};
use serde_json::Value;
use std::sync::Arc;

/// Reference to a submitted job at one provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub provider_id: String,
    /// Provider-assigned job id
    pub job_id: String,
    /// Where the result will be readable once done (dataset id for actor runs)
    pub result_ref: Option<String>,
}

/// Per-submission options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOptions {
    /// Records requested from the scraper
    pub max_items: u32,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self { max_items: 1 }
    }
}

/// Result of one status poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollStatus {
    pub done: bool,
    /// Meaningful only when `done`
    pub data_available: bool,
}

impl PollStatus {
    pub const PENDING: PollStatus = PollStatus {
        done: false,
        data_available: false,
    };

    pub const READY: PollStatus = PollStatus {
        done: true,
        data_available: true,
    };

    pub const NO_DATA: PollStatus = PollStatus {
        done: true,
        data_available: false,
    };
}

/// Raw provider record (one JSON object)
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord(pub Value);

impl RawRecord {
    /// Resolve a dotted path (`stats.followerCount`, `items.0.name`)
    ///
    /// Numeric segments index arrays. JSON `null` counts as absent.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut current = &self.0;
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        match current {
            Value::Null => None,
            value => Some(value),
        }
    }
}

/// Outcome of reading a finished job
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Found(RawRecord),
    /// Job finished but the provider has no data for the handle
    NotFound,
}

/// Uniform contract over scraping providers
///
/// # Errors
/// Every remote call returns [`AdapterError`] on transport, API, or parse
/// failure. "No data for this artist" is not an error; it is
/// [`PollStatus::NO_DATA`] or [`FetchOutcome::NotFound`].
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider id; artist handles are keyed by it
    fn provider_id(&self) -> &str;

    /// Slots this provider can fill; the orchestrator skips the provider once all are filled
    fn slots(&self) -> Vec<FieldSlot>;

    /// Start a scrape job for `target_handle`
    async fn submit(
        &self,
        target_handle: &str,
        options: &JobOptions,
    ) -> Result<JobHandle, AdapterError>;

    async fn poll_status(&self, handle: &JobHandle) -> Result<PollStatus, AdapterError>;

    async fn fetch_result(&self, handle: &JobHandle) -> Result<FetchOutcome, AdapterError>;

    /// Map a raw record to metric families; absent or unusable fields stay absent
    fn normalize(&self, record: &RawRecord) -> PartialSnapshot;
}

/// Build adapters from configuration, preserving priority order
pub fn build_adapters(
    providers: &[ProviderConfig],
) -> Result<Vec<Arc<dyn ProviderAdapter>>, AdapterError> {
    providers
        .iter()
        .map(|config| -> Result<Arc<dyn ProviderAdapter>, AdapterError> {
            match config.kind {
                ProviderKind::ActorRun => Ok(Arc::new(ActorRunAdapter::from_config(config)?)),
            }
        })
        .collect()
}

// ============================================================================
// Mock Adapter for Testing
// ============================================================================
