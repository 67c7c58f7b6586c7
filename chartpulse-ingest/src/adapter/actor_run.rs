//! Actor-run scraping API client
//!
//! Drives hosted scrapers ("actors") through three endpoints:
//! - `POST {base}/acts/{actor}/runs` starts a run with the artist handle as input
//! - `GET {base}/actor-runs/{run}` reports run status
//! - `GET {base}/datasets/{dataset}/items` returns the scraped records
//!
//! Requests are rate limited per provider. Record normalization is delegated
//! to the provider's [`FieldTable`].

use super::{FetchOutcome, FieldTable, JobHandle, JobOptions, PollStatus, ProviderAdapter, RawRecord};
use crate::error::{AdapterError, AdapterErrorKind};
use crate::partial::{FieldSlot, PartialSnapshot};
use async_trait::async_trait;
use chartpulse_common::config::ProviderConfig;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

/// Per-request HTTP timeout; the orchestrator bounds the whole attempt separately
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Error bodies are truncated to this many bytes
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Deserialize)]
struct RunEnvelope {
    data: RunInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunInfo {
    id: String,
    status: String,
    #[serde(default)]
    default_dataset_id: Option<String>,
}

pub struct ActorRunAdapter {
    provider_id: String,
    base_url: String,
    actor_id: String,
    token: Option<String>,
    input: Map<String, Value>,
    table: FieldTable,
    slots: Vec<FieldSlot>,
    client: reqwest::Client,
    rate_limiter: governor::RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl ActorRunAdapter {
    /// Build from a provider config row
    ///
    /// # Errors
    /// `Config` when the field table is invalid, the token variable is unset,
    /// the rate is zero, or the HTTP client cannot be built.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, AdapterError> {
        let config_error =
            |msg: String| AdapterError::new(&config.id, AdapterErrorKind::Config(msg));

        let table = FieldTable::from_config(config.profile.as_deref(), &config.fields)
            .map_err(config_error)?;

        let slots = match &config.families {
            Some(families) => families.iter().copied().map(FieldSlot::family).collect(),
            None => table.slots(),
        };

        let token = match &config.token_env {
            Some(var) => Some(std::env::var(var).map_err(|_| {
                config_error(format!("token environment variable {} is not set", var))
            })?),
            None => None,
        };

        let rps = NonZeroU32::new(config.requests_per_second)
            .ok_or_else(|| config_error("requests_per_second must be at least 1".to_string()))?;
        let rate_limiter = governor::RateLimiter::direct(governor::Quota::per_second(rps));

        let client = reqwest::Client::builder()
            .user_agent(concat!("chartpulse/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| config_error(format!("HTTP client: {}", e)))?;

        Ok(Self {
            provider_id: config.id.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            actor_id: config.actor_id.clone(),
            token,
            input: config.options.clone(),
            table,
            slots,
            client,
            rate_limiter,
        })
    }

    fn error(&self, cause: AdapterErrorKind) -> AdapterError {
        AdapterError::new(&self.provider_id, cause)
    }

    /// Run input: configured options plus the handle and record limit
    fn run_input(&self, target_handle: &str, options: &JobOptions) -> Value {
        let mut input = self.input.clone();
        input.insert("handle".to_string(), Value::String(target_handle.to_string()));
        input.insert("maxItems".to_string(), Value::from(options.max_items));
        Value::Object(input)
    }

    /// Rate-limited send; non-success statuses become `Api` errors except those in `passthrough`
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        passthrough: &[StatusCode],
    ) -> Result<reqwest::Response, AdapterError> {
        self.rate_limiter.until_ready().await;

        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request
            .send()
            .await
            .map_err(|e| self.error(AdapterErrorKind::Network(e.to_string())))?;

        let status = response.status();
        if status.is_success() || passthrough.contains(&status) {
            return Ok(response);
        }

        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        Err(self.error(AdapterErrorKind::Api {
            status: status.as_u16(),
            body,
        }))
    }

    async fn parse<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T, AdapterError> {
        response
            .json::<T>()
            .await
            .map_err(|e| self.error(AdapterErrorKind::Parse(e.to_string())))
    }

    async fn run_info(&self, run_id: &str) -> Result<RunInfo, AdapterError> {
        let url = format!("{}/actor-runs/{}", self.base_url, run_id);
        let response = self.send(self.client.get(&url), &[]).await?;
        Ok(self.parse::<RunEnvelope>(response).await?.data)
    }
}

/// Map a run status string to a poll result
fn run_status(provider_id: &str, status: &str) -> Result<PollStatus, AdapterError> {
    match status {
        "READY" | "RUNNING" | "TIMING-OUT" | "ABORTING" => Ok(PollStatus::PENDING),
        "SUCCEEDED" => Ok(PollStatus::READY),
        "FAILED" | "ABORTED" | "TIMED-OUT" => Err(AdapterError::new(
            provider_id,
            AdapterErrorKind::RunFailed(status.to_string()),
        )),
        other => Err(AdapterError::new(
            provider_id,
            AdapterErrorKind::Parse(format!("unknown run status '{}'", other)),
        )),
    }
}

#[async_trait]
impl ProviderAdapter for ActorRunAdapter {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    fn slots(&self) -> Vec<FieldSlot> {
        self.slots.clone()
    }

    async fn submit(
        &self,
        target_handle: &str,
        options: &JobOptions,
    ) -> Result<JobHandle, AdapterError> {
        let url = format!("{}/acts/{}/runs", self.base_url, self.actor_id);
        let request = self
            .client
            .post(&url)
            .json(&self.run_input(target_handle, options));

        let response = self.send(request, &[]).await?;
        let run = self.parse::<RunEnvelope>(response).await?.data;

        debug!(
            provider = %self.provider_id,
            run_id = %run.id,
            status = %run.status,
            "Actor run submitted"
        );

        Ok(JobHandle {
            provider_id: self.provider_id.clone(),
            job_id: run.id,
            result_ref: run.default_dataset_id,
        })
    }

    async fn poll_status(&self, handle: &JobHandle) -> Result<PollStatus, AdapterError> {
        let run = self.run_info(&handle.job_id).await?;
        debug!(
            provider = %self.provider_id,
            run_id = %run.id,
            status = %run.status,
            "Actor run polled"
        );
        run_status(&self.provider_id, &run.status)
    }

    async fn fetch_result(&self, handle: &JobHandle) -> Result<FetchOutcome, AdapterError> {
        let dataset_id = match &handle.result_ref {
            Some(id) => id.clone(),
            None => self
                .run_info(&handle.job_id)
                .await?
                .default_dataset_id
                .ok_or_else(|| {
                    self.error(AdapterErrorKind::Parse(format!(
                        "run {} has no dataset",
                        handle.job_id
                    )))
                })?,
        };

        let url = format!("{}/datasets/{}/items", self.base_url, dataset_id);
        let request = self
            .client
            .get(&url)
            .query(&[("format", "json"), ("clean", "true")]);
        let response = self.send(request, &[StatusCode::NOT_FOUND]).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(FetchOutcome::NotFound);
        }

        let items: Vec<Value> = self.parse(response).await?;
        match items.into_iter().next() {
            Some(record @ Value::Object(_)) => Ok(FetchOutcome::Found(RawRecord(record))),
            _ => Ok(FetchOutcome::NotFound),
        }
    }

    fn normalize(&self, record: &RawRecord) -> PartialSnapshot {
        self.table.normalize(record)
    }
}
