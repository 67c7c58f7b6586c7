//! Scripted provider adapter
//!
//! Plays back a fixed sequence of steps, one per submission, and records what
//! the orchestrator asked of it.

use async_trait::async_trait;
use chartpulse_common::MetricFamily;
use chartpulse_ingest::adapter::{
    FetchOutcome, FieldTable, JobHandle, JobOptions, PollStatus, ProviderAdapter, RawRecord,
};
use chartpulse_ingest::{AdapterError, AdapterErrorKind, FieldSlot, PartialSnapshot};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// What one submission does
#[derive(Debug, Clone)]
pub enum Step {
    /// Job never finishes
    Hang,
    /// Polling fails with a network error
    Error,
    /// Job finishes with no data
    NotFound,
    /// Job finishes after `polls` pending polls and yields the record
    Record { polls: u32, value: Value },
}

impl Step {
    pub fn record(value: Value) -> Self {
        Step::Record { polls: 0, value }
    }
}

struct Job {
    step: Step,
    polls_seen: u32,
}

pub struct ScriptedAdapter {
    id: String,
    slots: Vec<FieldSlot>,
    script: Mutex<VecDeque<Step>>,
    fallback: Step,
    jobs: Mutex<HashMap<String, Job>>,
    submitted_handles: Mutex<Vec<String>>,
    active: AtomicUsize,
    peak_active: AtomicUsize,
    table: FieldTable,
}

impl ScriptedAdapter {
    /// Adapter answering every submission with `step`
    pub fn always(id: &str, step: Step) -> Self {
        Self::new(id, Vec::new(), step)
    }

    /// Adapter playing `script` in order, then `fallback` forever
    pub fn new(id: &str, script: Vec<Step>, fallback: Step) -> Self {
        let mut table = FieldTable::profile("streaming").expect("streaming profile");
        table.extend(FieldTable::profile("short_video").expect("short_video profile"));
        Self {
            id: id.to_string(),
            slots: MetricFamily::ALL.iter().copied().map(FieldSlot::family).collect(),
            script: Mutex::new(script.into()),
            fallback,
            jobs: Mutex::new(HashMap::new()),
            submitted_handles: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            peak_active: AtomicUsize::new(0),
            table,
        }
    }

    pub fn with_slots(mut self, slots: Vec<FieldSlot>) -> Self {
        self.slots = slots;
        self
    }

    pub fn submissions(&self) -> usize {
        self.submitted_handles.lock().unwrap().len()
    }

    pub fn submitted_handles(&self) -> Vec<String> {
        self.submitted_handles.lock().unwrap().clone()
    }

    /// Most jobs that were between submit and completion at once
    pub fn peak_active(&self) -> usize {
        self.peak_active.load(Ordering::SeqCst)
    }

    fn finish(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    fn error(&self, msg: &str) -> AdapterError {
        AdapterError::new(&self.id, AdapterErrorKind::Network(msg.to_string()))
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn provider_id(&self) -> &str {
        &self.id
    }

    fn slots(&self) -> Vec<FieldSlot> {
        self.slots.clone()
    }

    async fn submit(
        &self,
        target_handle: &str,
        _options: &JobOptions,
    ) -> Result<JobHandle, AdapterError> {
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        let job_id = {
            let mut handles = self.submitted_handles.lock().unwrap();
            handles.push(target_handle.to_string());
            format!("{}-{}", self.id, handles.len())
        };

        if !matches!(step, Step::Hang) {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_active.fetch_max(now, Ordering::SeqCst);
        }

        self.jobs
            .lock()
            .unwrap()
            .insert(job_id.clone(), Job { step, polls_seen: 0 });

        Ok(JobHandle {
            provider_id: self.id.clone(),
            job_id,
            result_ref: None,
        })
    }

    async fn poll_status(&self, handle: &JobHandle) -> Result<PollStatus, AdapterError> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(&handle.job_id)
            .ok_or_else(|| self.error("unknown job"))?;

        match &job.step {
            Step::Hang => Ok(PollStatus::PENDING),
            Step::Error => {
                self.finish();
                Err(self.error("scripted failure"))
            }
            Step::NotFound => {
                self.finish();
                Ok(PollStatus::NO_DATA)
            }
            Step::Record { polls, .. } => {
                if job.polls_seen < *polls {
                    job.polls_seen += 1;
                    Ok(PollStatus::PENDING)
                } else {
                    Ok(PollStatus::READY)
                }
            }
        }
    }

    async fn fetch_result(&self, handle: &JobHandle) -> Result<FetchOutcome, AdapterError> {
        let step = self
            .jobs
            .lock()
            .unwrap()
            .get(&handle.job_id)
            .map(|job| job.step.clone());

        match step {
            Some(Step::Record { value, .. }) => {
                self.finish();
                Ok(FetchOutcome::Found(RawRecord(value)))
            }
            _ => Ok(FetchOutcome::NotFound),
        }
    }

    fn normalize(&self, record: &RawRecord) -> PartialSnapshot {
        self.table.normalize(record)
    }
}
