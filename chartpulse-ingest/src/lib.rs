//! # ChartPulse Ingest
//!
//! Collects artist metric snapshots from unreliable scraping providers.
//!
//! - [`adapter`] - uniform submit/poll/fetch/normalize contract and the HTTP adapter
//! - [`orchestrator`] - priority-ordered fallback with per-provider timeout and retry budget
//! - [`pool`] - bounded-concurrency batch runs with per-artist serialization
//! - [`targets`] - artist target list loading

pub mod adapter;
pub mod error;
pub mod orchestrator;
pub mod partial;
pub mod pool;
pub mod targets;

pub use adapter::{build_adapters, ProviderAdapter};
pub use error::{AdapterError, AdapterErrorKind, IngestionFailure};
pub use orchestrator::{IngestionPolicy, IngestionReport, JobState, Orchestrator, ProviderJob};
pub use partial::{FieldSlot, PartialSnapshot};
pub use pool::{ArtistOutcome, IngestionPool, IngestionSummary};
pub use targets::{load_targets, ArtistTarget};
