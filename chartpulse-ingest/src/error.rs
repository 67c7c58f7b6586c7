//! Error types for chartpulse-ingest
//!
//! Provider-level failures ([`AdapterError`]) never leave the orchestrator;
//! only [`IngestionFailure`] is surfaced, and callers treat it as
//! "skip this artist", not as a crash.

use thiserror::Error;

/// Transport or parse failure at one provider
#[derive(Debug, Error)]
#[error("provider {provider_id}: {cause}")]
pub struct AdapterError {
    pub provider_id: String,
    pub cause: AdapterErrorKind,
}

impl AdapterError {
    pub fn new(provider_id: impl Into<String>, cause: AdapterErrorKind) -> Self {
        Self {
            provider_id: provider_id.into(),
            cause,
        }
    }
}

/// What went wrong at the provider
#[derive(Debug, Error)]
pub enum AdapterErrorKind {
    /// Network communication error
    #[error("Network error: {0}")]
    Network(String),

    /// Provider API answered with a non-success status
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    /// Failed to parse response
    #[error("Parse error: {0}")]
    Parse(String),

    /// Scrape job ended without producing a result (failed, aborted, timed out remotely)
    #[error("Run ended with status {0}")]
    RunFailed(String),

    /// Adapter could not be built from its configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Ingestion outcome that must be reported to the caller
#[derive(Debug, Error)]
pub enum IngestionFailure {
    /// No provider yielded any data for the artist
    #[error("artist {artist_id} unresolved by any provider (attempted: {})", attempted.join(", "))]
    Unresolved {
        artist_id: String,
        attempted: Vec<String>,
    },
}
