//! Test Helper Utilities
//!
//! Shared utilities for testing chartpulse-ingest

pub mod scripted_adapter;

pub use scripted_adapter::{ScriptedAdapter, Step};

use chartpulse_ingest::ArtistTarget;
use std::collections::HashMap;

/// Target with one handle per listed provider (`{provider}:{artist}`)
pub fn target(artist_id: &str, providers: &[&str]) -> ArtistTarget {
    let handles: HashMap<String, String> = providers
        .iter()
        .map(|p| (p.to_string(), format!("{}:{}", p, artist_id)))
        .collect();
    ArtistTarget {
        artist_id: artist_id.to_string(),
        handles,
    }
}
