//! # ChartPulse Common Library
//!
//! Shared code for the ChartPulse crates:
//! - Artist snapshot data model
//! - Look-back window type
//! - Snapshot store contract and implementations (SQLite, in-memory)
//! - Configuration loading
//! - Logging setup
//! - Clock abstraction

pub mod config;
pub mod error;
pub mod logging;
pub mod snapshot;
pub mod store;
pub mod time;
pub mod window;

pub use error::{Error, Result};
pub use snapshot::{ArtistSnapshot, MetricFamily, SignalKind, SocialSignal};
pub use store::{HistoryOrder, SnapshotStore};
pub use window::WindowDays;
