//! # ChartPulse Rank
//!
//! Read side of ChartPulse: momentum scoring and leaderboard ranking over
//! stored artist snapshots.
//!
//! - [`scoring`] - pure two-snapshot momentum engine
//! - [`leaderboard`] - genre filter, parallel scoring, deterministic ordering
//! - [`cache`] - momentum results keyed by the snapshot pair they came from
//! - [`service`] - leaderboard and artist detail views over a snapshot store

pub mod cache;
pub mod leaderboard;
pub mod pagination;
pub mod scoring;
pub mod service;

pub use leaderboard::{rank, ArtistHistory, GenreFilter, RankedArtist};
pub use scoring::{score, Classification, InsufficientData, MomentumResult};
pub use service::{ArtistDetail, LeaderboardPage, LeaderboardQuery, LeaderboardService, Momentum};
