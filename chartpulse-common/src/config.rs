//! Configuration loading
//!
//! One TOML file (`chartpulse.toml`) bootstraps both binaries. Every section is
//! optional; missing sections and keys fall back to built-in defaults.
//!
//! # Config file resolution priority
//! 1. Command-line argument (`--config`)
//! 2. Environment variable (`CHARTPULSE_CONFIG`)
//! 3. Platform config dir (`~/.config/chartpulse/chartpulse.toml` on Linux)
//! 4. Built-in defaults
//!
//! `CHARTPULSE_DATABASE` overrides `database_path` after the file is loaded.

use crate::snapshot::{MetricFamily, SignalKind};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "CHARTPULSE_CONFIG";

/// Environment variable overriding the database path
pub const DATABASE_ENV_VAR: &str = "CHARTPULSE_DATABASE";

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Path to the SQLite snapshot database
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub ingestion: IngestionConfig,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub ranking: RankingConfig,

    /// Providers in priority order (first = highest priority)
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            logging: LoggingConfig::default(),
            ingestion: IngestionConfig::default(),
            scoring: ScoringConfig::default(),
            ranking: RankingConfig::default(),
            providers: Vec::new(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Orchestrator timing and retry budget
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Time allowed for one submit+poll+fetch attempt at one provider
    #[serde(default = "default_per_provider_timeout_ms")]
    pub per_provider_timeout_ms: u64,

    /// Submissions allowed per provider (timeouts and transport errors consume one each)
    #[serde(default = "default_max_attempts")]
    pub max_attempts_per_provider: u32,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Worker slots for batch ingestion across artists
    #[serde(default = "default_max_concurrent_artists")]
    pub max_concurrent_artists: usize,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            per_provider_timeout_ms: default_per_provider_timeout_ms(),
            max_attempts_per_provider: default_max_attempts(),
            poll_interval_ms: default_poll_interval_ms(),
            max_concurrent_artists: default_max_concurrent_artists(),
        }
    }
}

/// Momentum score weights and normalization scales
///
/// `score = popularity_weight * (Δpopularity / popularity_scale)
///        + followers_weight  * (Δfollowers% / percent_scale)
///        + social_weight     * (mean platform Δ% / percent_scale)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_popularity_weight")]
    pub popularity_weight: f64,

    #[serde(default = "default_followers_weight")]
    pub followers_weight: f64,

    #[serde(default = "default_social_weight")]
    pub social_weight: f64,

    /// Popularity points that count as one unit of score input
    #[serde(default = "default_popularity_scale")]
    pub popularity_scale: f64,

    /// Fractional change that counts as one unit of score input (0.10 = 10%)
    #[serde(default = "default_percent_scale")]
    pub percent_scale: f64,

    /// Rising above `+threshold`, Declining below `-threshold` (both strict)
    #[serde(default = "default_classification_threshold")]
    pub classification_threshold: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            popularity_weight: default_popularity_weight(),
            followers_weight: default_followers_weight(),
            social_weight: default_social_weight(),
            popularity_scale: default_popularity_scale(),
            percent_scale: default_percent_scale(),
            classification_threshold: default_classification_threshold(),
        }
    }
}

/// Leaderboard consumer boundary settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    /// Windows (days) the leaderboard accepts
    #[serde(default = "default_supported_windows")]
    pub supported_windows: Vec<u32>,

    /// Window used by the artist detail view
    #[serde(default = "default_window_days")]
    pub default_window_days: u32,

    #[serde(default = "default_page_size")]
    pub default_page_size: usize,

    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            supported_windows: default_supported_windows(),
            default_window_days: default_window_days(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

/// Provider kinds the ingest binary knows how to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Actor-run scraping API (submit run, poll run, read dataset)
    #[default]
    ActorRun,
}

/// One scraping provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider id; artist target handles are keyed by this
    pub id: String,

    #[serde(default)]
    pub kind: ProviderKind,

    pub base_url: String,

    /// Scraper ("actor") to run at the provider
    pub actor_id: String,

    /// Environment variable holding the API token
    #[serde(default)]
    pub token_env: Option<String>,

    /// Built-in field table profile ("streaming", "short_video")
    #[serde(default)]
    pub profile: Option<String>,

    /// Families this provider supplies; derived from the field table when omitted
    #[serde(default)]
    pub families: Option<Vec<MetricFamily>>,

    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Extra input merged into the run submission body
    #[serde(default)]
    pub options: serde_json::Map<String, serde_json::Value>,

    /// Field table rows appended after the profile rows
    #[serde(default)]
    pub fields: Vec<FieldRowConfig>,
}

/// Field table row declared in TOML
///
/// `key` names the audio feature or social platform for map-valued families.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldRowConfig {
    pub family: MetricFamily,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub kind: Option<SignalKind>,
    /// Dotted JSON paths, highest priority first
    pub candidates: Vec<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_per_provider_timeout_ms() -> u64 {
    120_000
}

fn default_max_attempts() -> u32 {
    2
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

fn default_max_concurrent_artists() -> usize {
    4
}

fn default_popularity_weight() -> f64 {
    1.0
}

fn default_followers_weight() -> f64 {
    0.5
}

fn default_social_weight() -> f64 {
    0.25
}

fn default_popularity_scale() -> f64 {
    10.0
}

fn default_percent_scale() -> f64 {
    0.10
}

fn default_classification_threshold() -> f64 {
    0.5
}

fn default_supported_windows() -> Vec<u32> {
    vec![7, 14, 30, 90]
}

fn default_window_days() -> u32 {
    14
}

fn default_page_size() -> usize {
    20
}

fn default_max_page_size() -> usize {
    100
}

fn default_requests_per_second() -> u32 {
    2
}

/// OS-dependent default database location
fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("chartpulse"))
        .unwrap_or_else(|| PathBuf::from("./chartpulse_data"))
        .join("chartpulse.db")
}

/// Default config file location for the platform
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("chartpulse").join("chartpulse.toml"))
}

impl TomlConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        let ingestion = &self.ingestion;
        if ingestion.max_attempts_per_provider == 0 {
            return Err(Error::Config(
                "ingestion.max_attempts_per_provider must be at least 1".to_string(),
            ));
        }
        if ingestion.per_provider_timeout_ms == 0 || ingestion.poll_interval_ms == 0 {
            return Err(Error::Config(
                "ingestion timeouts and poll interval must be positive".to_string(),
            ));
        }
        if ingestion.max_concurrent_artists == 0 {
            return Err(Error::Config(
                "ingestion.max_concurrent_artists must be at least 1".to_string(),
            ));
        }

        let scoring = &self.scoring;
        let knobs = [
            ("popularity_weight", scoring.popularity_weight),
            ("followers_weight", scoring.followers_weight),
            ("social_weight", scoring.social_weight),
            ("popularity_scale", scoring.popularity_scale),
            ("percent_scale", scoring.percent_scale),
            ("classification_threshold", scoring.classification_threshold),
        ];
        if let Some((name, _)) = knobs.iter().find(|(_, value)| !value.is_finite()) {
            return Err(Error::Config(format!("scoring.{} must be finite", name)));
        }
        if !(scoring.popularity_scale > 0.0 && scoring.percent_scale > 0.0) {
            return Err(Error::Config(
                "scoring scales must be positive".to_string(),
            ));
        }
        if !(scoring.classification_threshold >= 0.0) {
            return Err(Error::Config(
                "scoring.classification_threshold must be non-negative".to_string(),
            ));
        }

        let ranking = &self.ranking;
        if ranking.supported_windows.is_empty() || ranking.supported_windows.contains(&0) {
            return Err(Error::Config(
                "ranking.supported_windows must be non-empty and positive".to_string(),
            ));
        }
        if !ranking.supported_windows.contains(&ranking.default_window_days) {
            return Err(Error::Config(format!(
                "ranking.default_window_days ({}) is not in supported_windows",
                ranking.default_window_days
            )));
        }
        if ranking.max_page_size == 0 {
            return Err(Error::Config(
                "ranking.max_page_size must be at least 1".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for provider in &self.providers {
            if !seen.insert(provider.id.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate provider id: {}",
                    provider.id
                )));
            }
            if provider.requests_per_second == 0 {
                return Err(Error::Config(format!(
                    "provider {}: requests_per_second must be at least 1",
                    provider.id
                )));
            }
        }

        Ok(())
    }
}

/// Pick the config file following the resolution priority
///
/// Returns the path and whether it was requested explicitly on the command line.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<(PathBuf, bool)> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some((path.to_path_buf(), true));
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some((PathBuf::from(path), false));
        }
    }

    // Priority 3: Platform config dir
    default_config_path().map(|p| (p, false))
}

/// Load configuration with graceful degradation
///
/// A file named on the command line must exist. Any other missing file logs a
/// warning and yields built-in defaults.
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    let mut config = match resolve_config_path(cli_arg) {
        Some((path, _)) if path.exists() => {
            info!(path = %path.display(), "Loading configuration");
            TomlConfig::from_file(&path)?
        }
        Some((path, true)) => {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        Some((path, false)) => {
            warn!(
                path = %path.display(),
                "Config file not found, using built-in defaults"
            );
            TomlConfig::default()
        }
        None => {
            warn!("Could not determine config directory, using built-in defaults");
            TomlConfig::default()
        }
    };

    if let Ok(db) = std::env::var(DATABASE_ENV_VAR) {
        if !db.trim().is_empty() {
            info!(database = %db, "Database path overridden by environment");
            config.database_path = PathBuf::from(db);
        }
    }

    Ok(config)
}
