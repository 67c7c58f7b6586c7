//! chartpulse-rank - momentum leaderboard and artist detail
//!
//! Reads the snapshot database written by chartpulse-ingest and prints the
//! requested view to stdout as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use chartpulse_common::config::load_config;
use chartpulse_common::logging;
use chartpulse_common::store::SqliteSnapshotStore;
use chartpulse_rank::{LeaderboardQuery, LeaderboardService};

/// Command-line arguments for chartpulse-rank
#[derive(Parser, Debug)]
#[command(name = "chartpulse-rank")]
#[command(about = "Artist momentum leaderboard for ChartPulse")]
#[command(version)]
struct Args {
    /// Config file (takes priority over CHARTPULSE_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rank artists by momentum
    Leaderboard {
        /// Look-back window in days (must be a supported window)
        #[arg(short, long)]
        window: Option<u32>,

        /// Only artists tagged with any of these genres (repeatable)
        #[arg(short, long = "genre")]
        genres: Vec<String>,

        #[arg(short, long, default_value_t = 1)]
        page: usize,

        #[arg(long)]
        page_size: Option<usize>,
    },
    /// Latest snapshot and momentum for one artist
    Artist {
        artist_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    logging::init(&config.logging)?;

    if !config.database_path.exists() {
        anyhow::bail!(
            "No snapshot database at {} (run chartpulse-ingest first)",
            config.database_path.display()
        );
    }
    let store = SqliteSnapshotStore::open(&config.database_path)
        .await
        .context("Failed to open snapshot database")?;

    let default_window = config.ranking.default_window_days;
    let service = LeaderboardService::new(Arc::new(store), config.scoring, config.ranking);

    let output = match args.command {
        Command::Leaderboard {
            window,
            genres,
            page,
            page_size,
        } => {
            let page = service
                .leaderboard(LeaderboardQuery {
                    genres,
                    window_days: window.unwrap_or(default_window),
                    page,
                    page_size,
                })
                .await?;
            serde_json::to_string_pretty(&page)?
        }
        Command::Artist { artist_id } => {
            let detail = service.artist_detail(&artist_id).await?;
            serde_json::to_string_pretty(&detail)?
        }
    };

    println!("{}", output);
    Ok(())
}
