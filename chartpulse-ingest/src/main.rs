//! chartpulse-ingest - scheduled artist metric ingestion
//!
//! Loads the artist target list, runs one ingestion pass per artist across the
//! configured providers, and appends the merged snapshots to the store. The
//! batch summary is printed to stdout as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

use chartpulse_common::config::load_config;
use chartpulse_common::logging;
use chartpulse_common::store::{MemorySnapshotStore, SqliteSnapshotStore};
use chartpulse_common::SnapshotStore;
use chartpulse_ingest::{build_adapters, load_targets, IngestionPolicy, IngestionPool, Orchestrator};

/// Command-line arguments for chartpulse-ingest
#[derive(Parser, Debug)]
#[command(name = "chartpulse-ingest")]
#[command(about = "Artist metric ingestion for ChartPulse")]
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
    /// Ingest every artist in a targets file
    Run {
        /// TOML file listing artists and their provider handles
        #[arg(short, long)]
        targets: PathBuf,

        /// Keep snapshots in memory instead of writing the database
        #[arg(long)]
        dry_run: bool,
    },
    /// List configured providers in priority order with the slots they fill
    Providers,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    logging::init(&config.logging)?;

    let adapters = build_adapters(&config.providers).context("Failed to build providers")?;

    match args.command {
        Command::Providers => {
            let listing: Vec<_> = adapters
                .iter()
                .map(|adapter| {
                    json!({
                        "id": adapter.provider_id(),
                        "slots": adapter.slots().iter().map(|s| s.to_string()).collect::<Vec<_>>(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&listing)?);
        }
        Command::Run { targets, dry_run } => {
            if adapters.is_empty() {
                anyhow::bail!("No providers configured");
            }

            let targets = load_targets(&targets)?;
            info!(
                "Starting chartpulse-ingest {} ({} artists, {} providers)",
                env!("CARGO_PKG_VERSION"),
                targets.len(),
                adapters.len()
            );

            let store: Arc<dyn SnapshotStore> = if dry_run {
                info!("Dry run: snapshots kept in memory");
                Arc::new(MemorySnapshotStore::new())
            } else {
                info!("Database: {}", config.database_path.display());
                Arc::new(
                    SqliteSnapshotStore::open(&config.database_path)
                        .await
                        .context("Failed to open snapshot database")?,
                )
            };

            let orchestrator = Arc::new(Orchestrator::new(
                adapters,
                IngestionPolicy::from(&config.ingestion),
            ));
            let pool = IngestionPool::new(
                orchestrator,
                store,
                config.ingestion.max_concurrent_artists,
            );

            let cancel = CancellationToken::new();
            tokio::spawn(cancel_on_shutdown(cancel.clone()));

            let summary = pool.run_batch(targets, cancel).await;
            println!("{}", serde_json::to_string_pretty(&summary)?);

            if summary.total() > 0 && summary.succeeded == 0 {
                anyhow::bail!("No artist was ingested");
            }
        }
    }

    Ok(())
}

/// Cancel the batch on Ctrl+C or SIGTERM
async fn cancel_on_shutdown(cancel: CancellationToken) {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, cancelling batch");
        },
        _ = terminate => {
            info!("Received terminate signal, cancelling batch");
        },
    }
    cancel.cancel();
}
