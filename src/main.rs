// Allow dead code - library-shaped items are kept for API completeness
#![allow(dead_code)]

//! Pod Network Indexer
//!
//! Standalone indexing service for pod storage networks. Each run
//! discovers the pod set through well-known entry nodes, enriches every
//! pod with live telemetry, geolocation and accrued credits, computes a
//! composite score, and persists node rows plus append-only snapshots.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       POD INDEXER                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Entry-Node Discovery   ←── bootstrap list per network      │
//! │  Stat Normalizer        ←── absorbs RPC field drift         │
//! │  Per-Pod Enricher       ←── live stats / geo / credits      │
//! │  Scoring Engine         ←── 4-factor composite score        │
//! │  Node Store (RocksDB)   ←── node upserts + snapshots        │
//! │  HTTP API (8080)        ←── status, metrics, run trigger    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

mod api;
mod config;
mod context;
mod credits;
mod discovery;
mod enrich;
mod geo;
mod indexer;
mod normalize;
mod rpc;
mod scoring;
mod store;
mod types;

use api::{ApiState, IndexerMetrics};
use config::IndexerConfig;
use indexer::Indexer;
use store::{MemoryStore, NodeStore, RocksStore};
use types::Network;

/// Pod network indexer - discovery, enrichment, scoring, snapshots
#[derive(Parser, Debug)]
#[command(name = "pod-indexer")]
#[command(author = "PodScan Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Network indexer for pod storage networks", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "indexer.toml")]
    config: PathBuf,

    /// Data directory for the node store
    #[arg(short, long, default_value = "./data")]
    data_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one indexing pass and exit
    Run {
        /// Logical network to index (mainnet, devnet)
        #[arg(long, default_value = "devnet")]
        network: String,

        /// Index into an in-memory store; nothing touches disk
        #[arg(long)]
        dry_run: bool,

        /// Override the pipeline concurrency bound
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Index on a schedule and serve the HTTP API
    Serve {
        /// Override the seconds between scheduled runs
        #[arg(long)]
        interval: Option<u64>,

        /// Override the HTTP API port
        #[arg(long)]
        api_port: Option<u16>,

        /// Override the pipeline concurrency bound
        #[arg(long)]
        concurrency: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .init();

    info!("Pod Indexer v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = if args.config.exists() {
        IndexerConfig::load(&args.config)?
    } else {
        warn!("Config file not found, using defaults");
        IndexerConfig::default()
    };

    match args.command {
        Command::Run {
            network,
            dry_run,
            concurrency,
        } => {
            let config = config.with_concurrency(concurrency);
            config.validate()?;

            let network: Network = network
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))?;

            let store: Arc<dyn NodeStore> = if dry_run {
                info!("Dry run: using in-memory store");
                Arc::new(MemoryStore::new())
            } else {
                open_store(&args.data_dir).await?
            };

            let metrics = Arc::new(IndexerMetrics::new());
            let indexer = Indexer::new(Arc::new(config), store.clone(), metrics)?;

            let report = indexer.run(network).await;
            store.flush().await?;

            info!(
                network = %report.network,
                discovered = report.discovered,
                processed = report.processed,
                failed = report.failed,
                "run finished"
            );

            if !report.success {
                anyhow::bail!(
                    "indexing failed: {}",
                    report.message.unwrap_or_else(|| "unknown error".to_string())
                );
            }
        }

        Command::Serve {
            interval,
            api_port,
            concurrency,
        } => {
            let config = config
                .with_run_interval(interval)
                .with_api_port(api_port)
                .with_concurrency(concurrency);
            config.validate()?;

            info!("Configuration:");
            info!("   API port: {}", config.api_port);
            info!("   Run interval: {}s", config.run_interval_secs);
            info!("   Concurrency: {}", config.concurrency);
            info!("   Networks: {:?}", config.serve_networks);

            let shared_config = Arc::new(config);
            let store = open_store(&args.data_dir).await?;
            let metrics = Arc::new(IndexerMetrics::new());
            let indexer = Arc::new(Indexer::new(
                shared_config.clone(),
                store.clone(),
                metrics.clone(),
            )?);

            let state = Arc::new(ApiState {
                config: shared_config.clone(),
                store: store.clone(),
                indexer: indexer.clone(),
                metrics,
            });

            let scheduler_handle = tokio::spawn(run_scheduler(
                shared_config.clone(),
                indexer.clone(),
            ));
            let api_handle = tokio::spawn(api::run_api_server(state));

            info!("All services started");
            info!("   Press Ctrl+C to shutdown gracefully");

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                }
                result = scheduler_handle => {
                    error!("Scheduler exited: {:?}", result);
                }
                result = api_handle => {
                    error!("HTTP API exited: {:?}", result);
                }
            }

            store.flush().await?;
            info!("Node store flushed to disk");
        }
    }

    info!("Pod Indexer shutting down");
    Ok(())
}

/// Open the RocksDB store under the data directory
async fn open_store(data_dir: &PathBuf) -> anyhow::Result<Arc<dyn NodeStore>> {
    tokio::fs::create_dir_all(data_dir).await?;
    let store_path = data_dir.join("index-db");
    let store = RocksStore::open(&store_path)?;
    info!("Node store opened at {:?}", store_path);
    Ok(Arc::new(store))
}

/// Periodic indexing runs across the configured networks.
///
/// The first tick fires immediately, so a freshly started service indexes
/// right away instead of waiting a full interval.
async fn run_scheduler(
    config: Arc<IndexerConfig>,
    indexer: Arc<Indexer>,
) -> anyhow::Result<()> {
    let mut interval =
        tokio::time::interval(std::time::Duration::from_secs(config.run_interval_secs));

    loop {
        interval.tick().await;

        for network in &config.serve_networks {
            let report = indexer.run(*network).await;
            if !report.success {
                warn!(
                    network = %network,
                    message = ?report.message,
                    "scheduled run failed"
                );
            }
        }
    }
}
