//! anitrack CLI
//!
//! Local execution entry point: one-off scans, the hourly watch loop and a
//! few inspection helpers over the record store.

use std::path::PathBuf;
use std::sync::Arc;

use anitrack::{
    error::Result,
    models::Config,
    pipeline::ScanOrchestrator,
    services::{DetailExtractor, Extraction, Fetcher},
    storage::{LocalStorage, RecordStore},
};
use clap::{Parser, Subcommand};

/// anitrack - Anime catalogue episode tracker
#[derive(Parser, Debug)]
#[command(
    name = "anitrack",
    version,
    about = "Tracks new sub and dub episodes in an anime catalogue"
)]
struct Cli {
    /// Path to storage directory holding config.toml and the record store
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a single scan
    Scan,

    /// Scan on a fixed interval until interrupted
    Watch,

    /// Extract one detail page and print the record as JSON
    Inspect {
        /// Detail page URL, absolute or relative to the base URL
        url: String,

        /// Title to attach to the record
        #[arg(long, default_value = "")]
        title: String,
    },

    /// List pending change events
    Events {
        /// Mark the listed events as processed
        #[arg(long)]
        ack: bool,
    },

    /// Validate configuration
    Validate,

    /// Show record store info
    Info,
}

/// Initialize logging; `RUST_LOG` takes precedence over `level`.
fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.storage_dir.join("config.toml");
    let loaded = Config::load(&config_path);
    let level = match (&loaded, cli.verbose) {
        (_, true) => "debug".to_string(),
        (Ok(config), false) => config.logging.level.clone(),
        (Err(_), false) => "info".to_string(),
    };
    init_logging(&level);

    let config = match loaded {
        Ok(config) => {
            log::info!("Loaded configuration from {}", config_path.display());
            config
        }
        Err(e) => {
            log::warn!(
                "Config load failed from {}: {}. Using defaults.",
                config_path.display(),
                e
            );
            Config::default()
        }
    };

    let storage = Arc::new(LocalStorage::new(&cli.storage_dir));

    match cli.command {
        Command::Scan => {
            config.validate()?;
            let orchestrator = ScanOrchestrator::new(&config, storage.clone())?;
            let summary = orchestrator.run().await?;

            let pending = storage.pending_events().await?;
            log::info!(
                "Scan finished ({}); {} pending events",
                summary.stop_reason,
                pending.len()
            );
        }

        Command::Watch => {
            config.validate()?;
            let orchestrator = ScanOrchestrator::new(&config, storage.clone())?;
            log::info!(
                "Watching {} every {}s (Ctrl-C to stop)",
                config.crawler.base_url,
                config.scan.interval_secs
            );

            tokio::select! {
                _ = orchestrator.watch() => {}
                signal = tokio::signal::ctrl_c() => {
                    signal?;
                    log::info!("Interrupted, shutting down");
                }
            }
        }

        Command::Inspect { url, title } => {
            let fetcher = Arc::new(Fetcher::new(&config.crawler)?);
            let extractor = DetailExtractor::new(fetcher, &config.site)?;

            match extractor.extract(&url, &title).await {
                Extraction::Extracted(record) => {
                    println!("{}", serde_json::to_string_pretty(&record)?);
                }
                Extraction::Skipped(reason) => {
                    log::error!("Nothing extracted from {}: {}", url, reason);
                }
            }
        }

        Command::Events { ack } => {
            let pending = storage.pending_events().await?;
            if pending.is_empty() {
                log::info!("No pending events.");
                return Ok(());
            }

            for event in &pending {
                println!(
                    "{}  {:<3}  {}  {}",
                    event.created_at.format("%Y-%m-%d %H:%M:%S"),
                    event.kind,
                    event.title,
                    event.identifier
                );
            }

            if ack {
                let ids: Vec<String> = pending.into_iter().map(|e| e.id).collect();
                let updated = storage.mark_processed(&ids).await?;
                log::info!("Marked {} events as processed", updated);
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK (selectors and patterns compile)");
        }

        Command::Info => {
            log::info!("Storage directory: {}", storage.root_dir().display());
            log::info!("Base URL: {}", config.crawler.base_url);
            log::info!("Stored records: {}", storage.record_count().await?);
            log::info!("Pending events: {}", storage.pending_events().await?.len());
        }
    }

    Ok(())
}
