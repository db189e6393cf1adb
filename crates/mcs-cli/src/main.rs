use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mcs_adapters::{FixtureSource, RecordSource, SketchfabSource};
use mcs_storage::{MemoryStore, PgRecordStore, RecordStore};
use mcs_sync::{
    observer_from_config, spawn_index_build, DailyScheduler, Observer, SyncConfig, SyncPipeline,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "mcs-cli")]
#[command(about = "Model catalog sync command-line interface")]
struct Cli {
    /// Read the batch from a JSON fixture instead of the live API.
    #[arg(long, global = true)]
    fixture: Option<PathBuf>,
    /// Keep records in process memory instead of Postgres.
    #[arg(long, global = true)]
    memory: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a single sync pass and exit.
    Once,
    /// Run a pass now, then once a day at the fire time.
    Schedule {
        /// Local fire time, HH:MM. Overrides MCS_SCHEDULE_TIME.
        #[arg(long)]
        time: Option<String>,
    },
    /// Print the number of stored records.
    Count,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = SyncConfig::from_env();
    let observer = observer_from_config(&config);

    let result = run(&cli, &config, Arc::clone(&observer)).await;
    observer.shutdown().await;
    result
}

async fn run(cli: &Cli, config: &SyncConfig, observer: Arc<dyn Observer>) -> Result<()> {
    let store = open_store(config, cli.memory).await?;

    match cli.command.as_ref().unwrap_or(&Commands::Once) {
        Commands::Once => {
            let pipeline = build_pipeline(cli, config, store, observer)?;
            let report = pipeline.run_once().await?;
            println!(
                "sync complete: run_id={} fetched={} inserted={} updated={} unchanged={} total={}",
                report.run_id,
                report.fetched,
                report.outcome.inserted,
                report.outcome.updated,
                report.outcome.unchanged,
                report
                    .total_in_store
                    .map(|total| total.to_string())
                    .unwrap_or_else(|| "unknown".to_string())
            );
        }
        Commands::Schedule { time } => {
            let fire_time = time.clone().unwrap_or_else(|| config.schedule_time.clone());
            let pipeline = build_pipeline(cli, config, store, Arc::clone(&observer))?;
            let scheduler = Arc::new(DailyScheduler::new(Arc::new(pipeline), &fire_time, observer));
            let cancel = CancellationToken::new();

            let shutdown = {
                let scheduler = Arc::clone(&scheduler);
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    wait_for_shutdown_signal().await;
                    tracing::info!("shutdown signal received");
                    scheduler.stop();
                    cancel.cancel();
                })
            };

            let exit = scheduler.start(cancel).await?;
            shutdown.abort();
            println!("scheduler exited: {exit:?}");
        }
        Commands::Count => {
            let total = store.count().await.context("counting stored records")?;
            println!("{total}");
        }
    }

    Ok(())
}

async fn open_store(config: &SyncConfig, memory: bool) -> Result<Arc<dyn RecordStore>> {
    if memory {
        return Ok(Arc::new(MemoryStore::new()));
    }
    let store = PgRecordStore::connect(&config.store_config())
        .await
        .with_context(|| format!("connecting to record store at {}", config.database_url))?;
    store
        .ensure_schema()
        .await
        .context("creating record store schema")?;
    Ok(Arc::new(store))
}

fn build_pipeline(
    cli: &Cli,
    config: &SyncConfig,
    store: Arc<dyn RecordStore>,
    observer: Arc<dyn Observer>,
) -> Result<SyncPipeline> {
    let source: Arc<dyn RecordSource> = match &cli.fixture {
        Some(path) => Arc::new(FixtureSource::new(path.clone())),
        None => Arc::new(SketchfabSource::new(config.source_config()).context("building Sketchfab client")?),
    };
    spawn_index_build(Arc::clone(&store), Arc::clone(&observer));
    Ok(SyncPipeline::new(source, store, observer).with_concurrency(config.reconcile_concurrency))
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "SIGTERM handler unavailable, listening for ctrl-c only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
