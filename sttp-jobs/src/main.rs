//! sttp-jobs - transcription job pipeline
//!
//! One-shot phase commands plus a `run` mode that repeats the batch cycle
//! on a fixed interval and serves the read-only status API.
//!
//! A single process is assumed to own the job database. Running two
//! cycles against the same database at once is not supported.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sttp_common::config::{self, TomlConfig};
use sttp_common::db::init_pool;
use sttp_jobs::db::{SqliteJobStore, SqliteTranscriptStore};
use sttp_jobs::services::{ClientConfig, Pipeline, PipelineOptions, RecappClient};
use sttp_jobs::{logging, AppState};

/// Command-line arguments for sttp-jobs
#[derive(Parser, Debug)]
#[command(name = "sttp-jobs")]
#[command(about = "Submit, reconcile and collect remote transcription jobs")]
#[command(version)]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, env = "STTP_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Base URL of the transcription API
    #[arg(long, env = "STTP_API", global = true)]
    api: Option<String>,

    /// Job database file
    #[arg(long, env = "STTP_DATABASE", global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit the given artifacts
    Submit {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Submit every artifact in the source directory
    SubmitDir {
        /// Overrides `source_dir`
        dir: Option<PathBuf>,
    },
    /// Update server status of pending jobs from the job list
    Reconcile,
    /// Update one job from its own status endpoint
    Refresh { task_id: String },
    /// Fetch transcripts of finished jobs
    Download,
    /// Write canonical transcripts for downloaded jobs
    Normalize,
    /// Report source artifacts without a rejected job record
    Audit {
        /// Overrides `source_dir`
        dir: Option<PathBuf>,
    },
    /// Run reconcile, download, normalize and audit once
    Cycle,
    /// Repeat the cycle every `cycle_interval_secs` and serve the status API
    Run {
        /// Overrides `listen`
        #[arg(long)]
        listen: Option<String>,
    },
    /// Print job counts per status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (filter, log_filter) = logging::filter_layer();
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = config::load_config(cli.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(api) = cli.api {
        config.api = api;
    }
    if let Some(database) = cli.database {
        config.database = database;
    }

    log_filter
        .apply_config_level(&config.logging.level)
        .context("Failed to apply logging.level")?;

    info!("sttp-jobs {}", env!("CARGO_PKG_VERSION"));
    info!(api = %config.api, database = %config.database.display(), "Configuration");

    let jobs_pool = init_pool(&config.database)
        .await
        .context("Failed to open job database")?;
    let transcripts_pool = if config.transcripts_database_path() == config.database.as_path() {
        jobs_pool.clone()
    } else {
        init_pool(config.transcripts_database_path())
            .await
            .context("Failed to open transcript database")?
    };

    let store = SqliteJobStore::new(jobs_pool, config.max_lock_wait_ms)
        .await
        .context("Failed to initialize job store")?;
    let sink = SqliteTranscriptStore::new(transcripts_pool, config.max_lock_wait_ms)
        .await
        .context("Failed to initialize transcript store")?;

    let client = RecappClient::new(ClientConfig {
        api: config.api.clone(),
        token: config.api_token(),
        timeout: Duration::from_secs(config.request_timeout_secs),
        requests_per_second: config.requests_per_second,
    })
    .context("Failed to build transcription client")?;

    let pipeline = Pipeline::new(
        Arc::new(client),
        Arc::new(store.clone()),
        Arc::new(sink.clone()),
        PipelineOptions::from_config(&config),
    );

    match cli.command {
        Command::Submit { paths } => {
            preflight(&pipeline).await?;
            print_json(&pipeline.submission().submit_paths(&paths).await)
        }
        Command::SubmitDir { dir } => {
            preflight(&pipeline).await?;
            let dir = dir.unwrap_or_else(|| config.source_dir.clone());
            let report = pipeline.submission().submit_directory(&dir).await?;
            print_json(&report)
        }
        Command::Reconcile => {
            preflight(&pipeline).await?;
            print_json(&pipeline.reconciler().reconcile().await?)
        }
        Command::Refresh { task_id } => {
            preflight(&pipeline).await?;
            let outcome = pipeline.reconciler().refresh_one(&task_id).await?;
            println!("{}: {:?}", task_id, outcome);
            Ok(())
        }
        Command::Download => {
            preflight(&pipeline).await?;
            print_json(&pipeline.downloader().download_pending().await?)
        }
        Command::Normalize => print_json(&pipeline.normalizer().normalize_all().await?),
        Command::Audit { dir } => {
            let dir = dir.unwrap_or_else(|| config.source_dir.clone());
            print_json(&pipeline.auditor().audit(&dir).await?)
        }
        Command::Cycle => {
            let summary = pipeline.run_cycle().await.context("Preflight failed")?;
            print_json(&summary)
        }
        Command::Run { listen } => {
            let listen = listen.unwrap_or_else(|| config.listen.clone());
            run_service(pipeline, AppState::new(store), &config, &listen).await
        }
        Command::Status => {
            for (sent, server, download, count) in store.count_by_status().await? {
                println!(
                    "{:<10} {:<9} {:<12} {}",
                    sent.as_str(),
                    server.as_str(),
                    download.as_str(),
                    count
                );
            }
            println!("canonical transcripts: {}", sink.count().await?);
            Ok(())
        }
    }
}

async fn preflight(pipeline: &Pipeline) -> Result<()> {
    pipeline.preflight().await.context("Preflight failed")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Cycle loop plus status API until Ctrl+C / SIGTERM
///
/// An in-flight cycle is allowed to finish before the process exits.
async fn run_service(
    pipeline: Pipeline,
    state: AppState,
    config: &TomlConfig,
    listen: &str,
) -> Result<()> {
    preflight(&pipeline).await?;

    let shutdown = CancellationToken::new();

    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("Failed to bind to {}", listen))?;
    info!("Status API listening on http://{}", listen);

    let app = sttp_jobs::build_router(state.clone());
    let server_token = shutdown.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_token.cancelled().await })
            .await
    });

    let interval = Duration::from_secs(config.cycle_interval_secs);
    let cycle_token = shutdown.clone();
    let cycles = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cycle_token.cancelled() => break,
                _ = ticker.tick() => {
                    let outcome = pipeline.run_cycle().await.map_err(|e| {
                        error!(error = %e, "Cycle skipped");
                        e.to_string()
                    });
                    state.record_cycle(outcome).await;
                }
            }
        }
        info!("Cycle loop stopped");
    });

    info!(interval_secs = config.cycle_interval_secs, "Cycle loop started");

    shutdown_signal().await;
    shutdown.cancel();

    cycles.await.context("Cycle task failed")?;
    server
        .await
        .context("Server task failed")?
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
