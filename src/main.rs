//! SommScore - sales associate performance dashboard
//!
//! Pulls point-of-sale orders and club signups from Commerce7 into SQLite,
//! scores every associate daily and serves the dashboard over HTTP.

mod app;
mod commerce7;
mod config;
mod dashboard;
mod demo;
mod http;
mod ingest;
mod scoring;
mod store;
mod sync;
mod util;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::{spawn_initialization, AppState};
use crate::commerce7::Commerce7Client;
use crate::config::Config;
use crate::http::build_router;
use crate::store::{Db, SettingsStore};
use crate::sync::SyncService;
use crate::util::time::{init_server_time, parse_date, today_in};

#[derive(Parser)]
#[command(name = "sommscore")]
#[command(about = "Sales associate performance dashboard backed by Commerce7")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the web server (default)
    Serve,
    /// Create the database schema and default settings
    InitDb,
    /// Pull Commerce7 data for a date range and rescore the year
    Update {
        /// First day to fetch (YYYY-MM-DD); defaults to the last update
        #[arg(long, value_parser = parse_day)]
        start_date: Option<NaiveDate>,
        /// Last day to fetch (YYYY-MM-DD); defaults to today
        #[arg(long, value_parser = parse_day)]
        end_date: Option<NaiveDate>,
    },
    /// Run the daily update job in the foreground
    Scheduler,
    /// Recompute SommScores for the current year
    Recalculate,
    /// Replace all data with generated demo data
    Demo,
}

fn parse_day(raw: &str) -> Result<NaiveDate, String> {
    parse_date(raw).ok_or_else(|| format!("expected YYYY-MM-DD, got {raw}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    init_tracing(&config.log_level, config.log_json);
    init_server_time();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::InitDb => {
            let db = Db::connect(&config.db_path)
                .await
                .with_context(|| format!("failed to initialize database at {}", config.db_path))?;
            let missing = db.missing_tables().await?;
            anyhow::ensure!(missing.is_empty(), "tables missing after migration: {:?}", missing);
            info!(path = %config.db_path, "Database initialized");
            Ok(())
        }
        Command::Update { start_date, end_date } => {
            let sync = sync_service(&config).await?;
            let summary = sync.update_data(start_date, end_date).await?;
            info!(
                start = %summary.start,
                end = %summary.end,
                orders_added = summary.orders_added,
                clubs_added = summary.clubs_added,
                "Update finished"
            );
            Ok(())
        }
        Command::Scheduler => {
            let sync = sync_service(&config).await?;
            let tz = sync.settings().load().await?.tz();
            // Sender stays alive for the lifetime of the job
            let (_tz_tx, tz_rx) = watch::channel(tz);
            tokio::select! {
                _ = crate::sync::scheduler::run(sync, tz_rx) => {}
                _ = shutdown_signal() => {}
            }
            Ok(())
        }
        Command::Recalculate => {
            let sync = sync_service(&config).await?;
            let written = sync.recalculate_current_year().await?;
            info!(scores = written, "Recalculation finished");
            Ok(())
        }
        Command::Demo => {
            let db = Db::connect(&config.db_path).await?;
            let tz = SettingsStore::new(db.clone()).load().await?.tz();
            demo::load_demo(&db, config.demo_seed, today_in(tz)).await?;
            Ok(())
        }
    }
}

async fn sync_service(config: &Config) -> anyhow::Result<SyncService> {
    let db = Db::connect(&config.db_path)
        .await
        .with_context(|| format!("failed to open database at {}", config.db_path))?;
    Ok(SyncService::new(db, Commerce7Client::new(config), config))
}

async fn serve(config: Config) -> anyhow::Result<()> {
    info!(mode = ?config.run_mode, app = ?config.app_name, "Starting SommScore");
    info!("Server address: {}", config.server_addr);

    let db = Db::connect(&config.db_path)
        .await
        .with_context(|| format!("failed to open database at {}", config.db_path))?;

    let state = AppState::new(config.clone(), db);

    let router = build_router(state.clone());
    let listener = TcpListener::bind(config.server_addr).await?;
    info!("Server listening on {}", config.server_addr);
    info!("Health check: http://{}/health", config.server_addr);

    spawn_initialization(state);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str, json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
