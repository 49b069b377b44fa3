mod config;
mod database;
mod events;
mod monitoring;
mod notifications;
mod pool;
mod runner;
mod validation;

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing::warn;
use uuid::Uuid;

use crate::config::Config;
use crate::database::models::Monitor;
use crate::database::{Database, DatabaseImpl, initialize_database};
use crate::monitoring::DispatchOptions;
use crate::pool::{LibsqlManager, LibsqlPool};
use crate::runner::ServiceRunner;

#[derive(Parser)]
#[command(name = "sitepulse", version, about = "Uptime and TLS certificate monitoring service")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the monitoring service until interrupted
    Run,
    /// Run a single check pass over the monitor set
    Check {
        /// Monitors fetched per page
        #[arg(long)]
        chunk_size: Option<u64>,
        /// Worker group label carried into logs
        #[arg(long)]
        pool: Option<String>,
        /// Check certificates even for monitors that did not opt in
        #[arg(long)]
        force_check_ssl: bool,
    },
    /// Register a new monitor
    Add(AddArgs),
    /// List all monitors
    List,
    /// Enable or disable a monitor
    Toggle {
        /// Monitor UUID
        uuid: Uuid,
    },
    /// Delete a monitor and its history
    Remove {
        /// Monitor UUID
        uuid: Uuid,
    },
    /// Show response time statistics for a monitor
    Stats {
        /// Monitor UUID
        uuid: Uuid,
        /// Use only the most recent N uptime checks
        #[arg(long)]
        limit: Option<u32>,
    },
}

#[derive(Args)]
struct AddArgs {
    /// URL to monitor
    url: String,
    /// Check interval in minutes
    #[arg(long, default_value_t = 5)]
    interval: u32,
    /// Probe timeout in seconds
    #[arg(long)]
    timeout: Option<u32>,
    /// Probe attempts before a check settles as down
    #[arg(long)]
    retries: Option<u32>,
    /// Base delay between retries in seconds
    #[arg(long)]
    retry_delay: Option<u32>,
    /// Alert when an up response takes longer than this many milliseconds
    #[arg(long)]
    threshold_ms: Option<i64>,
    /// Also check the TLS certificate
    #[arg(long)]
    ssl: bool,
    /// Minutes to wait between alerts for this monitor
    #[arg(long)]
    throttle: Option<u32>,
    /// Owner reference stored with the monitor
    #[arg(long)]
    owner: Option<String>,
    /// Notification channel to use, repeatable (defaults to all enabled channels)
    #[arg(long = "channel")]
    channels: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    logger::init();

    let cli = Cli::parse();
    let config = Config::from_config(cli.config.as_ref())?;
    let pool = open_pool(&config).await?;

    match cli.command {
        Command::Run => ServiceRunner::start(config, pool).await,
        Command::Check { chunk_size, pool: pool_name, force_check_ssl } => {
            let scheduler = &config.scheduler;
            let options = DispatchOptions {
                chunk_size: chunk_size.unwrap_or(scheduler.chunk_size),
                pool: pool_name.unwrap_or_else(|| scheduler.pool.clone()),
                workers: scheduler.workers,
                force_check_ssl: force_check_ssl || scheduler.force_check_ssl,
            };
            let summary = ServiceRunner::check_once(config, pool, &options).await?;
            println!(
                "Checked {} of {} monitors ({} uptime, {} ssl, {} in maintenance)",
                summary.due,
                summary.scanned,
                summary.uptime_checks,
                summary.ssl_checks,
                summary.skipped_maintenance
            );
            Ok(())
        }
        Command::Add(args) => add_monitor(&config, pool, args).await,
        Command::List => list_monitors(pool).await,
        Command::Toggle { uuid } => toggle_monitor(pool, uuid).await,
        Command::Remove { uuid } => remove_monitor(pool, uuid).await,
        Command::Stats { uuid, limit } => show_stats(pool, uuid, limit).await,
    }
}

async fn open_pool(config: &Config) -> Result<LibsqlPool> {
    let db = libsql::Builder::new_local(&config.database.path).build().await?;
    let pool = deadpool::managed::Pool::builder(LibsqlManager::new(db))
        .config(deadpool::managed::PoolConfig::default())
        .build()?;
    Ok(pool)
}

async fn open_database(pool: LibsqlPool) -> Result<DatabaseImpl> {
    let conn = pool.get().await?;
    initialize_database(&conn).await?;
    drop(conn);
    Ok(DatabaseImpl::new_from_pool(pool))
}

async fn add_monitor(config: &Config, pool: LibsqlPool, args: AddArgs) -> Result<()> {
    let database = open_database(pool).await?;

    let defaults = &config.defaults;
    let mut monitor = Monitor::new(args.url);
    monitor.interval_minutes = args.interval;
    monitor.timeout_seconds = args.timeout.unwrap_or(defaults.timeout_seconds);
    monitor.retry_attempts = args.retries.unwrap_or(defaults.retry_attempts);
    monitor.retry_delay_seconds = args.retry_delay.unwrap_or(defaults.retry_delay_seconds);
    monitor.response_time_threshold_ms = args.threshold_ms;
    monitor.ssl_check = args.ssl;
    monitor.alert_throttle_minutes = args.throttle.unwrap_or(defaults.alert_throttle_minutes);
    monitor.owner = args.owner;
    monitor.channels = args.channels;

    let result = validation::validate_monitor(&monitor);
    result.to_result()?;
    if let Some(warning) = result.warning {
        warn!("{warning}");
    }

    database.save_monitor(&monitor).await?;
    println!("Added monitor {} for {}", monitor.uuid, monitor.url);
    Ok(())
}

async fn list_monitors(pool: LibsqlPool) -> Result<()> {
    let database = open_database(pool).await?;
    let monitors = database.get_monitors().await?;

    if monitors.is_empty() {
        println!("No monitors configured");
        return Ok(());
    }

    for monitor in monitors {
        let state = if monitor.enabled { "enabled" } else { "disabled" };
        let ssl = if monitor.ssl_check { ", ssl" } else { "" };
        let last = monitor
            .last_checked_at
            .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "{}  {}  [{state}{ssl}] every {}m, last checked {last}",
            monitor.uuid, monitor.url, monitor.interval_minutes
        );
    }
    Ok(())
}

async fn toggle_monitor(pool: LibsqlPool, uuid: Uuid) -> Result<()> {
    let database = open_database(pool).await?;
    match database.toggle_monitor(uuid).await? {
        Some(true) => println!("Monitor {uuid} enabled"),
        Some(false) => println!("Monitor {uuid} disabled"),
        None => bail!("no monitor with UUID {uuid}"),
    }
    Ok(())
}

async fn remove_monitor(pool: LibsqlPool, uuid: Uuid) -> Result<()> {
    let database = open_database(pool).await?;
    if database.get_monitor_by_uuid(uuid).await?.is_none() {
        bail!("no monitor with UUID {uuid}");
    }
    database.delete_monitor(uuid).await?;
    println!("Removed monitor {uuid} and its history");
    Ok(())
}

async fn show_stats(pool: LibsqlPool, uuid: Uuid, limit: Option<u32>) -> Result<()> {
    let database = open_database(pool).await?;
    let monitor = database
        .get_monitor_by_uuid(uuid)
        .await?
        .ok_or_else(|| anyhow::anyhow!("no monitor with UUID {uuid}"))?;
    let monitor_id = monitor.id.ok_or_else(|| anyhow::anyhow!("monitor has no row id"))?;

    match database.response_time_stats(monitor_id, limit).await? {
        Some(stats) => {
            println!("Response times for {}", monitor.url);
            println!("  samples: {}", stats.samples);
            println!("  average: {:.1} ms", stats.average_ms);
            println!("  min:     {} ms", stats.min_ms);
            println!("  max:     {} ms", stats.max_ms);
        }
        None => println!("No uptime checks recorded for {}", monitor.url),
    }
    Ok(())
}
