use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::config::Config;
use crate::database::{Database, DatabaseImpl, initialize_database};
use crate::events::EventSink;
use crate::monitoring::cert::TlsCertificateSource;
use crate::monitoring::probe::HttpProber;
use crate::monitoring::{CheckDispatcher, CheckExecutor, CheckSummary, DispatchOptions};
use crate::notifications::NotificationManager;
use crate::pool::LibsqlPool;

const CERTIFICATE_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Long running service: owns the wired check pipeline and dispatches a
/// pass over the monitor set once per configured interval.
pub struct ServiceRunner {
    config: Arc<Config>,
    dispatcher: CheckDispatcher,
}

impl ServiceRunner {
    /// Create and run a service instance
    /// This is a convenience method that creates and immediately runs the service
    pub async fn start(config: Config, pool: LibsqlPool) -> Result<()> {
        let runner = Self::new(config, pool).await?;
        runner.run().await
    }

    /// Run a single dispatch pass and report its summary
    pub async fn check_once(
        config: Config,
        pool: LibsqlPool,
        options: &DispatchOptions,
    ) -> Result<CheckSummary> {
        let runner = Self::new(config, pool).await?;
        let summary = runner.dispatcher.run_pass(options).await?;
        log_summary(&summary);
        Ok(summary)
    }

    /// Create a new service instance
    async fn new(config: Config, pool: LibsqlPool) -> Result<Self> {
        let config = Arc::new(config);

        // Initialize database schema
        info!("Initializing database schema...");
        let conn = pool.get().await?;
        initialize_database(&conn).await?;
        drop(conn);

        let database: Arc<dyn Database> = Arc::new(DatabaseImpl::new_from_pool(pool));
        let events: Arc<dyn EventSink> =
            Arc::new(NotificationManager::from_config(&config.notifications)?);

        let executor = Arc::new(CheckExecutor::new(
            database.clone(),
            Arc::new(HttpProber::new()?),
            Arc::new(TlsCertificateSource::new(CERTIFICATE_FETCH_TIMEOUT)?),
            events,
        ));
        let dispatcher = CheckDispatcher::new(database, executor);

        Ok(Self { config, dispatcher })
    }

    /// Run dispatch passes until interrupted
    async fn run(&self) -> Result<()> {
        let options = self.dispatch_options();
        let every =
            Duration::from_secs(u64::from(self.config.scheduler.interval_minutes.max(1)) * 60);

        info!(
            interval_minutes = self.config.scheduler.interval_minutes,
            pool = %options.pool,
            "service started, scheduling checks"
        );

        let mut timer = tokio::time::interval(every);
        // A pass that overruns the interval delays the next tick instead of
        // bursting to catch up.
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            timer.tick().await;
            match self.dispatcher.run_pass(&options).await {
                Ok(summary) => log_summary(&summary),
                Err(error) => error!(%error, "check pass failed"),
            }
        }
    }

    fn dispatch_options(&self) -> DispatchOptions {
        let scheduler = &self.config.scheduler;
        DispatchOptions {
            chunk_size: scheduler.chunk_size,
            pool: scheduler.pool.clone(),
            workers: scheduler.workers,
            force_check_ssl: scheduler.force_check_ssl,
        }
    }
}

fn log_summary(summary: &CheckSummary) {
    info!(
        scanned = summary.scanned,
        due = summary.due,
        skipped_maintenance = summary.skipped_maintenance,
        uptime_checks = summary.uptime_checks,
        ssl_checks = summary.ssl_checks,
        "check pass completed"
    );
}
