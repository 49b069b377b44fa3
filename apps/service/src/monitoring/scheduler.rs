use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::database::Database;
use crate::database::models::Monitor;
use crate::monitoring::gate;
use crate::monitoring::pipeline::CheckExecutor;

/// Knobs for one dispatch pass over the monitor set.
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Monitors fetched and dispatched per page
    pub chunk_size: u64,
    /// Label for the worker group, carried into logs
    pub pool: String,
    /// Concurrent checks allowed at once
    pub workers: usize,
    /// Dispatch certificate checks even for monitors that did not opt in
    pub force_check_ssl: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self { chunk_size: 100, pool: "default".to_string(), workers: 8, force_check_ssl: false }
    }
}

/// Counts reported after a dispatch pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct CheckSummary {
    /// Enabled monitors seen during the pass
    pub scanned: u64,
    /// Monitors whose interval had elapsed
    pub due: u64,
    /// Monitors suppressed by a maintenance window
    pub skipped_maintenance: u64,
    /// Uptime checks that ran to completion
    pub uptime_checks: u64,
    /// Certificate checks that ran to completion
    pub ssl_checks: u64,
}

/// Whether a monitor is due at `now`, given its most recent ledger entry.
///
/// A monitor that has never recorded a check is always due.
pub fn is_due(
    interval_minutes: u32,
    last_check: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    match last_check {
        None => true,
        Some(last) => (now - last).num_seconds() >= i64::from(interval_minutes) * 60,
    }
}

/// Walks the enabled monitor set and fans due checks out to workers.
pub struct CheckDispatcher {
    database: Arc<dyn Database>,
    executor: Arc<CheckExecutor>,
}

impl CheckDispatcher {
    pub fn new(database: Arc<dyn Database>, executor: Arc<CheckExecutor>) -> Self {
        Self { database, executor }
    }

    /// Apply the due rule to a set of monitors, returning the ids to check.
    ///
    /// Reads only, so evaluating the same monitors twice at the same instant
    /// selects the same set.
    pub async fn select_due(
        &self,
        monitors: &[Monitor],
        now: DateTime<Utc>,
    ) -> Result<Vec<i64>> {
        let mut due = Vec::new();
        for monitor in monitors {
            let Some(monitor_id) = monitor.id else { continue };
            let latest = self.database.latest_history_any(monitor_id).await?;
            if is_due(monitor.interval_minutes, latest.map(|entry| entry.created_at), now) {
                due.push(monitor_id);
            }
        }
        Ok(due)
    }

    /// Scan enabled monitors and run every due check once.
    ///
    /// Monitors are fetched page by page and each due monitor becomes one
    /// worker task running its uptime and certificate checks together. A
    /// monitor that fails is logged and left for the next pass, it never
    /// aborts the rest of the batch.
    pub async fn run_pass(&self, options: &DispatchOptions) -> Result<CheckSummary> {
        let now = Utc::now();
        let chunk_size = options.chunk_size.max(1);
        let semaphore = Arc::new(Semaphore::new(options.workers.max(1)));
        let mut summary = CheckSummary::default();
        let mut offset = 0u64;

        debug!(
            pool = %options.pool,
            workers = options.workers,
            chunk_size,
            force_check_ssl = options.force_check_ssl,
            "starting check pass"
        );

        loop {
            let chunk = self.database.get_enabled_monitors(offset, chunk_size).await?;
            let fetched = chunk.len() as u64;
            offset += fetched;

            let mut candidates = Vec::new();
            for monitor in chunk {
                summary.scanned += 1;
                if gate::is_in_maintenance(&monitor, now) {
                    summary.skipped_maintenance += 1;
                    debug!(url = %monitor.url, "monitor in maintenance, not dispatched");
                    continue;
                }
                candidates.push(monitor);
            }

            let due_ids: HashSet<i64> =
                self.select_due(&candidates, now).await?.into_iter().collect();

            let mut tasks: JoinSet<(bool, bool)> = JoinSet::new();
            for monitor in candidates {
                if !monitor.id.is_some_and(|id| due_ids.contains(&id)) {
                    continue;
                }
                summary.due += 1;

                let permit = semaphore.clone().acquire_owned().await?;
                let executor = self.executor.clone();
                let force_check_ssl = options.force_check_ssl;
                tasks.spawn(async move {
                    let _permit = permit;
                    run_monitor_checks(executor, monitor, force_check_ssl).await
                });
            }

            // Drain before the next page so in-flight tasks stay bounded by
            // the chunk size.
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((uptime_ran, ssl_ran)) => {
                        summary.uptime_checks += u64::from(uptime_ran);
                        summary.ssl_checks += u64::from(ssl_ran);
                    }
                    Err(error) => {
                        error!(%error, "check task failed to complete");
                    }
                }
            }

            if fetched < chunk_size {
                break;
            }
        }

        Ok(summary)
    }
}

/// Run the pair of checks for one monitor, reporting which of them completed.
async fn run_monitor_checks(
    executor: Arc<CheckExecutor>,
    monitor: Monitor,
    force_check_ssl: bool,
) -> (bool, bool) {
    let wants_ssl = monitor.ssl_check || force_check_ssl;

    let (uptime, ssl) = tokio::join!(executor.run_uptime_check(&monitor), async {
        if wants_ssl { executor.run_ssl_check(&monitor, force_check_ssl).await } else { Ok(None) }
    });

    let uptime_ran = match uptime {
        Ok(outcome) => outcome.is_some(),
        Err(error) => {
            error!(url = %monitor.url, %error, "uptime check failed");
            false
        }
    };
    let ssl_ran = match ssl {
        Ok(outcome) => outcome.is_some(),
        Err(error) => {
            error!(url = %monitor.url, %error, "certificate check failed");
            false
        }
    };

    (uptime_ran, ssl_ran)
}
