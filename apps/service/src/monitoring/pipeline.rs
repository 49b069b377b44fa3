use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::database::Database;
use crate::database::models::{Monitor, MonitorHistory};
use crate::events::{EventSink, MonitorEvent};
use crate::monitoring::cert::{CertificateSource, evaluate_certificate};
use crate::monitoring::gate;
use crate::monitoring::probe::{Prober, RetryPolicy, probe_with_retry};
use crate::monitoring::transition;
use crate::monitoring::types::{CheckOutcome, CheckType, SslOutcome};

/// Runs single checks end to end.
///
/// One executor instance is shared by every worker: it probes the target,
/// appends the result to the history ledger, diffs it against the previous
/// entry, and emits alert events through the configured sink. Alert emission
/// goes through the monitor's throttle claim, so concurrent checks of the
/// same monitor cannot double alert.
pub struct CheckExecutor {
    database: Arc<dyn Database>,
    prober: Arc<dyn Prober>,
    certificates: Arc<dyn CertificateSource>,
    events: Arc<dyn EventSink>,
}

impl CheckExecutor {
    pub fn new(
        database: Arc<dyn Database>,
        prober: Arc<dyn Prober>,
        certificates: Arc<dyn CertificateSource>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self { database, prober, certificates, events }
    }

    /// Run one uptime check for the monitor.
    ///
    /// Probes through the monitor's retry budget, records the settled outcome
    /// in the ledger, and emits an alert when the status changed or the
    /// response time breached the monitor's threshold. Returns `None` when
    /// the check was skipped, either because the monitor is unsaved or in
    /// maintenance.
    pub async fn run_uptime_check(&self, monitor: &Monitor) -> Result<Option<CheckOutcome>> {
        let Some(monitor_id) = monitor.id else {
            warn!(url = %monitor.url, "skipping uptime check for unsaved monitor");
            return Ok(None);
        };

        if gate::is_in_maintenance(monitor, Utc::now()) {
            debug!(url = %monitor.url, "monitor in maintenance, skipping uptime check");
            return Ok(None);
        }

        let policy = RetryPolicy::new(
            monitor.retry_attempts,
            Duration::from_secs(u64::from(monitor.retry_delay_seconds)),
        );
        let timeout = Duration::from_secs(u64::from(monitor.timeout_seconds));
        let outcome = probe_with_retry(self.prober.as_ref(), &monitor.url, timeout, policy).await;

        // The previous entry must be read before the append, otherwise the
        // comparison would always see the entry just written.
        let previous = self.database.latest_history(monitor_id, CheckType::Uptime).await?;
        self.database.append_history(&MonitorHistory::from_outcome(monitor_id, &outcome)).await?;

        let change =
            transition::detect(previous.map(|entry| entry.status), outcome.status.into());
        if change.changed {
            if self.database.claim_alert(monitor_id, Utc::now()).await? {
                info!(url = %monitor.url, status = %outcome.status, "monitor status changed");
                self.events
                    .publish(MonitorEvent::UptimeChanged {
                        monitor: monitor.clone(),
                        status: outcome.status,
                    })
                    .await;
            } else {
                debug!(url = %monitor.url, "status change alert suppressed by throttle window");
            }
        }

        if transition::is_response_time_degraded(
            monitor.response_time_threshold_ms,
            outcome.status,
            outcome.response_time_ms,
        ) {
            if self.database.claim_alert(monitor_id, Utc::now()).await? {
                info!(
                    url = %monitor.url,
                    response_time_ms = outcome.response_time_ms,
                    "response time degraded"
                );
                self.events
                    .publish(MonitorEvent::ResponseTimeDegraded {
                        monitor: monitor.clone(),
                        response_time_ms: outcome.response_time_ms,
                        threshold_ms: monitor.response_time_threshold_ms.unwrap_or_default(),
                    })
                    .await;
            } else {
                debug!(url = %monitor.url, "degradation alert suppressed by throttle window");
            }
        }

        self.database.set_last_checked(monitor_id, Utc::now()).await?;

        Ok(Some(outcome))
    }

    /// Run one certificate check for the monitor.
    ///
    /// Skipped unless the monitor opted into SSL checks or `force` is set.
    /// The evaluation itself never fails the check: fetch and parse problems
    /// classify as a failed status and still land in the ledger.
    pub async fn run_ssl_check(&self, monitor: &Monitor, force: bool) -> Result<Option<SslOutcome>> {
        let Some(monitor_id) = monitor.id else {
            warn!(url = %monitor.url, "skipping certificate check for unsaved monitor");
            return Ok(None);
        };

        if !monitor.ssl_check && !force {
            return Ok(None);
        }
        if monitor.url.is_empty() {
            debug!(monitor_id, "monitor has no URL, skipping certificate check");
            return Ok(None);
        }
        if gate::is_in_maintenance(monitor, Utc::now()) {
            debug!(url = %monitor.url, "monitor in maintenance, skipping certificate check");
            return Ok(None);
        }

        let outcome =
            evaluate_certificate(self.certificates.as_ref(), &monitor.url, Utc::now()).await;

        let previous = self.database.latest_history(monitor_id, CheckType::Ssl).await?;
        self.database
            .append_history(&MonitorHistory::from_ssl_outcome(monitor_id, &outcome))
            .await?;

        let change =
            transition::detect(previous.map(|entry| entry.status), outcome.status.into());
        if change.changed {
            if self.database.claim_alert(monitor_id, Utc::now()).await? {
                info!(url = %monitor.url, status = %outcome.status, "certificate status changed");
                self.events
                    .publish(MonitorEvent::SslStatusChanged {
                        monitor: monitor.clone(),
                        status: outcome.status,
                    })
                    .await;
            } else {
                debug!(url = %monitor.url, "certificate alert suppressed by throttle window");
            }
        }

        Ok(Some(outcome))
    }
}
