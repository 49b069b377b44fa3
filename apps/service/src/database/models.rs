use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::monitoring::types::{CheckOutcome, CheckStatus, CheckType, SslOutcome};

/// A monitored endpoint and its per-monitor policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Monitor {
    /// Database row id, `None` until first saved
    pub id: Option<i64>,
    pub uuid: Uuid,
    /// Optional owner reference for multi-tenant deployments
    pub owner: Option<String>,
    pub url: String,
    pub enabled: bool,
    /// Minimum minutes between two scheduled checks
    pub interval_minutes: u32,
    /// Per-attempt probe timeout
    pub timeout_seconds: u32,
    /// Total probe attempts per uptime check, including the first
    pub retry_attempts: u32,
    /// Base delay between attempts, doubled after each failure
    pub retry_delay_seconds: u32,
    /// Response times above this many milliseconds count as degraded
    pub response_time_threshold_ms: Option<i64>,
    /// Whether certificate checks run for this monitor
    pub ssl_check: bool,
    pub is_maintenance: bool,
    pub maintenance_start_at: Option<DateTime<Utc>>,
    pub maintenance_end_at: Option<DateTime<Utc>>,
    /// Minimum minutes between two alerts for this monitor
    pub alert_throttle_minutes: u32,
    pub last_alerted_at: Option<DateTime<Utc>>,
    pub last_checked_at: Option<DateTime<Utc>>,
    /// Notification channels this monitor publishes to, all when empty
    pub channels: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Monitor {
    /// Create a monitor with service defaults for everything but the URL.
    pub fn new(url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            uuid: Uuid::new_v4(),
            owner: None,
            url: url.into(),
            enabled: true,
            interval_minutes: 5,
            timeout_seconds: 10,
            retry_attempts: 3,
            retry_delay_seconds: 1,
            response_time_threshold_ms: None,
            ssl_check: false,
            is_maintenance: false,
            maintenance_start_at: None,
            maintenance_end_at: None,
            alert_throttle_minutes: 60,
            last_alerted_at: None,
            last_checked_at: None,
            channels: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Convert a UTC datetime to a stored unix timestamp.
    pub fn datetime_to_i64(time: DateTime<Utc>) -> i64 {
        time.timestamp()
    }

    /// Convert a stored unix timestamp back to a UTC datetime.
    pub fn i64_to_datetime(timestamp: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(timestamp, 0).single().unwrap_or_default()
    }
}

/// One appended entry in the check history ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorHistory {
    pub id: Option<i64>,
    pub uuid: Uuid,
    pub monitor_id: i64,
    pub check_type: CheckType,
    pub status: CheckStatus,
    /// Milliseconds for uptime checks, days until expiry for SSL checks
    pub response_time: i64,
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
}

impl MonitorHistory {
    pub fn new(
        monitor_id: i64,
        check_type: CheckType,
        status: CheckStatus,
        response_time: i64,
    ) -> Self {
        Self {
            id: None,
            uuid: Uuid::new_v4(),
            monitor_id,
            check_type,
            status,
            response_time,
            error_message: None,
            retry_count: 0,
            created_at: Utc::now(),
        }
    }

    pub fn with_error(mut self, message: Option<String>) -> Self {
        self.error_message = message;
        self
    }

    pub fn with_retries(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// Ledger entry for a settled uptime check.
    pub fn from_outcome(monitor_id: i64, outcome: &CheckOutcome) -> Self {
        Self::new(monitor_id, CheckType::Uptime, outcome.status.into(), outcome.response_time_ms)
            .with_error(outcome.error_message.clone())
            .with_retries(outcome.retry_count)
    }

    /// Ledger entry for a certificate evaluation.
    pub fn from_ssl_outcome(monitor_id: i64, outcome: &SslOutcome) -> Self {
        Self::new(monitor_id, CheckType::Ssl, outcome.status.into(), outcome.days_until_expiry)
            .with_error(outcome.error_message.clone())
    }
}

/// Aggregated response times over a monitor's uptime history.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResponseTimeStats {
    pub average_ms: f64,
    pub min_ms: i64,
    pub max_ms: i64,
    pub samples: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::types::{SiteStatus, SslStatus};

    #[test]
    fn uptime_outcome_maps_into_ledger_entry() {
        let outcome = CheckOutcome {
            status: SiteStatus::Down,
            response_time_ms: 310,
            error_message: Some("HTTP Status: 503".to_string()),
            retry_count: 3,
        };
        let entry = MonitorHistory::from_outcome(7, &outcome);

        assert_eq!(entry.monitor_id, 7);
        assert_eq!(entry.check_type, CheckType::Uptime);
        assert_eq!(entry.status, CheckStatus::Site(SiteStatus::Down));
        assert_eq!(entry.response_time, 310);
        assert_eq!(entry.error_message.as_deref(), Some("HTTP Status: 503"));
        assert_eq!(entry.retry_count, 3);
    }

    #[test]
    fn ssl_outcome_stores_days_in_response_time() {
        let outcome =
            SslOutcome { status: SslStatus::Expired, days_until_expiry: -4, error_message: None };
        let entry = MonitorHistory::from_ssl_outcome(3, &outcome);

        assert_eq!(entry.check_type, CheckType::Ssl);
        assert_eq!(entry.status, CheckStatus::Ssl(SslStatus::Expired));
        assert_eq!(entry.response_time, -4);
        assert_eq!(entry.retry_count, 0);
    }

    #[test]
    fn new_monitor_starts_enabled_without_check_state() {
        let monitor = Monitor::new("https://example.com");

        assert!(monitor.enabled);
        assert!(monitor.id.is_none());
        assert!(monitor.last_alerted_at.is_none());
        assert!(monitor.last_checked_at.is_none());
        assert!(monitor.channels.is_empty());
    }

    #[test]
    fn timestamps_round_trip_at_second_precision() {
        let now = Utc::now();
        let restored = Monitor::i64_to_datetime(Monitor::datetime_to_i64(now));
        assert_eq!(restored.timestamp(), now.timestamp());
    }
}
