use async_trait::async_trait;

use crate::database::models::Monitor;
use crate::monitoring::types::{SiteStatus, SslStatus};

/// Alert-worthy occurrence produced by the check pipeline.
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    /// Reachability flipped, or was recorded for the first time
    UptimeChanged { monitor: Monitor, status: SiteStatus },
    /// Certificate classification flipped, or was recorded for the first time
    SslStatusChanged { monitor: Monitor, status: SslStatus },
    /// An up check came back slower than the monitor's threshold
    ResponseTimeDegraded { monitor: Monitor, response_time_ms: i64, threshold_ms: i64 },
}

/// Consumer of pipeline events.
///
/// Publishing must never fail the check that produced the event; sinks
/// swallow and log their own delivery errors.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: MonitorEvent);
}

/// Sink that drops every event, for setups with notifications disabled.
pub struct NullEventSink;

#[async_trait]
impl EventSink for NullEventSink {
    async fn publish(&self, _event: MonitorEvent) {}
}
