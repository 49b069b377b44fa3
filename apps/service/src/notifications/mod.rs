/// Notification fan-out
///
/// Translates pipeline events into channel posts. Delivery failures are
/// logged and swallowed per channel, so one unreachable webhook never blocks
/// the others or the check that raised the event.
pub mod channels;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, error};

use crate::config::NotificationsConfig;
use crate::database::models::Monitor;
use crate::events::{EventSink, MonitorEvent};
use crate::monitoring::types::{SiteStatus, SslStatus};
use channels::{
    DiscordChannel, NotificationChannel, Severity, SlackChannel, TeamsChannel, WebhookChannel,
};

pub struct NotificationManager {
    enabled: bool,
    channels: Vec<Arc<dyn NotificationChannel>>,
    client: reqwest::Client,
}

impl NotificationManager {
    /// Build the channel set from configuration.
    pub fn from_config(config: &NotificationsConfig) -> Result<Self> {
        let channels: Vec<Arc<dyn NotificationChannel>> = vec![
            Arc::new(SlackChannel::new(config.slack.clone())),
            Arc::new(DiscordChannel::new(config.discord.clone())),
            Arc::new(TeamsChannel::new(config.teams.clone())),
            Arc::new(WebhookChannel::new(config.webhook.clone())),
        ];
        let client = reqwest::Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self { enabled: config.enabled, channels, client })
    }

    async fn dispatch(&self, monitor: &Monitor, title: String, message: String, severity: Severity) {
        if !self.enabled {
            debug!("notifications are globally disabled, dropping event");
            return;
        }

        let recipients: Vec<&Arc<dyn NotificationChannel>> = self
            .channels
            .iter()
            .filter(|channel| channel.is_enabled() && selected(&monitor.channels, channel.name()))
            .collect();

        let sends = recipients.iter().map(|channel| {
            let title = title.as_str();
            let message = message.as_str();
            async move {
                if let Err(err) = channel.deliver(&self.client, title, message, severity).await {
                    error!(
                        channel = channel.name(),
                        monitor = %monitor.uuid,
                        error = %err,
                        "failed to send notification"
                    );
                }
            }
        });
        futures::future::join_all(sends).await;
    }
}

/// A monitor with no channel selection publishes to every enabled channel.
fn selected(selection: &[String], name: &str) -> bool {
    selection.is_empty() || selection.iter().any(|chosen| chosen == name)
}

fn uptime_texts(monitor: &Monitor, status: SiteStatus) -> (String, String, Severity) {
    let title = format!("Monitor {status}: {}", monitor.url);
    let message = format!("Monitor `{}` is now **{status}**", monitor.url);
    let severity = if status == SiteStatus::Up { Severity::Success } else { Severity::Danger };
    (title, message, severity)
}

fn ssl_texts(monitor: &Monitor, status: SslStatus) -> (String, String, Severity) {
    let title = format!("SSL Status Changed: {}", monitor.url);
    let message = format!("SSL certificate for `{}` is now **{status}**", monitor.url);
    let severity = if status == SslStatus::Valid { Severity::Success } else { Severity::Warning };
    (title, message, severity)
}

fn degraded_texts(monitor: &Monitor, response_time_ms: i64, threshold_ms: i64) -> (String, String, Severity) {
    let title = format!("Performance Degraded: {}", monitor.url);
    let message = format!(
        "Monitor `{}` response time (**{response_time_ms}ms**) exceeded threshold (**{threshold_ms}ms**)",
        monitor.url
    );
    (title, message, Severity::Warning)
}

#[async_trait]
impl EventSink for NotificationManager {
    async fn publish(&self, event: MonitorEvent) {
        match event {
            MonitorEvent::UptimeChanged { monitor, status } => {
                let (title, message, severity) = uptime_texts(&monitor, status);
                self.dispatch(&monitor, title, message, severity).await;
            }
            MonitorEvent::SslStatusChanged { monitor, status } => {
                let (title, message, severity) = ssl_texts(&monitor, status);
                self.dispatch(&monitor, title, message, severity).await;
            }
            MonitorEvent::ResponseTimeDegraded { monitor, response_time_ms, threshold_ms } => {
                let (title, message, severity) = degraded_texts(&monitor, response_time_ms, threshold_ms);
                self.dispatch(&monitor, title, message, severity).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::{Value, json};

    use super::*;
    use crate::monitoring::types::SslStatus;

    struct RecordingChannel {
        name: &'static str,
        delivered: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl RecordingChannel {
        fn new(name: &'static str) -> (Self, Arc<Mutex<Vec<String>>>) {
            let delivered = Arc::new(Mutex::new(Vec::new()));
            (Self { name, delivered: delivered.clone(), fail: false }, delivered)
        }

        fn failing(name: &'static str) -> Self {
            Self { name, delivered: Arc::new(Mutex::new(Vec::new())), fail: true }
        }
    }

    #[async_trait]
    impl NotificationChannel for RecordingChannel {
        fn name(&self) -> &'static str {
            self.name
        }

        fn is_enabled(&self) -> bool {
            true
        }

        fn target_url(&self) -> Option<&str> {
            Some("http://localhost/hook")
        }

        fn format_payload(&self, _title: &str, _message: &str, _severity: Severity) -> Value {
            json!({})
        }

        async fn deliver(
            &self,
            _client: &reqwest::Client,
            title: &str,
            _message: &str,
            _severity: Severity,
        ) -> Result<(), channels::NotificationError> {
            if self.fail {
                return Err(channels::NotificationError::Rejected { channel: self.name, status: 500 });
            }
            self.delivered.lock().unwrap().push(title.to_string());
            Ok(())
        }
    }

    fn manager_with(channels: Vec<Arc<dyn NotificationChannel>>, enabled: bool) -> NotificationManager {
        NotificationManager { enabled, channels, client: reqwest::Client::new() }
    }

    #[tokio::test]
    async fn publishes_to_all_channels_when_monitor_selects_none() {
        let (slack, slack_log) = RecordingChannel::new("slack");
        let (discord, discord_log) = RecordingChannel::new("discord");
        let manager = manager_with(vec![Arc::new(slack), Arc::new(discord)], true);

        let monitor = Monitor::new("https://example.com");
        manager
            .publish(MonitorEvent::UptimeChanged { monitor, status: SiteStatus::Down })
            .await;

        assert_eq!(slack_log.lock().unwrap().len(), 1);
        assert_eq!(discord_log.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn monitor_channel_selection_routes_events() {
        let (slack, slack_log) = RecordingChannel::new("slack");
        let (discord, discord_log) = RecordingChannel::new("discord");
        let manager = manager_with(vec![Arc::new(slack), Arc::new(discord)], true);

        let mut monitor = Monitor::new("https://example.com");
        monitor.channels = vec!["discord".to_string()];
        manager
            .publish(MonitorEvent::UptimeChanged { monitor, status: SiteStatus::Up })
            .await;

        assert!(slack_log.lock().unwrap().is_empty());
        assert_eq!(discord_log.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn globally_disabled_manager_drops_events() {
        let (slack, slack_log) = RecordingChannel::new("slack");
        let manager = manager_with(vec![Arc::new(slack)], false);

        manager
            .publish(MonitorEvent::UptimeChanged {
                monitor: Monitor::new("https://example.com"),
                status: SiteStatus::Down,
            })
            .await;

        assert!(slack_log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn one_failing_channel_does_not_block_the_rest() {
        let (slack, slack_log) = RecordingChannel::new("slack");
        let manager =
            manager_with(vec![Arc::new(RecordingChannel::failing("teams")), Arc::new(slack)], true);

        manager
            .publish(MonitorEvent::SslStatusChanged {
                monitor: Monitor::new("https://example.com"),
                status: SslStatus::Expired,
            })
            .await;

        assert_eq!(slack_log.lock().unwrap().len(), 1);
    }

    #[test]
    fn uptime_texts_carry_status_and_severity() {
        let monitor = Monitor::new("https://example.com");

        let (title, message, severity) = uptime_texts(&monitor, SiteStatus::Down);
        assert_eq!(title, "Monitor down: https://example.com");
        assert_eq!(message, "Monitor `https://example.com` is now **down**");
        assert_eq!(severity, Severity::Danger);

        let (_, _, severity) = uptime_texts(&monitor, SiteStatus::Up);
        assert_eq!(severity, Severity::Success);
    }

    #[test]
    fn ssl_texts_mark_only_valid_as_success() {
        let monitor = Monitor::new("https://example.com");

        let (_, _, severity) = ssl_texts(&monitor, SslStatus::Valid);
        assert_eq!(severity, Severity::Success);

        let (title, message, severity) = ssl_texts(&monitor, SslStatus::Expired);
        assert_eq!(title, "SSL Status Changed: https://example.com");
        assert_eq!(message, "SSL certificate for `https://example.com` is now **ssl_expired**");
        assert_eq!(severity, Severity::Warning);
    }

    #[test]
    fn degraded_texts_quote_both_durations() {
        let monitor = Monitor::new("https://example.com");
        let (title, message, severity) = degraded_texts(&monitor, 450, 200);

        assert_eq!(title, "Performance Degraded: https://example.com");
        assert_eq!(
            message,
            "Monitor `https://example.com` response time (**450ms**) exceeded threshold (**200ms**)"
        );
        assert_eq!(severity, Severity::Warning);
    }
}
