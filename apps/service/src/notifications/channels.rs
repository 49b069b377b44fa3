use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use thiserror::Error;

use crate::config::ChannelConfig;

/// Tone of a notification, mapped to channel specific colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Danger,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Success => "success",
            Severity::Danger => "danger",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

/// Failure while delivering one notification to one channel.
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("delivery failed: {0}")]
    Deliver(#[source] reqwest::Error),
    #[error("{channel} webhook rejected the payload with HTTP {status}")]
    Rejected { channel: &'static str, status: u16 },
}

/// One outbound notification target.
///
/// Channels differ only in payload shape; delivery is shared and posts the
/// formatted JSON body to the configured webhook.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Channel name used for per-monitor routing
    fn name(&self) -> &'static str;

    /// Whether this channel is turned on and has a target configured
    fn is_enabled(&self) -> bool;

    /// Webhook endpoint to post to
    fn target_url(&self) -> Option<&str>;

    /// Channel specific JSON body
    fn format_payload(&self, title: &str, message: &str, severity: Severity) -> Value;

    /// Post one notification, skipping silently when the channel is off.
    async fn deliver(
        &self,
        client: &reqwest::Client,
        title: &str,
        message: &str,
        severity: Severity,
    ) -> Result<(), NotificationError> {
        if !self.is_enabled() {
            return Ok(());
        }
        let Some(url) = self.target_url() else {
            return Ok(());
        };

        let payload = self.format_payload(title, message, severity);
        let response =
            client.post(url).json(&payload).send().await.map_err(NotificationError::Deliver)?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotificationError::Rejected { channel: self.name(), status: status.as_u16() });
        }
        Ok(())
    }
}

fn configured_url(config: &ChannelConfig) -> Option<&str> {
    (!config.target_url.is_empty()).then_some(config.target_url.as_str())
}

pub struct SlackChannel {
    config: ChannelConfig,
}

impl SlackChannel {
    pub fn new(config: ChannelConfig) -> Self {
        Self { config }
    }
}

impl NotificationChannel for SlackChannel {
    fn name(&self) -> &'static str {
        "slack"
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled && !self.config.target_url.is_empty()
    }

    fn target_url(&self) -> Option<&str> {
        configured_url(&self.config)
    }

    fn format_payload(&self, title: &str, message: &str, severity: Severity) -> Value {
        let color = match severity {
            Severity::Success => "good",
            Severity::Danger => "danger",
            Severity::Warning => "warning",
            Severity::Info => "#36a64f",
        };

        json!({
            "attachments": [{
                "color": color,
                "title": title,
                "text": message,
                "footer": "SitePulse",
                "footer_icon": "https://platform.slack-edge.com/img/default_application_icon.png",
                "ts": Utc::now().timestamp(),
            }]
        })
    }
}

pub struct DiscordChannel {
    config: ChannelConfig,
}

impl DiscordChannel {
    pub fn new(config: ChannelConfig) -> Self {
        Self { config }
    }
}

impl NotificationChannel for DiscordChannel {
    fn name(&self) -> &'static str {
        "discord"
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled && !self.config.target_url.is_empty()
    }

    fn target_url(&self) -> Option<&str> {
        configured_url(&self.config)
    }

    fn format_payload(&self, title: &str, message: &str, severity: Severity) -> Value {
        let color = match severity {
            Severity::Success => 3_066_993,
            Severity::Danger => 15_158_332,
            Severity::Warning => 16_776_960,
            Severity::Info => 3_447_003,
        };

        json!({
            "embeds": [{
                "title": title,
                "description": message,
                "color": color,
                "footer": { "text": "SitePulse" },
                "timestamp": Utc::now().to_rfc3339(),
            }]
        })
    }
}

pub struct TeamsChannel {
    config: ChannelConfig,
}

impl TeamsChannel {
    pub fn new(config: ChannelConfig) -> Self {
        Self { config }
    }
}

impl NotificationChannel for TeamsChannel {
    fn name(&self) -> &'static str {
        "teams"
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled && !self.config.target_url.is_empty()
    }

    fn target_url(&self) -> Option<&str> {
        configured_url(&self.config)
    }

    fn format_payload(&self, title: &str, message: &str, severity: Severity) -> Value {
        let theme_color = match severity {
            Severity::Success => "00FF00",
            Severity::Danger => "FF0000",
            Severity::Warning => "FFA500",
            Severity::Info => "0078D4",
        };

        json!({
            "@type": "MessageCard",
            "@context": "https://schema.org/extensions",
            "summary": title,
            "themeColor": theme_color,
            "title": title,
            "sections": [{
                "activityTitle": "SitePulse",
                "activitySubtitle": Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
                "text": message,
            }]
        })
    }
}

/// Generic webhook for systems without a dedicated integration.
pub struct WebhookChannel {
    config: ChannelConfig,
}

impl WebhookChannel {
    pub fn new(config: ChannelConfig) -> Self {
        Self { config }
    }
}

impl NotificationChannel for WebhookChannel {
    fn name(&self) -> &'static str {
        "webhook"
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled && !self.config.target_url.is_empty()
    }

    fn target_url(&self) -> Option<&str> {
        configured_url(&self.config)
    }

    fn format_payload(&self, title: &str, message: &str, severity: Severity) -> Value {
        json!({
            "event": "monitor_alert",
            "title": title,
            "message": message,
            "severity": severity.as_str(),
            "timestamp": Utc::now().to_rfc3339(),
            "source": "SitePulse",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(enabled: bool, target_url: &str) -> ChannelConfig {
        ChannelConfig { enabled, target_url: target_url.to_string() }
    }

    #[test]
    fn channel_requires_flag_and_url() {
        assert!(SlackChannel::new(config(true, "https://hooks.slack.com/x")).is_enabled());
        assert!(!SlackChannel::new(config(false, "https://hooks.slack.com/x")).is_enabled());
        assert!(!SlackChannel::new(config(true, "")).is_enabled());
        assert!(SlackChannel::new(config(true, "")).target_url().is_none());
    }

    #[test]
    fn slack_payload_uses_attachment_colors() {
        let channel = SlackChannel::new(config(true, "https://hooks.slack.com/x"));
        let payload = channel.format_payload("Monitor down: x", "body", Severity::Danger);
        let attachment = &payload["attachments"][0];

        assert_eq!(attachment["color"], "danger");
        assert_eq!(attachment["title"], "Monitor down: x");
        assert_eq!(attachment["text"], "body");
        assert_eq!(attachment["footer"], "SitePulse");
        assert!(attachment["ts"].is_i64());

        let success = channel.format_payload("t", "m", Severity::Success);
        assert_eq!(success["attachments"][0]["color"], "good");
        let info = channel.format_payload("t", "m", Severity::Info);
        assert_eq!(info["attachments"][0]["color"], "#36a64f");
    }

    #[test]
    fn discord_payload_uses_embed_color_codes() {
        let channel = DiscordChannel::new(config(true, "https://discord.com/api/webhooks/x"));
        let payload = channel.format_payload("title", "message", Severity::Success);
        let embed = &payload["embeds"][0];

        assert_eq!(embed["title"], "title");
        assert_eq!(embed["description"], "message");
        assert_eq!(embed["color"], 3_066_993);
        assert_eq!(embed["footer"]["text"], "SitePulse");
        assert!(embed["timestamp"].is_string());

        let danger = channel.format_payload("t", "m", Severity::Danger);
        assert_eq!(danger["embeds"][0]["color"], 15_158_332);
    }

    #[test]
    fn teams_payload_is_a_message_card() {
        let channel = TeamsChannel::new(config(true, "https://outlook.office.com/webhook/x"));
        let payload = channel.format_payload("title", "message", Severity::Warning);

        assert_eq!(payload["@type"], "MessageCard");
        assert_eq!(payload["@context"], "https://schema.org/extensions");
        assert_eq!(payload["summary"], "title");
        assert_eq!(payload["themeColor"], "FFA500");
        assert_eq!(payload["sections"][0]["activityTitle"], "SitePulse");
        assert_eq!(payload["sections"][0]["text"], "message");
    }

    #[test]
    fn webhook_payload_carries_event_envelope() {
        let channel = WebhookChannel::new(config(true, "https://example.com/hook"));
        let payload = channel.format_payload("title", "message", Severity::Warning);

        assert_eq!(payload["event"], "monitor_alert");
        assert_eq!(payload["title"], "title");
        assert_eq!(payload["message"], "message");
        assert_eq!(payload["severity"], "warning");
        assert_eq!(payload["source"], "SitePulse");
        assert!(payload["timestamp"].is_string());
    }
}
