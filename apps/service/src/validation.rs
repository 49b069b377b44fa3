use anyhow::{Result, anyhow};
use url::Url;

use crate::database::models::Monitor;

const CHANNELS: [&str; 4] = ["slack", "discord", "teams", "webhook"];

/// Validation results with specific error messages
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub error: Option<String>,
    pub warning: Option<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self { is_valid: true, error: None, warning: None }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self { is_valid: false, error: Some(msg.into()), warning: None }
    }

    /// Valid, but with something the operator should hear about.
    pub fn warn(msg: impl Into<String>) -> Self {
        Self { is_valid: true, error: None, warning: Some(msg.into()) }
    }

    pub fn to_result(&self) -> Result<()> {
        if self.is_valid {
            Ok(())
        } else {
            Err(anyhow!(self.error.clone().unwrap_or_else(|| "Validation failed".to_string())))
        }
    }
}

/// Validate a monitored URL
pub fn validate_monitor_url(target: &str) -> ValidationResult {
    if target.trim().is_empty() {
        return ValidationResult::err("URL cannot be empty");
    }

    // Try to parse as URL
    match Url::parse(target) {
        Ok(url) => {
            let scheme = url.scheme();
            if scheme != "http" && scheme != "https" {
                return ValidationResult::err(format!(
                    "Invalid scheme '{scheme}'. Must be http or https"
                ));
            }

            if url.host_str().is_none() {
                return ValidationResult::err("URL must have a valid host");
            }

            ValidationResult::ok()
        }
        Err(e) => {
            // If it fails to parse, check if it's missing a scheme
            if !target.contains("://") {
                ValidationResult::err("URL must include scheme (http:// or https://)")
            } else {
                ValidationResult::err(format!("Invalid URL: {e}"))
            }
        }
    }
}

/// Validate check interval in minutes
pub fn validate_interval(interval_minutes: u32) -> ValidationResult {
    if interval_minutes == 0 {
        return ValidationResult::err("Interval must be at least 1 minute");
    }

    if interval_minutes > 1440 {
        return ValidationResult::err("Interval too long (max 24 hours)");
    }

    ValidationResult::ok()
}

/// Validate probe timeout against the check interval
pub fn validate_timeout(timeout_seconds: u32, interval_minutes: u32) -> ValidationResult {
    if timeout_seconds == 0 {
        return ValidationResult::err("Timeout must be at least 1 second");
    }

    if u64::from(timeout_seconds) >= u64::from(interval_minutes) * 60 {
        return ValidationResult::err("Timeout must be less than the check interval");
    }

    ValidationResult::ok()
}

/// Validate the retry budget
pub fn validate_retry_attempts(attempts: u32) -> ValidationResult {
    if attempts > 10 {
        return ValidationResult::err("Retry attempts too high (max 10)");
    }

    ValidationResult::ok()
}

/// Validate a maintenance window configuration
pub fn validate_maintenance_window(monitor: &Monitor) -> ValidationResult {
    match (monitor.maintenance_start_at, monitor.maintenance_end_at) {
        (Some(start), Some(end)) if end < start => {
            ValidationResult::err("Maintenance end must not precede its start")
        }
        (None, Some(_)) => ValidationResult::warn(
            "Maintenance end without a start never matches; the window will be ignored",
        ),
        _ => ValidationResult::ok(),
    }
}

/// Validate the notification channel selection
pub fn validate_channels(channels: &[String]) -> ValidationResult {
    for channel in channels {
        if !CHANNELS.contains(&channel.as_str()) {
            return ValidationResult::err(format!(
                "Unknown notification channel '{channel}'. Known channels: {}",
                CHANNELS.join(", ")
            ));
        }
    }

    ValidationResult::ok()
}

/// Validate a monitor before it is persisted.
///
/// The first failing rule wins. A fully valid monitor may still carry a
/// warning, for example an end-only maintenance window.
pub fn validate_monitor(monitor: &Monitor) -> ValidationResult {
    let checks = [
        validate_monitor_url(&monitor.url),
        validate_interval(monitor.interval_minutes),
        validate_timeout(monitor.timeout_seconds, monitor.interval_minutes),
        validate_retry_attempts(monitor.retry_attempts),
        validate_maintenance_window(monitor),
        validate_channels(&monitor.channels),
    ];

    let mut warning = None;
    for check in checks {
        if !check.is_valid {
            return check;
        }
        if warning.is_none() {
            warning = check.warning;
        }
    }

    match warning {
        Some(message) => ValidationResult::warn(message),
        None => ValidationResult::ok(),
    }
}
