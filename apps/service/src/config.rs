use std::{env, fmt, fs, path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[source] std::io::Error),
    #[error("failed to write config file: {0}")]
    Write(#[source] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("no config directory available")]
    PathUnavailable,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub scheduler: SchedulerConfig,
    pub defaults: MonitorDefaults,
    pub notifications: NotificationsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "sitepulse.db".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Minutes between dispatch passes
    pub interval_minutes: u32,
    /// Monitors fetched per page during a pass
    pub chunk_size: u64,
    /// Label for the worker group
    pub pool: String,
    /// Concurrent checks allowed at once
    pub workers: usize,
    /// Dispatch certificate checks for every monitor, opted in or not
    pub force_check_ssl: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 1,
            chunk_size: 100,
            pool: "default".to_string(),
            workers: 8,
            force_check_ssl: false,
        }
    }
}

/// Policy applied to monitors created without explicit values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorDefaults {
    pub timeout_seconds: u32,
    pub retry_attempts: u32,
    pub retry_delay_seconds: u32,
    pub alert_throttle_minutes: u32,
}

impl Default for MonitorDefaults {
    fn default() -> Self {
        Self {
            timeout_seconds: 10,
            retry_attempts: 3,
            retry_delay_seconds: 1,
            alert_throttle_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    pub enabled: bool,
    pub slack: ChannelConfig,
    pub discord: ChannelConfig,
    pub teams: ChannelConfig,
    pub webhook: ChannelConfig,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            slack: ChannelConfig::default(),
            discord: ChannelConfig::default(),
            teams: ChannelConfig::default(),
            webhook: ChannelConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub enabled: bool,
    pub target_url: String,
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/sitepulse/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(ConfigError::PathUnavailable);
    };

    Ok(path.join("sitepulse/config.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Database")?;
        write_1(f, "Path", &self.database.path)?;
        write_title_1(f, "Scheduler")?;
        write_1(f, "Interval (minutes)", &self.scheduler.interval_minutes)?;
        write_1(f, "Chunk Size", &self.scheduler.chunk_size)?;
        write_1(f, "Pool", &self.scheduler.pool)?;
        write_1(f, "Workers", &self.scheduler.workers)?;
        write_1(f, "Force SSL Checks", &self.scheduler.force_check_ssl)?;
        write_title_1(f, "Monitor Defaults")?;
        write_1(f, "Timeout (seconds)", &self.defaults.timeout_seconds)?;
        write_1(f, "Retry Attempts", &self.defaults.retry_attempts)?;
        write_1(f, "Retry Delay (seconds)", &self.defaults.retry_delay_seconds)?;
        write_1(f, "Alert Throttle (minutes)", &self.defaults.alert_throttle_minutes)?;
        write_title_1(f, "Notifications")?;
        write_1(f, "Enabled", &self.notifications.enabled)?;
        write_1(f, "Slack", &self.notifications.slack.enabled)?;
        write_1(f, "Discord", &self.notifications.discord.enabled)?;
        write_1(f, "Teams", &self.notifications.teams.enabled)?;
        write_1(f, "Webhook", &self.notifications.webhook.enabled)?;

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/sitepulse/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    ///
    /// ```rust
    /// let cfg = config::Config::from_config(None::<&path::Path>)?;
    /// println!("{}", cfg);
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path).map_err(ConfigError::Read)?;
            Ok(toml::from_str(raw_string.as_str())?)
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ConfigError::Write)?;
        }

        std::fs::write(path, config_str).map_err(ConfigError::Write)
    }
}
