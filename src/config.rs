//! Configuration management for the Powershop collector
//!
//! This module handles loading, validation, and management of the application
//! configuration from YAML files with support for environment variable
//! overrides of the account credentials.

use crate::error::{PowershopError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

mod defaults;

/// Environment variable overriding `credentials.username`
pub const USERNAME_ENV: &str = "POWERSHOP_USERNAME";
/// Environment variable overriding `credentials.password`
pub const PASSWORD_ENV: &str = "POWERSHOP_PASSWORD";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Account login, shared by the token API and the web session
    pub credentials: Credentials,

    /// Signed JSON API settings
    pub api: ApiConfig,

    /// Cookie/form web session settings
    pub web: WebConfig,

    /// Interval report download settings
    pub report: ReportConfig,

    /// Days of interval usage requested per property
    pub usage_window_days: u32,

    /// Provider-local timezone used for "today" and month labels
    pub timezone: String,

    /// Upper bound on per-property fetches in flight (1 = sequential)
    pub max_concurrent_fetches: usize,

    /// Seconds between refresh cycles when running continuously
    pub poll_interval_seconds: u64,

    /// Where finished aggregates are published
    pub output: OutputConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Account credentials; never logged
#[derive(Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Token API parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL, e.g. `https://secure.powershop.co.nz/external_api/v4/`
    pub base_url: String,

    /// Value of the `client_version` query parameter sent on every call
    pub client_version: String,

    /// Application consumer key
    pub consumer_key: String,

    /// Application consumer secret
    pub consumer_secret: String,

    /// Device identifiers sent with the token login
    pub device_type: String,
    pub device_name: String,

    /// Per-request timeout for signed JSON calls
    pub timeout_seconds: u64,
}

/// Web session parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Site root, e.g. `https://secure.powershop.co.nz`
    pub base_url: String,

    /// Per-request timeout for the HTML and report endpoints
    pub timeout_seconds: u64,
}

/// Report download settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Whether to log into the web session and download the report at all
    pub enabled: bool,

    /// Length of the trailing window ending today
    pub window_days: u32,
}

/// Publishing targets
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path of the JSON snapshot of the latest aggregate
    pub snapshot_path: Option<String>,

    /// Log a per-property summary after every cycle
    pub log_summary: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Optional console-specific level
    pub console_level: Option<String>,

    /// Optional file-specific level
    pub file_level: Option<String>,

    /// Log directory or file path (its parent directory is used)
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl WebConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the first default location that exists
    pub fn load() -> Result<Self> {
        let default_paths = [
            "powershop_config.yaml",
            "/data/powershop_config.yaml",
            "/etc/powershop/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        Ok(Config::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Replace credentials from `POWERSHOP_USERNAME` / `POWERSHOP_PASSWORD` when set
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Same as [`Config::apply_env_overrides`] with an injectable lookup
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(user) = lookup(USERNAME_ENV).filter(|v| !v.trim().is_empty()) {
            self.credentials.username = user;
        }
        if let Some(pass) = lookup(PASSWORD_ENV).filter(|v| !v.is_empty()) {
            self.credentials.password = pass;
        }
    }

    /// Parse the configured timezone
    pub fn tz(&self) -> Result<chrono_tz::Tz> {
        self.timezone.parse::<chrono_tz::Tz>().map_err(|_| {
            PowershopError::validation(
                "timezone".to_string(),
                format!("Unknown timezone: {}", self.timezone),
            )
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.credentials.username.trim().is_empty() {
            return Err(PowershopError::validation(
                "credentials.username",
                "Username cannot be empty",
            ));
        }

        if self.credentials.password.is_empty() {
            return Err(PowershopError::validation(
                "credentials.password",
                "Password cannot be empty",
            ));
        }

        for (field, url) in [
            ("api.base_url", &self.api.base_url),
            ("web.base_url", &self.web.base_url),
        ] {
            if reqwest::Url::parse(url).is_err() {
                return Err(PowershopError::validation(
                    field.to_string(),
                    format!("Invalid URL: {}", url),
                ));
            }
        }

        if self.api.timeout_seconds == 0 || self.web.timeout_seconds == 0 {
            return Err(PowershopError::validation(
                "timeout_seconds",
                "Must be greater than 0",
            ));
        }

        if self.usage_window_days == 0 || self.report.window_days == 0 {
            return Err(PowershopError::validation(
                "window_days",
                "Must be greater than 0",
            ));
        }

        if self.max_concurrent_fetches == 0 {
            return Err(PowershopError::validation(
                "max_concurrent_fetches",
                "Must be greater than 0",
            ));
        }

        if self.poll_interval_seconds == 0 {
            return Err(PowershopError::validation(
                "poll_interval_seconds",
                "Must be greater than 0",
            ));
        }

        self.tz()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        let mut config = Config::default();
        config.credentials.username = "user@example.com".into();
        config.credentials.password = "secret".into();
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api.timeout_seconds, 10);
        assert_eq!(config.web.timeout_seconds, 20);
        assert_eq!(config.usage_window_days, 30);
        assert_eq!(config.max_concurrent_fetches, 1);
        assert_eq!(config.timezone, "Pacific/Auckland");
    }

    #[test]
    fn test_config_validation() {
        let mut config = valid();
        assert!(config.validate().is_ok());

        config.credentials.username = String::new();
        assert!(config.validate().is_err());

        config = valid();
        config.timezone = "Mars/Olympus".into();
        assert!(config.validate().is_err());

        config = valid();
        config.web.timeout_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides_from(|key| match key {
            USERNAME_ENV => Some("env@example.com".to_string()),
            PASSWORD_ENV => Some("pw".to_string()),
            _ => None,
        });
        assert_eq!(config.credentials.username, "env@example.com");
        assert_eq!(config.credentials.password, "pw");
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = valid().credentials;
        let dbg = format!("{:?}", creds);
        assert!(!dbg.contains("secret"));
        assert!(dbg.contains("user@example.com"));
    }
}
