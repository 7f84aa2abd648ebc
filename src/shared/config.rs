use serde::Deserialize;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::shared::errors::AppError;

/// Retry budgets for the two external collaborators
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub source_max_attempts: u32,
    pub source_retry_delay_secs: u64,
    pub notify_max_attempts: u32,
    pub notify_retry_delay_secs: u64,
    pub max_retry_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            source_max_attempts: 5,
            source_retry_delay_secs: 2,
            notify_max_attempts: 3,
            notify_retry_delay_secs: 1,
            max_retry_delay_secs: 60,
        }
    }
}

/// Monitor configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// OpenSea collection slug
    pub resource_id: String,
    /// Telegram chat or channel id
    pub destination: Option<String>,
    pub bot_token: Option<String>,
    pub opensea_api_key: Option<String>,
    pub check_interval_secs: u64,
    pub state_file: PathBuf,
    pub log_file: PathBuf,
    pub http_timeout_secs: u64,
    pub retry: RetryConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            resource_id: "hypio".to_string(),
            destination: None,
            bot_token: None,
            opensea_api_key: None,
            check_interval_secs: 300,
            state_file: PathBuf::from("memory.json"),
            log_file: PathBuf::from("price_monitor.log"),
            http_timeout_secs: 10,
            retry: RetryConfig::default(),
        }
    }
}

impl MonitorConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Reject values the monitor cannot run with
    pub fn validate(&self) -> Result<(), AppError> {
        if self.resource_id.trim().is_empty() {
            return Err(AppError::ConfigError("resource id must not be empty".to_string()));
        }
        if self.check_interval_secs == 0 {
            return Err(AppError::ConfigError("check interval must be positive".to_string()));
        }
        if self.retry.source_max_attempts == 0 || self.retry.notify_max_attempts == 0 {
            return Err(AppError::ConfigError("retry attempts must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Telegram credentials, required unless running dry
    pub fn telegram_credentials(&self) -> Result<(&str, &str), AppError> {
        let token = self
            .bot_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::ConfigError("missing TELEGRAM_BOT_TOKEN".to_string()))?;
        let destination = self
            .destination
            .as_deref()
            .filter(|d| !d.is_empty())
            .ok_or_else(|| AppError::ConfigError("missing TELEGRAM_CHANNEL_ID".to_string()))?;
        Ok((token, destination))
    }
}

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Defaults, then the optional TOML file, then `.env` and the environment
    pub fn load(config_path: Option<&Path>) -> Result<MonitorConfig, AppError> {
        let mut config = match config_path {
            Some(path) => Self::from_file(path)?,
            None => MonitorConfig::default(),
        };

        dotenv::dotenv().ok();
        Self::apply_env(&mut config, |key| std::env::var(key).ok())?;

        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<MonitorConfig, AppError> {
        let content = fs::read_to_string(path).map_err(|e| {
            AppError::ConfigError(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        toml::from_str(&content)
            .map_err(|e| AppError::ConfigError(format!("Failed to parse config file: {}", e)))
    }

    /// Overlay values found through `lookup` onto `config`
    pub fn apply_env<F>(config: &mut MonitorConfig, lookup: F) -> Result<(), AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(slug) = lookup("OPENSEA_COLLECTION_SLUG") {
            config.resource_id = slug;
        }
        if let Some(channel) = lookup("TELEGRAM_CHANNEL_ID") {
            config.destination = Some(channel);
        }
        if let Some(token) = lookup("TELEGRAM_BOT_TOKEN") {
            config.bot_token = Some(token);
        }
        if let Some(key) = lookup("OPENSEA_API_KEY") {
            config.opensea_api_key = Some(key);
        }
        if let Some(path) = lookup("STATE_FILE") {
            config.state_file = PathBuf::from(path);
        }
        if let Some(path) = lookup("LOG_FILE") {
            config.log_file = PathBuf::from(path);
        }

        parse_into(&lookup, "CHECK_INTERVAL", &mut config.check_interval_secs)?;
        parse_into(&lookup, "HTTP_TIMEOUT_SECS", &mut config.http_timeout_secs)?;
        parse_into(&lookup, "SOURCE_MAX_ATTEMPTS", &mut config.retry.source_max_attempts)?;
        parse_into(&lookup, "SOURCE_RETRY_DELAY_SECS", &mut config.retry.source_retry_delay_secs)?;
        parse_into(&lookup, "NOTIFY_MAX_ATTEMPTS", &mut config.retry.notify_max_attempts)?;
        parse_into(&lookup, "NOTIFY_RETRY_DELAY_SECS", &mut config.retry.notify_retry_delay_secs)?;
        parse_into(&lookup, "MAX_RETRY_DELAY_SECS", &mut config.retry.max_retry_delay_secs)?;

        Ok(())
    }
}

fn parse_into<F, T>(lookup: &F, key: &str, target: &mut T) -> Result<(), AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    if let Some(raw) = lookup(key) {
        *target = raw
            .trim()
            .parse()
            .map_err(|e| AppError::ConfigError(format!("{} parse failed: {}", key, e)))?;
    }
    Ok(())
}
