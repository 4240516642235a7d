//! Configuration loading.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. Explicit path (if provided)
//! 2. `~/.sluice/config.toml` (user)
//! 3. `/etc/sluice/config.toml` (system)

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::resilience::{AlertThresholds, RetryConfig};
use crate::{Result, SluiceError};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub broker: BrokerSection,
    #[serde(default)]
    pub admin: AdminSection,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub alerts: AlertsSection,
}

/// Disk cache settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    /// Cache directory (default: `~/.sluice/cache`).
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// In-memory entries kept in front of the disk store (default: 10000).
    #[serde(default = "default_memory_entries")]
    pub max_memory_entries: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            dir: None,
            max_memory_entries: default_memory_entries(),
        }
    }
}

fn default_memory_entries() -> u64 {
    10_000
}

/// Broker pacing and dispatch settings.
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerSection {
    /// Rate applied to newly created brokers (default: 1.0).
    #[serde(default = "default_rate")]
    pub default_calls_per_second: f64,
    /// Upstream request timeout in seconds (default: 30).
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    /// Push-channel buffer per client (default: 64).
    #[serde(default = "default_notify_buffer")]
    pub notify_buffer: usize,
}

impl Default for BrokerSection {
    fn default() -> Self {
        Self {
            default_calls_per_second: default_rate(),
            request_timeout_secs: default_timeout(),
            notify_buffer: default_notify_buffer(),
        }
    }
}

fn default_rate() -> f64 {
    1.0
}

fn default_timeout() -> u64 {
    30
}

fn default_notify_buffer() -> usize {
    64
}

/// Admin surface settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminSection {
    /// Bearer credential for mutating operations. Unset means open.
    #[serde(default)]
    pub bearer: Option<String>,
}

/// Retry policy settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: default_jitter(),
        }
    }
}

impl RetrySection {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig::new()
            .max_attempts(self.max_attempts)
            .initial_delay(Duration::from_millis(self.initial_delay_ms))
            .max_delay(Duration::from_millis(self.max_delay_ms))
            .jitter(self.jitter)
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_jitter() -> bool {
    true
}

/// Alerting thresholds.
#[derive(Debug, Clone, Deserialize)]
pub struct AlertsSection {
    #[serde(default = "default_error_rate")]
    pub max_error_rate_percent: f64,
    #[serde(default = "default_mean_latency")]
    pub max_mean_latency_ms: f64,
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,
}

impl Default for AlertsSection {
    fn default() -> Self {
        Self {
            max_error_rate_percent: default_error_rate(),
            max_mean_latency_ms: default_mean_latency(),
            cooldown_secs: default_cooldown(),
        }
    }
}

impl AlertsSection {
    pub fn to_thresholds(&self) -> AlertThresholds {
        AlertThresholds::new()
            .max_error_rate_percent(self.max_error_rate_percent)
            .max_mean_latency_ms(self.max_mean_latency_ms)
    }
}

fn default_error_rate() -> f64 {
    15.0
}

fn default_mean_latency() -> f64 {
    3000.0
}

fn default_cooldown() -> u64 {
    300
}

impl Config {
    /// Load configuration from the standard locations.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?;
        let content = fs::read_to_string(&path).map_err(|e| {
            SluiceError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            SluiceError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    /// Resolve the config file path.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(SluiceError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".sluice").join("config.toml");
            if user_config.exists() {
                return Ok(user_config);
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/sluice/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }

        Err(SluiceError::Configuration(
            "No config file found. Create ~/.sluice/config.toml or /etc/sluice/config.toml"
                .to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.broker.default_calls_per_second, 1.0);
        assert_eq!(config.broker.request_timeout_secs, 30);
        assert_eq!(config.broker.notify_buffer, 64);
        assert_eq!(config.cache.max_memory_entries, 10_000);
        assert!(config.admin.bearer.is_none());
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.alerts.max_error_rate_percent, 15.0);
        assert_eq!(config.alerts.cooldown_secs, 300);
    }

    #[test]
    fn parse_minimal_config() {
        let toml = r#"
            [broker]
            default_calls_per_second = 2.5
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.broker.default_calls_per_second, 2.5);
        // Defaults preserved
        assert_eq!(config.broker.request_timeout_secs, 30);
        assert_eq!(config.cache.max_memory_entries, 10_000);
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
            [cache]
            dir = "/var/cache/sluice"
            max_memory_entries = 500

            [broker]
            default_calls_per_second = 0.5
            request_timeout_secs = 10
            notify_buffer = 16

            [admin]
            bearer = "s3cret"

            [retry]
            max_attempts = 5
            initial_delay_ms = 100
            max_delay_ms = 2000
            jitter = false

            [alerts]
            max_error_rate_percent = 25.0
            max_mean_latency_ms = 1500.0
            cooldown_secs = 60
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.cache.dir, Some(PathBuf::from("/var/cache/sluice")));
        assert_eq!(config.cache.max_memory_entries, 500);
        assert_eq!(config.broker.default_calls_per_second, 0.5);
        assert_eq!(config.broker.notify_buffer, 16);
        assert_eq!(config.admin.bearer.as_deref(), Some("s3cret"));
        assert_eq!(config.retry.max_attempts, 5);
        assert!(!config.retry.jitter);
        assert_eq!(config.alerts.max_mean_latency_ms, 1500.0);
        assert_eq!(config.alerts.cooldown_secs, 60);
    }

    #[test]
    fn retry_section_converts() {
        let section = RetrySection {
            max_attempts: 4,
            initial_delay_ms: 250,
            max_delay_ms: 1000,
            jitter: false,
        };
        let retry = section.to_retry_config();
        assert_eq!(retry.max_attempts, 4);
        assert_eq!(retry.initial_delay, Duration::from_millis(250));
        assert_eq!(retry.max_delay, Duration::from_secs(1));
        assert!(!retry.jitter);
    }

    #[test]
    fn config_not_found_returns_error() {
        let result = Config::load(Some(Path::new("/nonexistent/config.toml")));
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Config file not found"));
    }
}
