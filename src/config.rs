//! Configuration loader for the sensor node and the alert notifier.
//!
//! Centralizes all runtime configuration values and their defaults, loaded
//! from environment variables (with optional `.env` file support provided by
//! the caller), so `env::var` calls are not scattered through the codebase.
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::bus::DEFAULT_ENDPOINT;

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env_u64 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<u64>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Optional string environment variable with a default value.
macro_rules! env_or {
    ($var_name:expr, $default:expr) => {
        env::var($var_name).unwrap_or_else(|_| $default.to_string())
    };
}

/// Sensor node configuration, immutable once loaded.
#[derive(Debug, Clone)]
pub struct SensorConfig {
    // ---
    /// External sampler command printing `voltage,current,temperature`.
    pub sampler_cmd: String,

    /// Alert bus endpoint to connect to.
    pub bus_endpoint: String,

    /// Seconds between two readings.
    pub sample_interval_secs: u64,

    /// Script run once when the battery turns critical.
    pub shutdown_script: PathBuf,
}

/// Alert notifier configuration, immutable once loaded.
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    // ---
    /// Telegram bot token.
    pub bot_token: String,

    /// Telegram Bot API root.
    pub api_url: String,

    /// Long-poll timeout for `getUpdates`.
    pub poll_timeout_secs: u64,

    /// Alert bus endpoint to bind.
    pub bus_endpoint: String,

    /// Current subscriber store.
    pub subscribers_file: PathBuf,

    /// Legacy id-list migrated on first start.
    pub legacy_subscribers_file: PathBuf,
}

fn default_shutdown_script() -> PathBuf {
    // ---
    let home = env::var("HOME").map(PathBuf::from).unwrap_or_default();
    home.join("OrangeBox/scripts/shutdown.sh")
}

/// Load the sensor node configuration.
///
/// Required:
/// - `SAMPLER_CMD` – command producing one reading per run
///
/// Optional:
/// - `BUS_ENDPOINT` – alert bus address (default: `127.0.0.1:5556`)
/// - `SAMPLE_INTERVAL_SECS` – seconds between readings (default: 5)
/// - `SHUTDOWN_SCRIPT` – (default: `$HOME/OrangeBox/scripts/shutdown.sh`)
pub fn load_sensor_from_env() -> Result<SensorConfig> {
    // ---
    let sampler_cmd = require_env!("SAMPLER_CMD");
    let bus_endpoint = env_or!("BUS_ENDPOINT", DEFAULT_ENDPOINT);
    let sample_interval_secs = parse_env_u64!("SAMPLE_INTERVAL_SECS", 5);
    let shutdown_script = env::var("SHUTDOWN_SCRIPT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| default_shutdown_script());

    Ok(SensorConfig {
        sampler_cmd,
        bus_endpoint,
        sample_interval_secs,
        shutdown_script,
    })
}

/// Load the alert notifier configuration.
///
/// Required:
/// - `TELEGRAM_BOT_TOKEN`
///
/// Optional:
/// - `TELEGRAM_API_URL` (default: `https://api.telegram.org`)
/// - `TELEGRAM_POLL_TIMEOUT_SECS` (default: 30)
/// - `BUS_ENDPOINT` (default: `127.0.0.1:5556`)
/// - `SUBSCRIBERS_FILE` (default: `subscribers.json`)
/// - `LEGACY_SUBSCRIBERS_FILE` (default: `subscribers.txt`)
pub fn load_notifier_from_env() -> Result<NotifierConfig> {
    // ---
    let bot_token = require_env!("TELEGRAM_BOT_TOKEN");
    let api_url = env_or!("TELEGRAM_API_URL", "https://api.telegram.org");
    let poll_timeout_secs = parse_env_u64!("TELEGRAM_POLL_TIMEOUT_SECS", 30);
    let bus_endpoint = env_or!("BUS_ENDPOINT", DEFAULT_ENDPOINT);
    let subscribers_file = PathBuf::from(env_or!("SUBSCRIBERS_FILE", "subscribers.json"));
    let legacy_subscribers_file =
        PathBuf::from(env_or!("LEGACY_SUBSCRIBERS_FILE", "subscribers.txt"));

    Ok(NotifierConfig {
        bot_token,
        api_url,
        poll_timeout_secs,
        bus_endpoint,
        subscribers_file,
        legacy_subscribers_file,
    })
}

/// Hide the secret half of a `<bot id>:<secret>` token.
pub fn mask_token(token: &str) -> String {
    // ---
    match token.split_once(':') {
        Some((id, _)) => format!("{}:****", id),
        None => "****".to_string(),
    }
}

impl SensorConfig {
    // ---
    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs(self.sample_interval_secs)
    }

    /// Log the loaded configuration for debugging purposes.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        tracing::info!("  SAMPLER_CMD          : {}", self.sampler_cmd);
        tracing::info!("  BUS_ENDPOINT         : {}", self.bus_endpoint);
        tracing::info!("  SAMPLE_INTERVAL_SECS : {}", self.sample_interval_secs);
        tracing::info!("  SHUTDOWN_SCRIPT      : {}", self.shutdown_script.display());
    }
}

impl NotifierConfig {
    // ---
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    /// Log the loaded configuration, masking the bot token.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        tracing::info!("  TELEGRAM_BOT_TOKEN         : {}", mask_token(&self.bot_token));
        tracing::info!("  TELEGRAM_API_URL           : {}", self.api_url);
        tracing::info!("  TELEGRAM_POLL_TIMEOUT_SECS : {}", self.poll_timeout_secs);
        tracing::info!("  BUS_ENDPOINT               : {}", self.bus_endpoint);
        tracing::info!("  SUBSCRIBERS_FILE           : {}", self.subscribers_file.display());
        tracing::info!(
            "  LEGACY_SUBSCRIBERS_FILE    : {}",
            self.legacy_subscribers_file.display()
        );
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serial_test::serial;

    const SENSOR_VARS: [&str; 4] = [
        "SAMPLER_CMD",
        "BUS_ENDPOINT",
        "SAMPLE_INTERVAL_SECS",
        "SHUTDOWN_SCRIPT",
    ];

    fn clear(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_mask_token() {
        // ---
        assert_eq!(mask_token("123456:AAE-secret"), "123456:****");
        assert_eq!(mask_token("garbage"), "****");
    }

    #[test]
    #[serial]
    fn test_sensor_defaults() {
        // ---
        clear(&SENSOR_VARS);
        env::set_var("SAMPLER_CMD", "read_sensors");

        let cfg = load_sensor_from_env().unwrap();
        assert_eq!(cfg.sampler_cmd, "read_sensors");
        assert_eq!(cfg.bus_endpoint, "127.0.0.1:5556");
        assert_eq!(cfg.sample_interval(), Duration::from_secs(5));
        assert!(cfg.shutdown_script.ends_with("OrangeBox/scripts/shutdown.sh"));

        clear(&SENSOR_VARS);
    }

    #[test]
    #[serial]
    fn test_sensor_requires_sampler_and_valid_interval() {
        // ---
        clear(&SENSOR_VARS);
        assert!(load_sensor_from_env().is_err());

        env::set_var("SAMPLER_CMD", "read_sensors");
        env::set_var("SAMPLE_INTERVAL_SECS", "five");
        let err = load_sensor_from_env().unwrap_err();
        assert!(err.to_string().contains("SAMPLE_INTERVAL_SECS"));

        clear(&SENSOR_VARS);
    }

    #[test]
    #[serial]
    fn test_notifier_overrides() {
        // ---
        env::set_var("TELEGRAM_BOT_TOKEN", "1:x");
        env::set_var("SUBSCRIBERS_FILE", "/var/lib/orangebox/subscribers.json");
        env::set_var("TELEGRAM_POLL_TIMEOUT_SECS", "10");

        let cfg = load_notifier_from_env().unwrap();
        assert_eq!(cfg.subscribers_file, PathBuf::from("/var/lib/orangebox/subscribers.json"));
        assert_eq!(cfg.poll_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.api_url, "https://api.telegram.org");

        clear(&[
            "TELEGRAM_BOT_TOKEN",
            "SUBSCRIBERS_FILE",
            "TELEGRAM_POLL_TIMEOUT_SECS",
        ]);
    }
}
