//! ABOUTME: Configuration management with validation and environment loading
//! ABOUTME: Handles push backend, retry, and telemetry settings

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use pc_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

/// Main configuration struct
#[derive(Debug, Clone, Deserialize, Serialize, Validate, Default)]
#[serde(default)]
pub struct Config {
    #[validate(nested)]
    pub push: PushConfig,
    #[validate(nested)]
    pub retry: RetryConfig,
    #[validate(nested)]
    pub telemetry: TelemetryConfig,
}

/// Push backend configuration with secret redaction
#[derive(Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct PushConfig {
    #[validate(url)]
    pub endpoint: String,
    /// Server key sent in the Authorization header
    pub api_key: String,
    /// Timeout for a single batch request
    #[validate(range(min = 1, max = 300))]
    pub timeout_seconds: u64,
    /// Override the backend's per-batch recipient limit
    #[validate(range(min = 1, max = 1000))]
    pub max_recipients: Option<usize>,
    /// Override the backend's maximum time-to-live
    pub max_time_to_live_seconds: Option<u32>,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://android.googleapis.com/gcm/send".to_string(),
            api_key: String::new(),
            timeout_seconds: 30,
            max_recipients: None,
            max_time_to_live_seconds: None,
        }
    }
}

impl fmt::Debug for PushConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"[REDACTED]")
            .field("timeout_seconds", &self.timeout_seconds)
            .field("max_recipients", &self.max_recipients)
            .field("max_time_to_live_seconds", &self.max_time_to_live_seconds)
            .finish()
    }
}

/// Retry and backoff configuration
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct RetryConfig {
    /// Extra rounds after the first send
    #[validate(range(min = 0, max = 20))]
    pub max_retries: i32,
    #[validate(range(min = 1, max = 60000))]
    pub initial_delay_ms: u64,
    #[validate(range(min = 1, max = 3600000))]
    pub max_delay_ms: u64,
    #[validate(range(max = 100))]
    pub jitter_percent: u8,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 1_024_000,
            jitter_percent: 50,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct TelemetryConfig {
    /// `production` switches logs to JSON lines
    #[validate(length(min = 1))]
    pub environment: String,
    #[validate(length(min = 1))]
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            service_name: "pushcast".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from defaults, an optional `pushcast.toml`, and
    /// `PUSHCAST_` environment variables (`__` separates nested keys)
    pub fn load() -> Result<Self> {
        Self::load_from(Some("pushcast.toml"))
    }

    /// Load configuration, reading `file` if it is given and exists
    pub fn load_from(file: Option<&str>) -> Result<Self> {
        let defaults = Config::default();
        let mut builder = ConfigBuilder::builder()
            .set_default("push.endpoint", defaults.push.endpoint)?
            .set_default("push.api_key", defaults.push.api_key)?
            .set_default("push.timeout_seconds", defaults.push.timeout_seconds)?
            .set_default("retry.max_retries", defaults.retry.max_retries)?
            .set_default("retry.initial_delay_ms", defaults.retry.initial_delay_ms)?
            .set_default("retry.max_delay_ms", defaults.retry.max_delay_ms)?
            .set_default("retry.jitter_percent", i64::from(defaults.retry.jitter_percent))?
            .set_default("telemetry.environment", defaults.telemetry.environment)?
            .set_default("telemetry.service_name", defaults.telemetry.service_name)?;

        if let Some(file) = file {
            if std::path::Path::new(file).exists() {
                builder = builder.add_source(File::new(file, FileFormat::Toml).required(false));
            }
        }

        // Environment variables have the highest priority
        builder = builder.add_source(
            Environment::with_prefix("PUSHCAST")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to build config: {}", e)))?;

        let parsed: Config = config
            .try_deserialize()
            .map_err(|e| Error::Config(format!("Failed to deserialize config: {}", e)))?;

        parsed
            .validate()
            .map_err(|e| Error::Config(format!("Config validation failed: {}", e)))?;

        if parsed.retry.initial_delay_ms > parsed.retry.max_delay_ms {
            return Err(Error::Config(
                "retry.initial_delay_ms must not exceed retry.max_delay_ms".to_string(),
            ));
        }

        Ok(parsed)
    }
}
