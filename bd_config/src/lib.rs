//! ABOUTME: Configuration management with validation and environment loading
//! ABOUTME: Handles stream, dashboard and server settings from env vars and files

use bd_core::{Error, Result};
use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// Environment variable prefix, e.g. `BROKERDASH_STREAM_URL`
pub const ENV_PREFIX: &str = "BROKERDASH";

/// Optional configuration file looked up in the working directory
pub const CONFIG_FILE: &str = "brokerdash";

/// Main configuration struct
#[derive(Debug, Clone, Deserialize, Serialize, Validate, Default)]
#[serde(default)]
pub struct Config {
    #[validate(nested)]
    pub stream: StreamConfig,
    #[validate(nested)]
    pub dashboard: DashboardConfig,
    #[validate(nested)]
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
}

/// Metrics stream connection settings
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct StreamConfig {
    /// Server-sent events endpoint
    #[validate(url)]
    pub url: String,
    /// Fixed delay before reconnecting after a drop
    #[validate(range(min = 100, max = 60000))]
    pub reconnect_delay_ms: u64,
    /// Time allowed to establish the TCP/TLS connection
    #[validate(range(min = 100, max = 60000))]
    pub connect_timeout_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8080/events".to_string(),
            reconnect_delay_ms: 1500,
            connect_timeout_ms: 5000,
        }
    }
}

impl StreamConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// History sizes kept by the dashboard
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct DashboardConfig {
    /// Points per chart series
    #[validate(range(min = 1, max = 10000))]
    pub series_capacity: usize,
    /// Rows in the recent-ticks table
    #[validate(range(min = 1, max = 10000))]
    pub table_capacity: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            series_capacity: 60,
            table_capacity: 25,
        }
    }
}

/// Observability server configuration
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,
    #[validate(length(min = 1))]
    pub host: String,
    #[validate(range(min = 1, max = 65535))]
    pub obs_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            obs_port: 9100,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.obs_port)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// `production` switches to JSON log lines
    pub env: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            env: "development".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from defaults, an optional `brokerdash.toml` and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from(CONFIG_FILE)
    }

    /// Same as `load`, reading the optional file from `file` (extension probed)
    pub fn load_from(file: &str) -> Result<Self> {
        let mut builder = ConfigBuilder::builder()
            .set_default("stream.url", "http://127.0.0.1:8080/events")?
            .set_default("stream.reconnect_delay_ms", 1500)?
            .set_default("stream.connect_timeout_ms", 5000)?
            .set_default("dashboard.series_capacity", 60)?
            .set_default("dashboard.table_capacity", 25)?
            .set_default("server.enabled", true)?
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.obs_port", 9100)?
            .set_default("telemetry.env", "development")?;

        // Field names contain underscores, so the env separator cannot be a
        // single underscore; map the nested keys explicitly.
        for (var, key) in [
            ("STREAM_URL", "stream.url"),
            ("STREAM_RECONNECT_DELAY_MS", "stream.reconnect_delay_ms"),
            ("STREAM_CONNECT_TIMEOUT_MS", "stream.connect_timeout_ms"),
            ("DASHBOARD_SERIES_CAPACITY", "dashboard.series_capacity"),
            ("DASHBOARD_TABLE_CAPACITY", "dashboard.table_capacity"),
            ("SERVER_ENABLED", "server.enabled"),
            ("SERVER_HOST", "server.host"),
            ("SERVER_OBS_PORT", "server.obs_port"),
            ("TELEMETRY_ENV", "telemetry.env"),
        ] {
            if let Ok(value) = std::env::var(format!("{}_{}", ENV_PREFIX, var)) {
                builder = builder.set_override(key, value)?;
            }
        }

        builder = builder.add_source(File::with_name(file).required(false));

        // Remaining `BROKERDASH__SECTION__KEY` style variables
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
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

        Ok(parsed)
    }
}
