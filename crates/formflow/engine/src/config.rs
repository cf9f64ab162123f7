//! Configuration for the formflow engine

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Default session lifetime: twelve hours of inactivity
pub const DEFAULT_SESSION_LIFETIME_SECS: u64 = 12 * 60 * 60;

/// Main engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Session configuration
    #[serde(default)]
    pub sessions: SessionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Seconds of inactivity after which a session expires
    #[serde(default = "default_lifetime")]
    pub lifetime_secs: u64,
}

impl SessionConfig {
    pub fn lifetime(&self) -> Duration {
        // chrono caps durations at i64::MAX milliseconds
        let secs = self.lifetime_secs.min((i64::MAX / 1000) as u64);
        Duration::seconds(secs as i64)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lifetime_secs: DEFAULT_SESSION_LIFETIME_SECS,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_lifetime() -> u64 {
    DEFAULT_SESSION_LIFETIME_SECS
}

fn default_log_level() -> String {
    "info".to_string()
}

impl EngineConfig {
    /// Load configuration: defaults, then the optional file, then
    /// `FORMFLOW_*` environment variables (`FORMFLOW_SESSIONS__LIFETIME_SECS`).
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&EngineConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("FORMFLOW")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
