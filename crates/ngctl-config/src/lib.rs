#![deny(unsafe_code)]

//! Configuration loading and validation for ngctl.
//!
//! Loads an optional TOML file and layers the `CONTROL_SOCKET` environment
//! variable on top of it. [`AppConfig`] is the central configuration
//! structure.
//!
//! ## TOML Example
//!
//! ```toml
//! [control]
//! socket_path = "/var/lib/syslog-ng/syslog-ng.ctl"
//! timeout_secs = 10
//! max_response_bytes = 16777216
//!
//! [logging]
//! level = "warn"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default location of the daemon's control socket.
pub const DEFAULT_SOCKET_PATH: &str = "/var/lib/syslog-ng/syslog-ng.ctl";

/// Environment variable that overrides `control.socket_path`.
pub const SOCKET_ENV_VAR: &str = "CONTROL_SOCKET";

const VALID_LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Control socket connection settings.
    #[serde(default)]
    pub control: ControlConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How to reach the daemon's control socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Filesystem path of the control socket.
    #[serde(default = "default_socket_path")]
    pub socket_path: String,

    /// Per-command deadline in seconds (0 = no deadline).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Largest response accepted from the daemon, in bytes.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            timeout_secs: default_timeout_secs(),
            max_response_bytes: default_max_response_bytes(),
        }
    }
}

impl ControlConfig {
    /// The per-command deadline, if one is configured.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

fn default_socket_path() -> String {
    DEFAULT_SOCKET_PATH.to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_response_bytes() -> usize {
    16 * 1024 * 1024 // 16 MiB
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "warn", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, then re-validate.
    ///
    /// An empty `CONTROL_SOCKET` is treated as unset.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(SOCKET_ENV_VAR).filter(|p| !p.is_empty()) {
            debug!(path = %path, "control socket from {SOCKET_ENV_VAR}");
            self.control.socket_path = path;
        }
        self.validate()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.control.socket_path.is_empty() {
            return Err(ConfigError::Validation(
                "control.socket_path must not be empty".to_string(),
            ));
        }
        if self.control.max_response_bytes == 0 {
            return Err(ConfigError::Validation(
                "control.max_response_bytes must be non-zero".to_string(),
            ));
        }
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {:?}, got {:?}",
                VALID_LOG_LEVELS, self.logging.level
            )));
        }
        Ok(())
    }
}
