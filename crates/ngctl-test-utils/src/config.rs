//! Configuration builders for tests.
//!
//! Use [`TestConfigBuilder`] to create customised [`AppConfig`] values without
//! repeating boilerplate across crate boundaries.

use std::path::{Path, PathBuf};

use ngctl_config::AppConfig;

/// Fluent builder for [`AppConfig`] in tests.
///
/// # Example
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .socket_path(daemon.socket_path())
///     .timeout_secs(1)
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn socket_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config.control.socket_path = path.as_ref().display().to_string();
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.control.timeout_secs = secs;
        self
    }

    pub fn max_response_bytes(mut self, limit: usize) -> Self {
        self.config.control.max_response_bytes = limit;
        self
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.config.logging.level = level.to_string();
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }

    /// Serialize the config as `ngctl.toml` inside `dir` and return its path.
    pub fn write_to(self, dir: &Path) -> PathBuf {
        let path = dir.join("ngctl.toml");
        let text = toml::to_string_pretty(&self.config).expect("failed to serialize test config");
        std::fs::write(&path, text).expect("failed to write test config");
        path
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
