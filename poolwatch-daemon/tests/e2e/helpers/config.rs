//! Test configuration builder for E2E tests.
//!
//! Provides [`TestConfigBuilder`] for creating `PoolwatchConfig` instances
//! whose files all live in one temporary directory.

use std::path::{Path, PathBuf};

use poolwatch_core::config::PoolwatchConfig;

/// Builder for constructing test-friendly `PoolwatchConfig` instances.
///
/// Defaults: fast polling, reading from the beginning of the file, a small
/// open retry budget and metrics disabled.
#[allow(dead_code)]
pub struct TestConfigBuilder {
    config: PoolwatchConfig,
}

#[allow(dead_code)]
impl TestConfigBuilder {
    /// Create a builder rooted at `dir` posting to `webhook_url`.
    pub fn new(dir: &Path, webhook_url: &str) -> Self {
        let mut config = PoolwatchConfig::default();
        config.general.log_format = "pretty".to_owned();
        config.watcher.log_file = path_str(&dir.join("access.log"));
        config.watcher.poll_interval_ms = 10;
        config.watcher.start_from = "beginning".to_owned();
        config.watcher.max_open_retries = 20;
        config.watcher.initial_backoff_ms = 10;
        config.watcher.max_backoff_ms = 50;
        config.alert.webhook_url = webhook_url.to_owned();
        config.alert.request_timeout_secs = 2;
        config.alert.maintenance_flag_file = path_str(&dir.join("maintenance.flag"));
        config.breach_store.path = path_str(&dir.join("breaches.log"));
        config.metrics.enabled = false;
        Self { config }
    }

    pub fn window_size(mut self, size: usize) -> Self {
        self.config.watcher.window_size = size;
        self
    }

    pub fn threshold(mut self, threshold: f64) -> Self {
        self.config.watcher.error_rate_threshold = threshold;
        self
    }

    pub fn cooldown_secs(mut self, secs: u64) -> Self {
        self.config.alert.cooldown_secs = secs;
        self
    }

    pub fn maintenance_mode(mut self, enabled: bool) -> Self {
        self.config.alert.maintenance_mode = enabled;
        self
    }

    pub fn max_open_retries(mut self, retries: u32) -> Self {
        self.config.watcher.max_open_retries = retries;
        self
    }

    pub fn build(self) -> PoolwatchConfig {
        self.config
    }
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Paths derived from a test directory.
#[allow(dead_code)]
pub fn log_path(dir: &Path) -> PathBuf {
    dir.join("access.log")
}

#[allow(dead_code)]
pub fn flag_path(dir: &Path) -> PathBuf {
    dir.join("maintenance.flag")
}

#[allow(dead_code)]
pub fn breach_path(dir: &Path) -> PathBuf {
    dir.join("breaches.log")
}
