//! CLI argument definitions for poolwatch-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use poolwatch_core::config::{DEFAULT_CONFIG_PATH, PoolwatchConfig};

/// poolwatch alerting daemon.
///
/// Tails the reverse proxy access log, detects pool failover, elevated
/// error rates and recovery, and posts alerts to a webhook.
#[derive(Parser, Debug)]
#[command(name = "poolwatch-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to poolwatch.toml configuration file.
    ///
    /// A missing file is not an error: defaults and environment variables apply.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Override the access log file to watch.
    #[arg(long)]
    pub log_file: Option<String>,

    /// Validate configuration and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,
}

impl DaemonCli {
    /// Apply command-line overrides on top of file and environment values.
    pub fn apply_overrides(&self, config: &mut PoolwatchConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level.clone_from(level);
        }
        if let Some(format) = &self.log_format {
            config.general.log_format.clone_from(format);
        }
        if let Some(log_file) = &self.log_file {
            config.watcher.log_file.clone_from(log_file);
        }
    }
}
