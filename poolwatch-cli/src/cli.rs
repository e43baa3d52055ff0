//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use poolwatch_core::config::DEFAULT_CONFIG_PATH;

/// poolwatch -- operator tool for the failover and error-rate alerter.
///
/// Use `poolwatch <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "poolwatch", version, about, long_about = None)]
pub struct Cli {
    /// Path to the poolwatch.toml configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table / text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inspect or clear the error-rate breach history.
    Breaches(BreachesArgs),

    /// Toggle maintenance mode (suppresses webhook alerts).
    Maintenance(MaintenanceArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- breaches ----

/// Inspect or clear the error-rate breach history.
#[derive(Args, Debug)]
pub struct BreachesArgs {
    #[command(subcommand)]
    pub action: BreachesAction,
}

#[derive(Subcommand, Debug)]
pub enum BreachesAction {
    /// List recorded breaches, oldest first.
    List {
        /// Show only the most recent N breaches.
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Only breaches recorded for this pool (case-insensitive).
        #[arg(long)]
        pool: Option<String>,
    },
    /// Summarise breach count and min / mean / max error rate.
    Stats {
        /// Only breaches recorded for this pool (case-insensitive).
        #[arg(long)]
        pool: Option<String>,
    },
    /// Remove every recorded breach.
    Clear,
}

// ---- maintenance ----

/// Toggle maintenance mode.
#[derive(Args, Debug)]
pub struct MaintenanceArgs {
    #[command(subcommand)]
    pub action: MaintenanceAction,
}

#[derive(Subcommand, Debug)]
pub enum MaintenanceAction {
    /// Create the sentinel file; alerts are suppressed until it is removed.
    On {
        /// Free-form reason stored in the sentinel file.
        #[arg(long)]
        reason: Option<String>,
    },
    /// Remove the sentinel file.
    Off,
    /// Show whether maintenance mode is active.
    Status,
}

// ---- config ----

/// Manage poolwatch configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration as the daemon would and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, watcher, alert, breach_store, metrics).
        #[arg(long)]
        section: Option<String>,
    },
}
