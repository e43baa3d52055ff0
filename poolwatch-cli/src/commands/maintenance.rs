//! `poolwatch maintenance` command handler

use std::io::Write;

use serde::Serialize;

use poolwatch_core::config::PoolwatchConfig;
use poolwatch_log_pipeline::MaintenanceGate;

use crate::cli::{MaintenanceAction, MaintenanceArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `maintenance` command.
pub async fn execute(
    args: MaintenanceArgs,
    config: &PoolwatchConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let gate = MaintenanceGate::new(
        config.alert.maintenance_mode,
        &config.alert.maintenance_flag_file,
    );

    let report = match args.action {
        MaintenanceAction::On { reason } => {
            gate.enable(reason.as_deref()).await?;
            status(&gate).await
        }
        MaintenanceAction::Off => {
            gate.disable().await?;
            status(&gate).await
        }
        MaintenanceAction::Status => status(&gate).await,
    };

    writer.render(&report)
}

/// Inspect the gate and the sentinel file contents.
pub async fn status(gate: &MaintenanceGate) -> MaintenanceReport {
    let sentinel_present = gate.sentinel_present().await;
    let (enabled_at, reason) = if sentinel_present {
        match tokio::fs::read_to_string(gate.sentinel_path()).await {
            Ok(content) => sentinel_fields(&content),
            Err(_) => (None, None),
        }
    } else {
        (None, None)
    };

    MaintenanceReport {
        active: gate.static_flag() || sentinel_present,
        static_flag: gate.static_flag(),
        sentinel_present,
        sentinel_path: gate.sentinel_path().display().to_string(),
        enabled_at,
        reason,
    }
}

/// Pull `enabled_at` and `reason` out of a sentinel file.
///
/// An empty or hand-made sentinel is valid; missing keys stay `None`.
fn sentinel_fields(content: &str) -> (Option<String>, Option<String>) {
    let mut enabled_at = None;
    let mut reason = None;
    for line in content.lines() {
        match line.split_once('=') {
            Some(("enabled_at", v)) if !v.trim().is_empty() => enabled_at = Some(v.trim().to_owned()),
            Some(("reason", v)) if !matches!(v.trim(), "" | "-") => reason = Some(v.trim().to_owned()),
            _ => {}
        }
    }
    (enabled_at, reason)
}

/// Maintenance mode status.
#[derive(Debug, Serialize)]
pub struct MaintenanceReport {
    /// Whether alerts are currently suppressed
    pub active: bool,
    /// `[alert] maintenance_mode` from the configuration
    pub static_flag: bool,
    /// Whether the sentinel file exists
    pub sentinel_present: bool,
    /// Sentinel file path
    pub sentinel_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Render for MaintenanceReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        let state = if self.active {
            "ON (alerts suppressed)".yellow().bold()
        } else {
            "OFF".green().bold()
        };
        writeln!(w, "Maintenance mode: {}", state)?;
        writeln!(
            w,
            "  Sentinel: {} ({})",
            self.sentinel_path,
            if self.sentinel_present { "present" } else { "absent" }
        )?;
        if let Some(at) = &self.enabled_at {
            writeln!(w, "  Enabled at: {}", at)?;
        }
        if let Some(reason) = &self.reason {
            writeln!(w, "  Reason: {}", reason)?;
        }
        if self.static_flag {
            writeln!(
                w,
                "  {}",
                "maintenance_mode = true in config; alerts stay suppressed until the daemon restarts with it off"
                    .yellow()
            )?;
        }
        Ok(())
    }
}
