//! `poolwatch config` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use poolwatch_core::config::PoolwatchConfig;

use crate::cli::{ConfigAction, ConfigArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Sections accepted by `config show --section`.
const SECTIONS: [&str; 5] = ["general", "watcher", "alert", "breach_store", "metrics"];

/// Execute the `config` command.
pub async fn execute(
    args: ConfigArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Validate => {
            let report = validate(config_path).await;
            writer.render(&report)?;
            if !report.valid {
                return Err(CliError::Config("configuration is invalid".to_owned()));
            }
            Ok(())
        }
        ConfigAction::Show { section } => {
            let report = show(config_path, section).await?;
            writer.render(&report)
        }
    }
}

/// Load the configuration the way the daemon does and run full validation.
///
/// A missing file is not an error by itself; the defaults are validated
/// (and fail without a webhook URL unless one comes from the environment).
pub async fn validate(config_path: &Path) -> ConfigValidationReport {
    info!(path = %config_path.display(), "validating configuration");

    let file_found = tokio::fs::try_exists(config_path).await.unwrap_or(false);
    let result = match PoolwatchConfig::load_or_default(config_path).await {
        Ok(config) => config.validate(),
        Err(e) => Err(e),
    };

    ConfigValidationReport {
        source: config_path.display().to_string(),
        file_found,
        valid: result.is_ok(),
        errors: result.err().map(|e| e.to_string()).into_iter().collect(),
    }
}

/// Render the effective configuration, optionally a single section.
///
/// # Errors
///
/// Returns `CliError::Config` if the file cannot be parsed and
/// `CliError::Command` for an unknown section name.
pub async fn show(config_path: &Path, section: Option<String>) -> Result<ConfigReport, CliError> {
    let mut config = PoolwatchConfig::load_or_default(config_path).await?;
    config.alert.webhook_url = redact_webhook(&config.alert.webhook_url);

    let value = match section.as_deref() {
        None => serde_json::to_value(&config)?,
        Some("general") => serde_json::to_value(&config.general)?,
        Some("watcher") => serde_json::to_value(&config.watcher)?,
        Some("alert") => serde_json::to_value(&config.alert)?,
        Some("breach_store") => serde_json::to_value(&config.breach_store)?,
        Some("metrics") => serde_json::to_value(&config.metrics)?,
        Some(other) => {
            return Err(CliError::Command(format!(
                "unknown section: {} (expected: {})",
                other,
                SECTIONS.join(", ")
            )));
        }
    };

    let config_toml = toml::to_string_pretty(&value)
        .map_err(|e| CliError::Command(format!("failed to render config as TOML: {e}")))?;

    Ok(ConfigReport {
        source: config_path.display().to_string(),
        section,
        config: value,
        config_toml,
    })
}

/// Hide the secret part of a webhook URL.
///
/// Keeps the scheme and host so operators can tell which endpoint is
/// configured; everything after the host is replaced.
pub fn redact_webhook(url: &str) -> String {
    if url.is_empty() {
        return String::new();
    }
    let Some(scheme_end) = url.find("://") else {
        return "***REDACTED***".to_owned();
    };
    let rest = &url[scheme_end + 3..];
    // userinfo (user:token@host) is secret too
    let rest = rest.rsplit_once('@').map_or(rest, |(_, host)| host);
    let host = rest.split('/').next().unwrap_or_default();
    format!("{}{}/***REDACTED***", &url[..scheme_end + 3], host)
}

/// Configuration display report.
///
/// JSON output carries the structured `config`; text output prints TOML.
#[derive(Serialize)]
pub struct ConfigReport {
    /// Configuration file path
    pub source: String,
    /// Optional section name (None = full config)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Effective configuration with the webhook redacted
    pub config: serde_json::Value,
    #[serde(skip)]
    pub config_toml: String,
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        match &self.section {
            Some(section) => writeln!(
                w,
                "Configuration {} (source: {})",
                format!("[{section}]").bold(),
                self.source
            )?,
            None => writeln!(w, "Configuration (source: {})", self.source.bold())?,
        }
        writeln!(w)?;
        write!(w, "{}", self.config_toml)?;
        Ok(())
    }
}

/// Configuration validation report.
#[derive(Serialize)]
pub struct ConfigValidationReport {
    /// Configuration file path
    pub source: String,
    /// Whether the file exists (defaults are used otherwise)
    pub file_found: bool,
    /// Whether the configuration is valid
    pub valid: bool,
    /// Validation error messages (empty if valid)
    pub errors: Vec<String>,
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Config Validation: {}", self.source.bold())?;
        if !self.file_found {
            writeln!(w, "  {}", "file not found, validated defaults + environment".yellow())?;
        }

        if self.valid {
            writeln!(w, "  Result: {}", "VALID".green().bold())?;
        } else {
            writeln!(w, "  Result: {}", "INVALID".red().bold())?;
            for err in &self.errors {
                writeln!(w, "  Error: {}", err.red())?;
            }
        }

        Ok(())
    }
}
