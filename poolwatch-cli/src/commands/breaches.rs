//! `poolwatch breaches` command handler

use std::io::Write;

use serde::Serialize;
use tracing::info;

use poolwatch_core::config::PoolwatchConfig;
use poolwatch_core::types::BreachRecord;
use poolwatch_log_pipeline::{BreachStats, BreachStore};

use crate::cli::{BreachesAction, BreachesArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render, percent};

/// Execute the `breaches` command.
pub async fn execute(
    args: BreachesArgs,
    config: &PoolwatchConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let store = BreachStore::new(&config.breach_store.path);
    match args.action {
        BreachesAction::List { limit, pool } => {
            let report = list(&store, limit, pool).await?;
            writer.render(&report)
        }
        BreachesAction::Stats { pool } => {
            let report = stats(&store, pool).await?;
            writer.render(&report)
        }
        BreachesAction::Clear => {
            let report = clear(&store).await?;
            writer.render(&report)
        }
    }
}

/// Collect breaches, optionally filtered by pool and limited to the most recent `limit`.
pub async fn list(
    store: &BreachStore,
    limit: Option<usize>,
    pool: Option<String>,
) -> Result<BreachListReport, CliError> {
    let mut records = match pool.as_deref() {
        Some(pool) => store.by_pool(pool).await?,
        None => store.list().await?,
    };
    let matched = records.len();
    if let Some(k) = limit {
        let skip = records.len().saturating_sub(k);
        records.drain(..skip);
    }

    Ok(BreachListReport {
        source: store.path().display().to_string(),
        pool,
        matched,
        records,
    })
}

/// Aggregate breach error rates.
pub async fn stats(store: &BreachStore, pool: Option<String>) -> Result<BreachStatsReport, CliError> {
    let stats = store.stats(pool.as_deref()).await?;
    Ok(BreachStatsReport {
        source: store.path().display().to_string(),
        pool,
        stats,
    })
}

/// Remove every breach and report how many were dropped.
pub async fn clear(store: &BreachStore) -> Result<BreachClearReport, CliError> {
    let removed = store.list().await?.len();
    store.clear().await?;
    info!(path = %store.path().display(), removed, "breach history cleared");
    Ok(BreachClearReport {
        source: store.path().display().to_string(),
        removed,
    })
}

/// Breach listing.
#[derive(Serialize)]
pub struct BreachListReport {
    /// Breach store path
    pub source: String,
    /// Pool filter, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<String>,
    /// Records matching the pool filter before the limit was applied
    pub matched: usize,
    /// Records shown, oldest first
    pub records: Vec<BreachRecord>,
}

impl Render for BreachListReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if self.records.is_empty() {
            writeln!(w, "No breaches recorded ({})", self.source)?;
            return Ok(());
        }

        writeln!(
            w,
            "Error-rate breaches ({} of {} shown, source: {})",
            self.records.len().to_string().bold(),
            self.matched,
            self.source
        )?;
        writeln!(w)?;
        writeln!(
            w,
            "{:<26} {:<10} {:>9} {:>14} {:>10}",
            "Timestamp", "Pool", "Rate", "Errors/Total", "Threshold"
        )?;
        writeln!(w, "{}", "-".repeat(73))?;

        for r in &self.records {
            let rate = format!("{:.2}%", r.error_rate);
            writeln!(
                w,
                "{:<26} {:<10} {:>9} {:>14} {:>10}",
                r.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
                r.pool,
                rate.red(),
                format!("{}/{}", r.error_count, r.total_count),
                format!("{:.2}%", r.threshold)
            )?;
        }

        Ok(())
    }
}

/// Breach aggregate.
#[derive(Serialize)]
pub struct BreachStatsReport {
    /// Breach store path
    pub source: String,
    /// Pool filter, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<String>,
    #[serde(flatten)]
    pub stats: BreachStats,
}

impl Render for BreachStatsReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        match &self.pool {
            Some(pool) => writeln!(w, "Breach statistics for pool {}", pool.bold())?,
            None => writeln!(w, "Breach statistics (all pools)")?,
        }
        writeln!(w, "  Source: {}", self.source)?;
        writeln!(w, "  Count:  {}", self.stats.count.to_string().bold())?;
        if self.stats.count == 0 {
            return Ok(());
        }
        writeln!(w, "  Min:    {}", percent(self.stats.min))?;
        writeln!(w, "  Mean:   {}", percent(self.stats.mean))?;
        writeln!(w, "  Max:    {}", percent(self.stats.max).red())?;
        Ok(())
    }
}

/// Result of `breaches clear`.
#[derive(Serialize)]
pub struct BreachClearReport {
    /// Breach store path
    pub source: String,
    /// Records removed
    pub removed: usize,
}

impl Render for BreachClearReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "{} Cleared {} breach record(s) from {}",
            "✓".green(),
            self.removed,
            self.source
        )
    }
}
