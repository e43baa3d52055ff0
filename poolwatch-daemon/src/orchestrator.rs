//! Daemon orchestration -- assembly and lifecycle management.
//!
//! The [`Orchestrator`] loads and validates configuration, builds the log
//! pipeline with a webhook notifier, starts it, and waits until either a
//! shutdown signal arrives or the pipeline hits an unrecoverable error.
//!
//! # Shutdown
//!
//! 1. Cancel the tailer (no new lines are read)
//! 2. Drain lines already queued for processing
//! 3. Return; a fatal pipeline error makes `run` return `Err`

use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Result;

use poolwatch_core::config::PoolwatchConfig;
use poolwatch_core::metrics as m;
use poolwatch_core::pipeline::Pipeline;
use poolwatch_log_pipeline::{LogPipeline, LogPipelineBuilder, PipelineConfig, WebhookNotifier};

use crate::health::{DaemonHealth, PipelineCounters};
use crate::metrics_server;

/// Interval between periodic health reports.
const HEALTH_REPORT_INTERVAL: Duration = Duration::from_secs(60);

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: PoolwatchConfig,
    /// The log pipeline (tailer + processing task).
    pipeline: LogPipeline<WebhookNotifier>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
    /// Interval between health reports.
    health_interval: Duration,
}

impl Orchestrator {
    /// Load configuration and build the orchestrator.
    ///
    /// A missing config file falls back to defaults; environment overrides
    /// are applied before validation.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed, validation fails
    /// (for example no webhook URL), or the pipeline cannot be built.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = PoolwatchConfig::load_or_default(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config)
    }

    /// Build from an already-loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails or the pipeline cannot be built.
    pub fn build_from_config(config: PoolwatchConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
        }

        let pipeline_config = PipelineConfig::from_core(&config);
        let notifier = WebhookNotifier::new(
            pipeline_config.webhook_url.clone(),
            pipeline_config.request_timeout(),
        )
        .map_err(|e| anyhow::anyhow!("failed to create webhook notifier: {}", e))?;

        tracing::info!(
            log_file = %pipeline_config.log_file.display(),
            window_size = pipeline_config.window_size,
            min_samples = pipeline_config.min_samples,
            error_rate_threshold = pipeline_config.error_rate_threshold,
            cooldown_secs = pipeline_config.cooldown_secs,
            maintenance_mode = pipeline_config.maintenance_mode,
            "initializing log pipeline"
        );

        let pipeline = LogPipelineBuilder::new()
            .config(pipeline_config)
            .notifier(notifier)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build log pipeline: {}", e))?;

        Ok(Self {
            config,
            pipeline,
            start_time: Instant::now(),
            health_interval: HEALTH_REPORT_INTERVAL,
        })
    }

    /// Override the health report interval.
    pub fn with_health_interval(mut self, interval: Duration) -> Self {
        self.health_interval = interval;
        self
    }

    /// Start the pipeline and block until `SIGTERM` or `SIGINT`.
    ///
    /// # Errors
    ///
    /// Returns an error if signal handlers cannot be installed, the pipeline
    /// fails to start, or the pipeline stops on an unrecoverable error.
    pub async fn run(&mut self) -> Result<()> {
        let shutdown = shutdown_signal()?;
        self.run_until(shutdown).await
    }

    /// Start the pipeline and block until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns an error if the pipeline fails to start or stops on an
    /// unrecoverable error (for example the log file never appeared).
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = &'static str>,
    {
        self.pipeline
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("failed to start log pipeline: {}", e))?;

        let failure = self.pipeline.failure_token();
        tokio::pin!(shutdown);

        let mut health_tick = tokio::time::interval(self.health_interval);
        health_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // first tick fires immediately
        health_tick.tick().await;

        tracing::info!("poolwatch-daemon running");
        let fatal = loop {
            tokio::select! {
                signal = &mut shutdown => {
                    tracing::info!(signal = signal, "shutdown signal received");
                    break None;
                }
                _ = failure.cancelled() => {
                    break Some(
                        self.pipeline
                            .fatal_error()
                            .unwrap_or("unknown error")
                            .to_owned(),
                    );
                }
                _ = health_tick.tick() => {
                    self.health().await.log();
                }
            }
        };

        if let Err(e) = self.pipeline.stop().await {
            tracing::error!(error = %e, "failed to stop log pipeline");
        }
        self.health().await.log();

        match fatal {
            None => Ok(()),
            Some(reason) => Err(anyhow::anyhow!("log pipeline failed: {}", reason)),
        }
    }

    /// Snapshot the current health of the daemon.
    pub async fn health(&self) -> DaemonHealth {
        let uptime_secs = self.start_time.elapsed().as_secs();
        if self.config.metrics.enabled {
            #[allow(clippy::cast_precision_loss)]
            metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(uptime_secs as f64);
        }

        DaemonHealth {
            status: self.pipeline.health_check().await,
            uptime_secs,
            counters: PipelineCounters {
                processed: self.pipeline.processed_count(),
                parse_errors: self.pipeline.parse_error_count(),
                alerts_sent: self.pipeline.alerts_sent_count(),
                alerts_suppressed: self.pipeline.alerts_suppressed_count(),
                alerts_failed: self.pipeline.alerts_failed_count(),
            },
        }
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &PoolwatchConfig {
        &self.config
    }
}

/// Install `SIGTERM`/`SIGINT` handlers and return a future that resolves
/// with the name of the first signal received.
///
/// # Errors
///
/// Returns an error if signal handlers cannot be installed.
fn shutdown_signal() -> Result<impl Future<Output = &'static str>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        }
    })
}
