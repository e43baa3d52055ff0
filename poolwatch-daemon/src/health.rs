//! Health reporting.
//!
//! The orchestrator periodically snapshots the pipeline into a
//! [`DaemonHealth`] report and logs it. Nothing is sent through the
//! alert webhook: failures of the watcher itself are only visible in
//! this process's own logs.

use serde::Serialize;

use poolwatch_core::pipeline::HealthStatus;

/// Health report for the daemon.
#[derive(Debug, Clone, Serialize)]
pub struct DaemonHealth {
    /// Pipeline health status.
    pub status: HealthStatus,
    /// Daemon uptime in seconds since start.
    pub uptime_secs: u64,
    /// Processing counters at the time of the report.
    pub counters: PipelineCounters,
}

/// Counter snapshot taken from the log pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineCounters {
    /// Records parsed and analyzed.
    pub processed: u64,
    /// Lines skipped because they failed to parse.
    pub parse_errors: u64,
    /// Alerts delivered to the webhook.
    pub alerts_sent: u64,
    /// Alerts dropped by maintenance mode or cooldown.
    pub alerts_suppressed: u64,
    /// Alerts whose delivery failed.
    pub alerts_failed: u64,
}

impl DaemonHealth {
    /// Emit the report at a level matching its status.
    pub fn log(&self) {
        let c = &self.counters;
        match &self.status {
            HealthStatus::Healthy => tracing::info!(
                uptime_secs = self.uptime_secs,
                processed = c.processed,
                parse_errors = c.parse_errors,
                alerts_sent = c.alerts_sent,
                alerts_suppressed = c.alerts_suppressed,
                alerts_failed = c.alerts_failed,
                "health: ok"
            ),
            HealthStatus::Degraded(reason) => tracing::warn!(
                uptime_secs = self.uptime_secs,
                reason = %reason,
                alerts_failed = c.alerts_failed,
                "health: degraded"
            ),
            HealthStatus::Unhealthy(reason) => tracing::error!(
                uptime_secs = self.uptime_secs,
                reason = %reason,
                "health: unhealthy"
            ),
        }
    }
}
