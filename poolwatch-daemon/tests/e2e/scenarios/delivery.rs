//! Webhook delivery failures and cooldown.

use std::time::Duration;

use poolwatch_core::pipeline::HealthStatus;

use crate::helpers::access_log::{append, line};
use crate::helpers::config::{TestConfigBuilder, log_path};
use crate::helpers::daemon::{RunningDaemon, settle};
use crate::helpers::webhook::WebhookCapture;

#[tokio::test]
async fn test_e2e_rejected_post_is_not_retried_and_daemon_keeps_running() {
    let dir = tempfile::tempdir().unwrap();
    let mut hook = WebhookCapture::with_status(500).await;
    append(
        &log_path(dir.path()),
        &[line("blue", 200), line("green", 200)],
    );

    let daemon = RunningDaemon::spawn(TestConfigBuilder::new(dir.path(), hook.url()).build());
    assert!(hook.next(Duration::from_secs(5)).await.is_some());

    // cooldown is stamped even though delivery failed
    append(
        &log_path(dir.path()),
        &[line("blue", 200), line("green", 200)],
    );
    settle().await;

    let (orchestrator, result) = daemon.shutdown().await;
    result.unwrap();

    // failover attempted once, recovery attempted once, second failover in cooldown
    assert_eq!(hook.drain().len(), 1);
    let health = orchestrator.health().await;
    assert_eq!(health.counters.alerts_failed, 2);
    assert_eq!(health.counters.alerts_suppressed, 1);
    assert_eq!(health.counters.alerts_sent, 0);
    assert_eq!(health.counters.processed, 4);
    assert!(matches!(health.status, HealthStatus::Unhealthy(_)));
}

#[tokio::test]
async fn test_e2e_each_kind_has_its_own_cooldown() {
    let dir = tempfile::tempdir().unwrap();
    let mut hook = WebhookCapture::start().await;
    let pools = ["blue", "green", "blue", "green", "blue"];
    append(
        &log_path(dir.path()),
        &pools.iter().map(|p| line(p, 200)).collect::<Vec<_>>(),
    );

    let daemon = RunningDaemon::spawn(TestConfigBuilder::new(dir.path(), hook.url()).build());
    settle().await;
    daemon.shutdown().await.1.unwrap();

    let kinds: Vec<String> = hook
        .drain()
        .iter()
        .map(|b| b["kind"].as_str().unwrap_or_default().to_owned())
        .collect();
    assert_eq!(kinds, vec!["failover", "recovery"]);
}
