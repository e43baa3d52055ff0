//! Graceful shutdown and fatal tailer errors.

use std::time::Duration;

use poolwatch_core::pipeline::HealthStatus;

use crate::helpers::access_log::{append, lines};
use crate::helpers::config::{TestConfigBuilder, log_path};
use crate::helpers::daemon::{RunningDaemon, settle};
use crate::helpers::webhook::WebhookCapture;

#[tokio::test]
async fn test_e2e_shutdown_returns_ok_and_stops_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let hook = WebhookCapture::start().await;
    append(&log_path(dir.path()), &lines("blue", &[200; 10]));

    let daemon = RunningDaemon::spawn(TestConfigBuilder::new(dir.path(), hook.url()).build());
    settle().await;
    let (orchestrator, result) = daemon.shutdown().await;

    result.unwrap();
    let health = orchestrator.health().await;
    assert_eq!(health.counters.processed, 10);
    assert_eq!(health.status, HealthStatus::Unhealthy("stopped".to_owned()));
}

#[tokio::test]
async fn test_e2e_lines_written_after_shutdown_are_not_read() {
    let dir = tempfile::tempdir().unwrap();
    let hook = WebhookCapture::start().await;
    append(&log_path(dir.path()), &lines("blue", &[200; 3]));

    let daemon = RunningDaemon::spawn(TestConfigBuilder::new(dir.path(), hook.url()).build());
    settle().await;
    let (orchestrator, result) = daemon.shutdown().await;
    result.unwrap();

    append(&log_path(dir.path()), &lines("green", &[200; 3]));
    settle().await;
    assert_eq!(orchestrator.health().await.counters.processed, 3);
}

#[tokio::test]
async fn test_e2e_missing_log_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let hook = WebhookCapture::start().await;

    let config = TestConfigBuilder::new(dir.path(), hook.url())
        .max_open_retries(3)
        .build();
    let daemon = RunningDaemon::spawn(config);
    let (orchestrator, result) = daemon.join(Duration::from_secs(5)).await;

    let err = result.expect_err("missing log file should stop the daemon");
    assert!(err.to_string().contains("log pipeline failed"));
    assert!(matches!(
        orchestrator.health().await.status,
        HealthStatus::Unhealthy(_)
    ));
}

#[tokio::test]
async fn test_e2e_log_file_created_late_is_picked_up() {
    let dir = tempfile::tempdir().unwrap();
    let hook = WebhookCapture::start().await;

    let daemon = RunningDaemon::spawn(TestConfigBuilder::new(dir.path(), hook.url()).build());
    tokio::time::sleep(Duration::from_millis(50)).await;
    append(&log_path(dir.path()), &lines("blue", &[200; 4]));
    settle().await;

    let (orchestrator, result) = daemon.shutdown().await;
    result.unwrap();
    assert_eq!(orchestrator.health().await.counters.processed, 4);
}
