//! Maintenance mode suppresses webhook posts without stopping analysis.

use std::time::Duration;

use poolwatch_log_pipeline::{BreachStore, MaintenanceGate};

use crate::helpers::access_log::{append, line, lines};
use crate::helpers::config::{TestConfigBuilder, breach_path, flag_path, log_path};
use crate::helpers::daemon::{RunningDaemon, settle};
use crate::helpers::webhook::WebhookCapture;

#[tokio::test]
async fn test_e2e_sentinel_suppresses_failover() {
    let dir = tempfile::tempdir().unwrap();
    let mut hook = WebhookCapture::start().await;
    let gate = MaintenanceGate::new(false, flag_path(dir.path()));
    gate.enable(Some("planned switch")).await.unwrap();

    append(&log_path(dir.path()), &lines("blue", &[200, 200]));
    let daemon = RunningDaemon::spawn(TestConfigBuilder::new(dir.path(), hook.url()).build());
    append(&log_path(dir.path()), &[line("green", 200)]);
    settle().await;

    let (orchestrator, result) = daemon.shutdown().await;
    result.unwrap();
    assert!(hook.drain().is_empty());
    let counters = orchestrator.health().await.counters;
    assert_eq!(counters.processed, 3);
    assert_eq!(counters.alerts_suppressed, 1);
    assert_eq!(counters.alerts_sent, 0);
}

#[tokio::test]
async fn test_e2e_removing_sentinel_resumes_alerts_without_restart() {
    let dir = tempfile::tempdir().unwrap();
    let mut hook = WebhookCapture::start().await;
    let gate = MaintenanceGate::new(false, flag_path(dir.path()));
    gate.enable(None).await.unwrap();

    append(&log_path(dir.path()), &lines("blue", &[200, 200]));
    let daemon = RunningDaemon::spawn(TestConfigBuilder::new(dir.path(), hook.url()).build());
    append(&log_path(dir.path()), &[line("green", 200)]);
    settle().await;
    assert!(hook.drain().is_empty());

    gate.disable().await.unwrap();
    append(&log_path(dir.path()), &[line("blue", 200)]);
    let body = hook
        .next(Duration::from_secs(5))
        .await
        .expect("recovery after maintenance ends");
    assert_eq!(body["kind"], "recovery");

    daemon.shutdown().await.1.unwrap();
}

#[tokio::test]
async fn test_e2e_static_maintenance_still_records_breaches() {
    let dir = tempfile::tempdir().unwrap();
    let mut hook = WebhookCapture::start().await;
    append(&log_path(dir.path()), &lines("blue", &[500; 5]));

    let config = TestConfigBuilder::new(dir.path(), hook.url())
        .window_size(5)
        .threshold(50.0)
        .maintenance_mode(true)
        .build();
    let daemon = RunningDaemon::spawn(config);
    settle().await;
    daemon.shutdown().await.1.unwrap();

    assert!(hook.drain().is_empty());
    let records = BreachStore::new(breach_path(dir.path()))
        .list()
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].error_rate, 100.0);
}
