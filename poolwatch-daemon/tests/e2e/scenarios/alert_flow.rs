//! Access log lines flow through the daemon to webhook posts.

use std::time::Duration;

use poolwatch_log_pipeline::BreachStore;

use crate::helpers::access_log::{append, line, lines};
use crate::helpers::config::{TestConfigBuilder, breach_path, log_path};
use crate::helpers::daemon::RunningDaemon;
use crate::helpers::webhook::WebhookCapture;

const WAIT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_e2e_failover_posts_slack_payload() {
    let dir = tempfile::tempdir().unwrap();
    let mut hook = WebhookCapture::start().await;
    append(&log_path(dir.path()), &lines("blue", &[200, 200]));

    let config = TestConfigBuilder::new(dir.path(), hook.url()).build();
    let daemon = RunningDaemon::spawn(config);

    append(&log_path(dir.path()), &[line("green", 200)]);
    let body = hook.next(WAIT).await.expect("failover should be posted");

    assert_eq!(body["kind"], "failover");
    assert_eq!(body["from_pool"], "blue");
    assert_eq!(body["to_pool"], "green");
    assert_eq!(body["release"], "green-v2.3.1");
    assert!(body["text"].as_str().unwrap().contains("GREEN"));
    assert_eq!(body["blocks"][0]["type"], "header");
    assert_eq!(body["blocks"][0]["text"]["text"], "🔄 FAILOVER DETECTED");

    let (orchestrator, result) = daemon.shutdown().await;
    result.unwrap();
    let health = orchestrator.health().await;
    assert_eq!(health.counters.processed, 3);
    assert_eq!(health.counters.alerts_sent, 1);
}

#[tokio::test]
async fn test_e2e_failover_then_recovery() {
    let dir = tempfile::tempdir().unwrap();
    let mut hook = WebhookCapture::start().await;
    let pools = ["blue", "blue", "green", "green", "blue"];
    append(
        &log_path(dir.path()),
        &pools.iter().map(|p| line(p, 200)).collect::<Vec<_>>(),
    );

    let daemon = RunningDaemon::spawn(TestConfigBuilder::new(dir.path(), hook.url()).build());

    let first = hook.next(WAIT).await.expect("failover");
    let second = hook.next(WAIT).await.expect("recovery");
    assert_eq!(first["kind"], "failover");
    assert_eq!(second["kind"], "recovery");
    assert_eq!(second["pool"], "blue");
    assert_eq!(second["previous_pool"], "green");

    daemon.shutdown().await.1.unwrap();
}

#[tokio::test]
async fn test_e2e_error_rate_breach_is_posted_and_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let mut hook = WebhookCapture::start().await;
    let mut batch = lines("blue", &[200; 8]);
    batch.extend(lines("blue", &[500, 502]));
    append(&log_path(dir.path()), &batch);

    let config = TestConfigBuilder::new(dir.path(), hook.url())
        .window_size(10)
        .threshold(10.0)
        .build();
    let daemon = RunningDaemon::spawn(config);

    let body = hook.next(WAIT).await.expect("error rate alert");
    assert_eq!(body["kind"], "error_rate");
    assert_eq!(body["rate"], 20.0);
    assert_eq!(body["errors"], 2);
    assert_eq!(body["window_size"], 10);
    assert_eq!(body["blocks"][0]["text"]["text"], "🚨 HIGH ERROR RATE ALERT");

    daemon.shutdown().await.1.unwrap();

    let records = BreachStore::new(breach_path(dir.path()))
        .list()
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].pool, "blue");
    assert_eq!(records[0].error_rate, 20.0);
    assert_eq!(records[0].threshold, 10.0);
}

#[tokio::test]
async fn test_e2e_healthy_traffic_posts_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut hook = WebhookCapture::start().await;
    append(&log_path(dir.path()), &lines("blue", &[200; 50]));

    let config = TestConfigBuilder::new(dir.path(), hook.url())
        .window_size(20)
        .build();
    let daemon = RunningDaemon::spawn(config);

    assert!(hook.next(Duration::from_millis(500)).await.is_none());
    let (orchestrator, result) = daemon.shutdown().await;
    result.unwrap();
    assert_eq!(orchestrator.health().await.counters.processed, 50);
}
