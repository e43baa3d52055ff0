//! Invalid configuration is rejected before anything starts.

use poolwatch_core::config::PoolwatchConfig;
use poolwatch_daemon::orchestrator::Orchestrator;

use crate::helpers::config::TestConfigBuilder;

fn assert_rejected(config: PoolwatchConfig, needle: &str) {
    let err = match Orchestrator::build_from_config(config) {
        Ok(_) => panic!("config should be rejected"),
        Err(e) => e.to_string(),
    };
    assert!(err.contains(needle), "unexpected error: {err}");
}

#[tokio::test]
async fn test_e2e_missing_webhook_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = TestConfigBuilder::new(dir.path(), "").build();
    assert_rejected(config, "webhook_url");
}

#[tokio::test]
async fn test_e2e_non_http_webhook_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = TestConfigBuilder::new(dir.path(), "ftp://example.com/hook").build();
    assert_rejected(config, "webhook_url");
}

#[tokio::test]
async fn test_e2e_zero_window_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = TestConfigBuilder::new(dir.path(), "https://hooks.example.com/x")
        .window_size(0)
        .build();
    assert_rejected(config, "window_size");
}

#[tokio::test]
async fn test_e2e_threshold_out_of_range_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = TestConfigBuilder::new(dir.path(), "https://hooks.example.com/x")
        .threshold(150.0)
        .build();
    assert_rejected(config, "error_rate_threshold");
}
