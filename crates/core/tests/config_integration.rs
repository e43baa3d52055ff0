//! poolwatch.toml 통합 설정 테스트
//!
//! - poolwatch.toml.example 파싱 테스트
//! - 부분 설정 (일부 섹션만) 로딩 테스트
//! - 환경변수 우선순위 테스트
//! - 빈 파일 / 잘못된 형식 에러 테스트

use poolwatch_core::config::PoolwatchConfig;
use poolwatch_core::error::{ConfigError, PoolwatchError};
use serial_test::serial;

const EXAMPLE: &str = include_str!("../../../poolwatch.toml.example");

const ENV_KEYS: [&str; 12] = [
    "SLACK_WEBHOOK_URL",
    "WEBHOOK_URL",
    "WINDOW_SIZE",
    "MIN_SAMPLES",
    "ERROR_RATE_THRESHOLD",
    "ALERT_COOLDOWN_SEC",
    "MAINTENANCE_MODE",
    "LOG_FILE",
    "MAINTENANCE_FLAG_FILE",
    "BREACH_LOG_FILE",
    "POOLWATCH_LOG_LEVEL",
    "POOLWATCH_POOLS",
];

fn clear_env() {
    for key in ENV_KEYS {
        // SAFETY: 모든 환경변수 테스트는 #[serial]로 실행됩니다.
        unsafe { std::env::remove_var(key) };
    }
}

// =============================================================================
// poolwatch.toml.example 파싱 테스트
// =============================================================================

#[test]
fn example_config_parses_successfully() {
    let config = PoolwatchConfig::parse(EXAMPLE).expect("example config should parse");

    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.general.log_format, "json");
    assert_eq!(config.watcher.log_file, "/var/log/nginx/access.log");
    assert_eq!(config.watcher.pools, vec!["blue", "green"]);
}

#[test]
fn example_config_passes_validation() {
    let config = PoolwatchConfig::parse(EXAMPLE).expect("should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[test]
fn example_config_matches_defaults() {
    let config = PoolwatchConfig::parse(EXAMPLE).expect("should parse");
    let defaults = PoolwatchConfig::default();

    assert_eq!(config.watcher.window_size, defaults.watcher.window_size);
    assert_eq!(config.watcher.min_samples, None);
    assert_eq!(
        config.watcher.error_rate_threshold,
        defaults.watcher.error_rate_threshold
    );
    assert_eq!(config.watcher.max_backoff_ms, defaults.watcher.max_backoff_ms);
    assert_eq!(config.alert.cooldown_secs, defaults.alert.cooldown_secs);
    assert_eq!(
        config.alert.maintenance_flag_file,
        defaults.alert.maintenance_flag_file
    );
    assert_eq!(config.breach_store.path, defaults.breach_store.path);
    assert_eq!(config.metrics.port, defaults.metrics.port);
}

// =============================================================================
// 부분 설정 / 에러
// =============================================================================

#[test]
fn only_alert_section_keeps_other_defaults() {
    let config = PoolwatchConfig::parse(
        r#"
[alert]
webhook_url = "http://localhost:8080/hook"
cooldown_secs = 5
"#,
    )
    .expect("should parse");

    assert_eq!(config.alert.cooldown_secs, 5);
    assert_eq!(config.watcher.window_size, 200);
    config.validate().expect("partial config should validate");
}

#[test]
fn wrong_type_is_parse_error() {
    let err = PoolwatchConfig::parse("[watcher]\nwindow_size = \"big\"").unwrap_err();
    assert!(matches!(
        err,
        PoolwatchError::Config(ConfigError::ParseFailed { .. })
    ));
}

#[test]
fn empty_file_is_defaults() {
    let config = PoolwatchConfig::parse("").expect("empty should parse");
    assert_eq!(config.alert.request_timeout_secs, 10);
}

// =============================================================================
// 파일 로딩 + 환경변수 우선순위
// =============================================================================

#[tokio::test]
#[serial]
async fn env_overrides_file_values() {
    clear_env();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("poolwatch.toml");
    tokio::fs::write(&path, EXAMPLE).await.expect("write config");

    // SAFETY: #[serial] 테스트
    unsafe {
        std::env::set_var("WINDOW_SIZE", "50");
        std::env::set_var("MIN_SAMPLES", "20");
        std::env::set_var("ERROR_RATE_THRESHOLD", "5.5");
        std::env::set_var("ALERT_COOLDOWN_SEC", "30");
        std::env::set_var("MAINTENANCE_MODE", "true");
        std::env::set_var("BREACH_LOG_FILE", "/tmp/breaches.jsonl");
    }

    let config = PoolwatchConfig::load(&path).await.expect("load");
    assert_eq!(config.watcher.window_size, 50);
    assert_eq!(config.watcher.effective_min_samples(), 20);
    assert_eq!(config.watcher.error_rate_threshold, 5.5);
    assert_eq!(config.alert.cooldown_secs, 30);
    assert!(config.alert.maintenance_mode);
    assert_eq!(config.breach_store.path, "/tmp/breaches.jsonl");

    clear_env();
}

#[tokio::test]
#[serial]
async fn invalid_env_number_is_rejected() {
    clear_env();
    // SAFETY: #[serial] 테스트
    unsafe { std::env::set_var("WINDOW_SIZE", "lots") };

    let err = PoolwatchConfig::load_or_default("/nonexistent/poolwatch.toml")
        .await
        .unwrap_err();
    clear_env();

    assert!(matches!(
        err,
        PoolwatchError::Config(ConfigError::InvalidValue { ref field, .. }) if field == "WINDOW_SIZE"
    ));
    assert!(err.to_string().contains("lots"));
}

#[tokio::test]
#[serial]
async fn env_window_size_is_validated() {
    clear_env();
    // SAFETY: #[serial] 테스트
    unsafe {
        std::env::set_var("SLACK_WEBHOOK_URL", "https://hooks.slack.com/services/X");
        std::env::set_var("WINDOW_SIZE", "0");
    }

    let err = PoolwatchConfig::load("/nonexistent/poolwatch.toml")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("window_size"));

    clear_env();
}

#[tokio::test]
#[serial]
async fn missing_file_without_webhook_fails_daemon_validation() {
    clear_env();
    let err = PoolwatchConfig::load("/nonexistent/poolwatch.toml")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("webhook_url"));
}

#[tokio::test]
#[serial]
async fn pools_env_is_csv() {
    clear_env();
    // SAFETY: #[serial] 테스트
    unsafe { std::env::set_var("POOLWATCH_POOLS", "primary,standby") };

    let config = PoolwatchConfig::load_or_default("/nonexistent/poolwatch.toml")
        .await
        .expect("load");
    assert_eq!(config.watcher.pools, vec!["primary", "standby"]);

    clear_env();
}
