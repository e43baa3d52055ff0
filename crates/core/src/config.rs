//! poolwatch.toml 로딩, 환경변수 오버라이드, 검증
//!
//! [`PoolwatchConfig`]는 watcher, 알림, breach 저장소, 메트릭 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선, 데몬에서 적용)
//! 2. 환경변수 (`WINDOW_SIZE=500`, `SLACK_WEBHOOK_URL=...` 형식)
//! 3. 설정 파일 (`poolwatch.toml`, 없으면 건너뜀)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), poolwatch_core::error::PoolwatchError> {
//! use poolwatch_core::config::PoolwatchConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드 + 검증
//! let config = PoolwatchConfig::load("poolwatch.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = PoolwatchConfig::parse("[watcher]\nwindow_size = 50")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, PoolwatchError};

/// 기본 설정 파일 경로
pub const DEFAULT_CONFIG_PATH: &str = "poolwatch.toml";

/// 허용되는 최대 윈도우 크기
pub const MAX_WINDOW_SIZE: usize = 100_000;

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const VALID_LOG_FORMATS: [&str; 2] = ["json", "pretty"];
const VALID_START_POSITIONS: [&str; 2] = ["end", "beginning"];

/// poolwatch 통합 설정
///
/// `poolwatch.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 컴포넌트는 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolwatchConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 로그 감시 및 윈도우 분석 설정
    #[serde(default)]
    pub watcher: WatcherConfig,
    /// 알림 전송 설정
    #[serde(default)]
    pub alert: AlertConfig,
    /// breach 기록 저장소 설정
    #[serde(default)]
    pub breach_store: BreachStoreConfig,
    /// Prometheus 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl PoolwatchConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드와 전체 검증을 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, PoolwatchError> {
        let mut config = Self::load_or_default(path).await?;
        config.validate()?;
        Ok(config)
    }

    /// 설정 파일이 있으면 읽고, 없으면 기본값에서 시작합니다.
    ///
    /// 환경변수 오버라이드는 적용하지만 검증은 하지 않습니다.
    /// 호출자가 용도에 맞게 [`validate`](Self::validate) 또는
    /// [`validate_for_viewer`](Self::validate_for_viewer)를 호출합니다.
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self, PoolwatchError> {
        let mut config = match Self::from_file(path.as_ref()).await {
            Ok(config) => config,
            Err(PoolwatchError::Config(ConfigError::FileNotFound { path })) => {
                tracing::debug!(path, "config file not found, using defaults");
                Self::default()
            }
            Err(e) => return Err(e),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, PoolwatchError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PoolwatchError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                PoolwatchError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, PoolwatchError> {
        toml::from_str(toml_str).map_err(|e| {
            PoolwatchError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 배포 환경에서 이미 쓰는 이름을 그대로 받습니다.
    /// `SLACK_WEBHOOK_URL`이 `WEBHOOK_URL`보다 우선합니다.
    /// 숫자나 bool 값을 파싱할 수 없으면 `ConfigError::InvalidValue`를 반환합니다
    /// (필드 이름은 환경변수 이름).
    pub fn apply_env_overrides(&mut self) -> Result<(), PoolwatchError> {
        // General
        override_string(&mut self.general.log_level, "POOLWATCH_LOG_LEVEL");
        override_string(&mut self.general.log_format, "POOLWATCH_LOG_FORMAT");

        // Watcher
        override_string(&mut self.watcher.log_file, "LOG_FILE");
        override_csv(&mut self.watcher.pools, "POOLWATCH_POOLS");
        override_usize(&mut self.watcher.window_size, "WINDOW_SIZE")?;
        override_opt_usize(&mut self.watcher.min_samples, "MIN_SAMPLES")?;
        override_f64(
            &mut self.watcher.error_rate_threshold,
            "ERROR_RATE_THRESHOLD",
        )?;

        // Alert
        override_string(&mut self.alert.webhook_url, "WEBHOOK_URL");
        override_string(&mut self.alert.webhook_url, "SLACK_WEBHOOK_URL");
        override_u64(&mut self.alert.cooldown_secs, "ALERT_COOLDOWN_SEC")?;
        override_bool(&mut self.alert.maintenance_mode, "MAINTENANCE_MODE")?;
        override_string(
            &mut self.alert.maintenance_flag_file,
            "MAINTENANCE_FLAG_FILE",
        );

        // Breach store
        override_string(&mut self.breach_store.path, "BREACH_LOG_FILE");
        Ok(())
    }

    /// 데몬 실행에 필요한 전체 검증을 수행합니다.
    ///
    /// [`validate_for_viewer`](Self::validate_for_viewer) 검증에 더해
    /// 웹훅 URL이 비어 있지 않은 http(s) URL인지 확인합니다.
    pub fn validate(&self) -> Result<(), PoolwatchError> {
        self.validate_for_viewer()?;
        validate_webhook_url(&self.alert.webhook_url)
    }

    /// breach 저장소와 sentinel 파일만 다루는 CLI 명령용 검증입니다.
    ///
    /// 웹훅 URL은 요구하지 않지만, 값이 있다면 형식은 확인합니다.
    pub fn validate_for_viewer(&self) -> Result<(), PoolwatchError> {
        validate_one_of("general.log_level", &self.general.log_level, &VALID_LOG_LEVELS)?;
        validate_one_of(
            "general.log_format",
            &self.general.log_format,
            &VALID_LOG_FORMATS,
        )?;

        let watcher = &self.watcher;
        require_non_empty("watcher.log_file", &watcher.log_file)?;
        if watcher.pools.iter().any(|p| p.trim().is_empty()) {
            return Err(invalid("watcher.pools", "pool names must not be empty"));
        }
        if watcher.window_size == 0 || watcher.window_size > MAX_WINDOW_SIZE {
            return Err(invalid(
                "watcher.window_size",
                format!("must be between 1 and {MAX_WINDOW_SIZE}"),
            ));
        }
        if let Some(min) = watcher.min_samples
            && (min == 0 || min > watcher.window_size)
        {
            return Err(invalid(
                "watcher.min_samples",
                format!("must be between 1 and window_size ({})", watcher.window_size),
            ));
        }
        let threshold = watcher.error_rate_threshold;
        if !threshold.is_finite() || !(0.0..=100.0).contains(&threshold) {
            return Err(invalid(
                "watcher.error_rate_threshold",
                "must be a finite percentage between 0 and 100",
            ));
        }
        if watcher.poll_interval_ms == 0 {
            return Err(invalid("watcher.poll_interval_ms", "must be greater than 0"));
        }
        validate_one_of(
            "watcher.start_from",
            &watcher.start_from,
            &VALID_START_POSITIONS,
        )?;
        if watcher.max_open_retries == 0 {
            return Err(invalid("watcher.max_open_retries", "must be greater than 0"));
        }
        if watcher.initial_backoff_ms == 0 {
            return Err(invalid(
                "watcher.initial_backoff_ms",
                "must be greater than 0",
            ));
        }
        if watcher.initial_backoff_ms > watcher.max_backoff_ms {
            return Err(invalid(
                "watcher.initial_backoff_ms",
                "must not exceed watcher.max_backoff_ms",
            ));
        }
        if watcher.max_line_length == 0 {
            return Err(invalid("watcher.max_line_length", "must be greater than 0"));
        }

        require_non_empty("alert.maintenance_flag_file", &self.alert.maintenance_flag_file)?;
        if self.alert.request_timeout_secs == 0 {
            return Err(invalid(
                "alert.request_timeout_secs",
                "must be greater than 0",
            ));
        }
        if !self.alert.webhook_url.is_empty() {
            validate_webhook_url(&self.alert.webhook_url)?;
        }

        require_non_empty("breach_store.path", &self.breach_store.path)?;

        if self.metrics.enabled {
            if self.metrics.port == 0 {
                return Err(invalid("metrics.port", "must be greater than 0"));
            }
            if !self.metrics.endpoint.starts_with('/') {
                return Err(invalid("metrics.endpoint", "must start with '/'"));
            }
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> PoolwatchError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

fn validate_one_of(field: &str, value: &str, allowed: &[&str]) -> Result<(), PoolwatchError> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(invalid(field, format!("must be one of: {}", allowed.join(", "))))
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<(), PoolwatchError> {
    if value.trim().is_empty() {
        Err(invalid(field, "must not be empty"))
    } else {
        Ok(())
    }
}

fn validate_webhook_url(url: &str) -> Result<(), PoolwatchError> {
    if url.trim().is_empty() {
        return Err(invalid(
            "alert.webhook_url",
            "must be set (SLACK_WEBHOOK_URL or [alert] webhook_url)",
        ));
    }
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return Err(invalid("alert.webhook_url", "must be an http(s) URL"));
    }
    Ok(())
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 로그 감시 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// 감시할 access 로그 경로
    pub log_file: String,
    /// 알려진 풀 이름 (비어 있으면 모든 값을 허용)
    pub pools: Vec<String>,
    /// 슬라이딩 윈도우 크기 (요청 수)
    pub window_size: usize,
    /// 에러율 평가에 필요한 최소 샘플 수 (없으면 window_size)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_samples: Option<usize>,
    /// 에러율 임계값 (%)
    pub error_rate_threshold: f64,
    /// 파일 폴링 간격 (밀리초)
    pub poll_interval_ms: u64,
    /// 시작 위치 (end, beginning)
    pub start_from: String,
    /// 파일 열기 최대 재시도 횟수
    pub max_open_retries: u32,
    /// 첫 재시도 대기 시간 (밀리초)
    pub initial_backoff_ms: u64,
    /// 재시도 대기 시간 상한 (밀리초)
    pub max_backoff_ms: u64,
    /// 최대 라인 길이 (바이트)
    pub max_line_length: usize,
}

impl WatcherConfig {
    /// 실제로 적용되는 최소 샘플 수를 반환합니다.
    pub fn effective_min_samples(&self) -> usize {
        self.min_samples.unwrap_or(self.window_size)
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            log_file: "/var/log/nginx/access.log".to_owned(),
            pools: vec!["blue".to_owned(), "green".to_owned()],
            window_size: 200,
            min_samples: None,
            error_rate_threshold: 2.0,
            poll_interval_ms: 250,
            start_from: "end".to_owned(),
            max_open_retries: 60,
            initial_backoff_ms: 500,
            max_backoff_ms: 5_000,
            max_line_length: 16 * 1024,
        }
    }
}

/// 알림 전송 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Slack 호환 incoming webhook URL
    pub webhook_url: String,
    /// 알림 종류별 쿨다운 (초)
    pub cooldown_secs: u64,
    /// 정적 유지보수 모드
    pub maintenance_mode: bool,
    /// 유지보수 sentinel 파일 경로 (존재하면 유지보수 모드)
    pub maintenance_flag_file: String,
    /// 웹훅 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            cooldown_secs: 300,
            maintenance_mode: false,
            maintenance_flag_file: "/app/state/maintenance.flag".to_owned(),
            request_timeout_secs: 10,
        }
    }
}

/// breach 기록 저장소 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreachStoreConfig {
    /// JSON lines 파일 경로
    pub path: String,
}

impl Default for BreachStoreConfig {
    fn default() -> Self {
        Self {
            path: "/app/state/error_rate_breaches.log".to_owned(),
        }
    }
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// exporter 활성화 여부
    pub enabled: bool,
    /// 수신 주소
    pub listen_addr: String,
    /// 수신 포트
    pub port: u16,
    /// scrape 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9102,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) -> Result<(), PoolwatchError> {
    if let Ok(val) = std::env::var(env_key) {
        *target = parse_bool(&val).ok_or_else(|| env_parse_error(env_key, &val, "bool"))?;
    }
    Ok(())
}

/// 배포 스크립트가 쓰는 `true/false`, `1/0`, `yes/no`, `on/off`를 모두 받습니다.
fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// 숫자 환경변수를 파싱합니다. 값이 있는데 파싱할 수 없으면 설정 에러입니다.
fn parse_env<T: std::str::FromStr>(env_key: &str, kind: &str) -> Result<Option<T>, PoolwatchError> {
    match std::env::var(env_key) {
        Ok(val) => val
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| env_parse_error(env_key, &val, kind)),
        Err(_) => Ok(None),
    }
}

fn env_parse_error(env_key: &str, val: &str, kind: &str) -> PoolwatchError {
    invalid(env_key, format!("cannot parse '{val}' as {kind}"))
}

fn override_usize(target: &mut usize, env_key: &str) -> Result<(), PoolwatchError> {
    if let Some(parsed) = parse_env(env_key, "an unsigned integer")? {
        *target = parsed;
    }
    Ok(())
}

fn override_opt_usize(target: &mut Option<usize>, env_key: &str) -> Result<(), PoolwatchError> {
    if let Some(parsed) = parse_env(env_key, "an unsigned integer")? {
        *target = Some(parsed);
    }
    Ok(())
}

fn override_u64(target: &mut u64, env_key: &str) -> Result<(), PoolwatchError> {
    if let Some(parsed) = parse_env(env_key, "an unsigned integer")? {
        *target = parsed;
    }
    Ok(())
}

fn override_f64(target: &mut f64, env_key: &str) -> Result<(), PoolwatchError> {
    if let Some(parsed) = parse_env(env_key, "a number")? {
        *target = parsed;
    }
    Ok(())
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}
