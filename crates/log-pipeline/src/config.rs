//! 로그 파이프라인 설정
//!
//! [`PipelineConfig`]는 core의 [`PoolwatchConfig`](poolwatch_core::config::PoolwatchConfig)에서
//! watcher, 알림, breach 저장소 섹션을 모아 파이프라인 전용 설정을 제공합니다.
//!
//! # 사용 예시
//! ```ignore
//! use poolwatch_core::config::PoolwatchConfig;
//! use poolwatch_log_pipeline::config::PipelineConfig;
//!
//! let core_config = PoolwatchConfig::default();
//! let config = PipelineConfig::from_core(&core_config);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use poolwatch_core::config::PoolwatchConfig;

use crate::collector::file::TailerConfig;
use crate::error::LogPipelineError;

/// 로그 파일을 처음 열었을 때의 읽기 시작 위치
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartPosition {
    /// 파일 끝부터 (새로 추가되는 라인만, 기본값)
    #[default]
    End,
    /// 파일 처음부터
    Beginning,
}

impl StartPosition {
    /// 설정 문자열에서 변환합니다. 알 수 없는 값은 `None`입니다.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "end" => Some(Self::End),
            "beginning" => Some(Self::Beginning),
            _ => None,
        }
    }
}

/// 로그 파이프라인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// 감시할 access 로그 경로
    pub log_file: PathBuf,
    /// 알려진 풀 이름 (비어 있으면 모든 값을 허용)
    pub known_pools: Vec<String>,
    /// 슬라이딩 윈도우 크기
    pub window_size: usize,
    /// 에러율 평가 최소 샘플 수
    pub min_samples: usize,
    /// 에러율 임계값 (%)
    pub error_rate_threshold: f64,
    /// 파일 폴링 간격 (밀리초)
    pub poll_interval_ms: u64,
    /// 읽기 시작 위치
    pub start_from: StartPosition,
    /// 파일 열기 최대 재시도 횟수
    pub max_open_retries: u32,
    /// 첫 재시도 대기 시간 (밀리초)
    pub initial_backoff_ms: u64,
    /// 재시도 대기 시간 상한 (밀리초)
    pub max_backoff_ms: u64,
    /// 최대 라인 길이 (바이트)
    pub max_line_length: usize,
    /// 알림 종류별 쿨다운 (초)
    pub cooldown_secs: u64,
    /// 정적 유지보수 모드
    pub maintenance_mode: bool,
    /// 유지보수 sentinel 파일 경로
    pub maintenance_flag_file: PathBuf,
    /// breach 기록 파일 경로
    pub breach_store_path: PathBuf,
    /// 웹훅 URL
    pub webhook_url: String,
    /// 웹훅 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
    /// tailer -> 처리 태스크 채널 용량
    pub channel_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_core(&PoolwatchConfig::default())
    }
}

impl PipelineConfig {
    /// core 설정에서 파이프라인 설정을 생성합니다.
    ///
    /// core 설정에 없는 확장 필드(`channel_capacity`)는 기본값이 적용됩니다.
    /// `start_from` 값이 잘못된 경우 `End`로 대체되며, core 검증에서 먼저 걸러집니다.
    pub fn from_core(core: &PoolwatchConfig) -> Self {
        let watcher = &core.watcher;
        Self {
            log_file: PathBuf::from(&watcher.log_file),
            known_pools: watcher.pools.clone(),
            window_size: watcher.window_size,
            min_samples: watcher.effective_min_samples(),
            error_rate_threshold: watcher.error_rate_threshold,
            poll_interval_ms: watcher.poll_interval_ms,
            start_from: StartPosition::parse(&watcher.start_from).unwrap_or_default(),
            max_open_retries: watcher.max_open_retries,
            initial_backoff_ms: watcher.initial_backoff_ms,
            max_backoff_ms: watcher.max_backoff_ms,
            max_line_length: watcher.max_line_length,
            cooldown_secs: core.alert.cooldown_secs,
            maintenance_mode: core.alert.maintenance_mode,
            maintenance_flag_file: PathBuf::from(&core.alert.maintenance_flag_file),
            breach_store_path: PathBuf::from(&core.breach_store.path),
            webhook_url: core.alert.webhook_url.clone(),
            request_timeout_secs: core.alert.request_timeout_secs,
            channel_capacity: 1024,
        }
    }

    /// 쿨다운 기간
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    /// 웹훅 요청 타임아웃
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// tailer 설정을 생성합니다.
    pub fn tailer_config(&self) -> TailerConfig {
        TailerConfig {
            path: self.log_file.clone(),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            start_from: self.start_from,
            max_open_retries: self.max_open_retries,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            max_line_length: self.max_line_length,
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogPipelineError> {
        const MAX_WINDOW_SIZE: usize = poolwatch_core::config::MAX_WINDOW_SIZE;
        const MAX_CHANNEL_CAPACITY: usize = 1_000_000;

        if self.window_size == 0 || self.window_size > MAX_WINDOW_SIZE {
            return Err(config_error(
                "window_size",
                format!("must be 1-{MAX_WINDOW_SIZE}"),
            ));
        }

        if self.min_samples == 0 || self.min_samples > self.window_size {
            return Err(config_error(
                "min_samples",
                format!("must be 1-{} (window_size)", self.window_size),
            ));
        }

        if !self.error_rate_threshold.is_finite()
            || !(0.0..=100.0).contains(&self.error_rate_threshold)
        {
            return Err(config_error(
                "error_rate_threshold",
                "must be a finite percentage between 0 and 100",
            ));
        }

        if self.poll_interval_ms == 0 {
            return Err(config_error("poll_interval_ms", "must be greater than 0"));
        }

        if self.max_open_retries == 0 {
            return Err(config_error("max_open_retries", "must be greater than 0"));
        }

        if self.initial_backoff_ms == 0 || self.initial_backoff_ms > self.max_backoff_ms {
            return Err(config_error(
                "initial_backoff_ms",
                "must be greater than 0 and not exceed max_backoff_ms",
            ));
        }

        if self.max_line_length == 0 {
            return Err(config_error("max_line_length", "must be greater than 0"));
        }

        if self.channel_capacity == 0 || self.channel_capacity > MAX_CHANNEL_CAPACITY {
            return Err(config_error(
                "channel_capacity",
                format!("must be 1-{MAX_CHANNEL_CAPACITY}"),
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(config_error("request_timeout_secs", "must be greater than 0"));
        }

        for (field, path) in [
            ("log_file", &self.log_file),
            ("maintenance_flag_file", &self.maintenance_flag_file),
            ("breach_store_path", &self.breach_store_path),
        ] {
            if path.as_os_str().is_empty() {
                return Err(config_error(field, "path must not be empty"));
            }
        }

        Ok(())
    }
}

fn config_error(field: &str, reason: impl Into<String>) -> LogPipelineError {
    LogPipelineError::Config {
        field: field.to_owned(),
        reason: reason.into(),
    }
}

/// 파이프라인 설정 빌더
///
/// 테스트와 임베딩 환경에서 필요한 필드만 바꿔 설정을 만들 때 사용합니다.
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
    min_samples_set: bool,
}

impl PipelineConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 로그 파일 경로를 설정합니다.
    pub fn log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.log_file = path.into();
        self
    }

    /// 알려진 풀 목록을 설정합니다.
    pub fn known_pools(mut self, pools: Vec<String>) -> Self {
        self.config.known_pools = pools;
        self
    }

    /// 윈도우 크기를 설정합니다.
    ///
    /// `min_samples`를 따로 지정하지 않으면 윈도우 크기를 따라갑니다.
    pub fn window_size(mut self, size: usize) -> Self {
        self.config.window_size = size;
        if !self.min_samples_set {
            self.config.min_samples = size;
        }
        self
    }

    /// 최소 샘플 수를 설정합니다.
    pub fn min_samples(mut self, min: usize) -> Self {
        self.config.min_samples = min;
        self.min_samples_set = true;
        self
    }

    /// 에러율 임계값(%)을 설정합니다.
    pub fn error_rate_threshold(mut self, threshold: f64) -> Self {
        self.config.error_rate_threshold = threshold;
        self
    }

    /// 폴링 간격(밀리초)을 설정합니다.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// 읽기 시작 위치를 설정합니다.
    pub fn start_from(mut self, position: StartPosition) -> Self {
        self.config.start_from = position;
        self
    }

    /// 파일 열기 재시도 정책을 설정합니다.
    pub fn open_retry(mut self, max_retries: u32, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        self.config.max_open_retries = max_retries;
        self.config.initial_backoff_ms = initial_backoff_ms;
        self.config.max_backoff_ms = max_backoff_ms;
        self
    }

    /// 쿨다운(초)을 설정합니다.
    pub fn cooldown_secs(mut self, secs: u64) -> Self {
        self.config.cooldown_secs = secs;
        self
    }

    /// 정적 유지보수 모드를 설정합니다.
    pub fn maintenance_mode(mut self, enabled: bool) -> Self {
        self.config.maintenance_mode = enabled;
        self
    }

    /// 유지보수 sentinel 파일 경로를 설정합니다.
    pub fn maintenance_flag_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.maintenance_flag_file = path.into();
        self
    }

    /// breach 기록 파일 경로를 설정합니다.
    pub fn breach_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.breach_store_path = path.into();
        self
    }

    /// 웹훅 URL을 설정합니다.
    pub fn webhook_url(mut self, url: impl Into<String>) -> Self {
        self.config.webhook_url = url.into();
        self
    }

    /// 채널 용량을 설정합니다.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// 설정을 검증하고 `PipelineConfig`를 생성합니다.
    pub fn build(self) -> Result<PipelineConfig, LogPipelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
