//! 로그 파이프라인 에러 타입
//!
//! [`LogPipelineError`]는 로그 파이프라인 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<LogPipelineError> for PoolwatchError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use poolwatch_core::error::{
    ConfigError, ParseError, PipelineError, PoolwatchError, StorageError,
};

/// 로그 파이프라인 도메인 에러
///
/// tail, 파싱, 알림 전송, breach 기록, 채널 통신 등 파이프라인 내부의
/// 모든 에러 상황을 포괄합니다.
#[derive(Debug, thiserror::Error)]
pub enum LogPipelineError {
    /// 로그 파싱 실패
    #[error("parse error: {format} at offset {offset}: {reason}")]
    Parse {
        /// 파서 형식 (access 등)
        format: String,
        /// 실패 위치 (바이트 오프셋)
        offset: usize,
        /// 실패 사유
        reason: String,
    },

    /// 수집기 에러 (파일 I/O 등)
    #[error("collector error: {source_type}: {reason}")]
    Collector {
        /// 수집 소스 유형 (file)
        source_type: String,
        /// 에러 사유
        reason: String,
    },

    /// 재시도 예산을 모두 소진하여 로그 파일을 열 수 없음
    #[error("log source unavailable: {path} (gave up after {attempts} attempts)")]
    SourceUnavailable {
        /// 로그 파일 경로
        path: String,
        /// 시도 횟수
        attempts: u32,
    },

    /// 알림 전송 실패
    #[error("notify error: {0}")]
    Notify(String),

    /// breach 저장소 에러
    #[error("breach store error: {path}: {reason}")]
    BreachStore {
        /// 저장소 파일 경로
        path: String,
        /// 에러 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 직렬화 에러
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<LogPipelineError> for PoolwatchError {
    fn from(err: LogPipelineError) -> Self {
        match err {
            LogPipelineError::SourceUnavailable { .. } => {
                PoolwatchError::Pipeline(PipelineError::SourceUnavailable(err.to_string()))
            }
            LogPipelineError::Parse { offset, reason, .. } => {
                PoolwatchError::Parse(ParseError::Failed { offset, reason })
            }
            LogPipelineError::Config { field, reason } => {
                PoolwatchError::Config(ConfigError::InvalidValue { field, reason })
            }
            LogPipelineError::BreachStore { path, reason } => {
                PoolwatchError::Storage(StorageError::Write { path, reason })
            }
            LogPipelineError::Channel(msg) => {
                PoolwatchError::Pipeline(PipelineError::ChannelSend(msg))
            }
            LogPipelineError::Io(e) => PoolwatchError::Io(e),
            other => PoolwatchError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}
