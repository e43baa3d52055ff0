//! 로그 수집 모듈 -- access 로그 파일에서 원시 라인을 수집합니다.
//!
//! # 수집 소스
//! - [`LogTailer`]: 파일 감시 (`tail -F` 방식, 로테이션/truncation 감지)
//!
//! # 아키텍처
//! 수집기는 자체 tokio 태스크에서 실행되며, 수집된 원시 로그를
//! `tokio::mpsc::Sender<RawLog>` 채널을 통해 처리 태스크로 전달합니다.
//! 채널은 순서를 보존하므로 처리 태스크는 파일에 기록된 순서대로 레코드를 봅니다.

pub mod file;

pub use file::{LogTailer, TailerConfig};

use bytes::Bytes;

/// 수집된 원시 로그 데이터
///
/// 수집기가 생성하고, 파서가 소비하는 중간 데이터 형식입니다.
/// `data`에는 줄바꿈 문자가 포함되지 않습니다.
#[derive(Debug, Clone)]
pub struct RawLog {
    /// 원시 로그 바이트 (한 줄)
    pub data: Bytes,
    /// 수집 소스 식별자 (예: "file:/var/log/nginx/access.log")
    pub source: String,
    /// 수집 시각
    pub received_at: std::time::SystemTime,
}

impl RawLog {
    /// 새 RawLog를 생성합니다.
    pub fn new(data: Bytes, source: impl Into<String>) -> Self {
        Self {
            data,
            source: source.into(),
            received_at: std::time::SystemTime::now(),
        }
    }
}

/// 수집기 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectorStatus {
    /// 실행 대기 중
    Idle,
    /// 로그 파일이 나타나기를 기다리는 중
    Waiting,
    /// 실행 중
    Running,
    /// 에러로 중단됨
    Error(String),
    /// 정상 종료됨
    Stopped,
}
