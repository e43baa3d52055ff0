//! 파이프라인 trait: start/stop/health_check 와 로그 파서 seam

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::PoolwatchError;
use crate::types::RequestEvent;

/// 모듈 헬스 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// 정상
    Healthy,
    /// 동작하지만 성능 저하
    Degraded(String),
    /// 동작 불가
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 확인합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 동작 불가 상태인지 확인합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

/// 생명주기를 가진 처리 모듈
///
/// `poolwatch-daemon`은 이 trait으로 로그 파이프라인을 시작/정지/점검합니다.
pub trait Pipeline: Send {
    /// 백그라운드 태스크를 시작합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), PoolwatchError>> + Send;

    /// 태스크를 정지하고 남은 입력을 처리합니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), PoolwatchError>> + Send;

    /// 현재 헬스 상태를 반환합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

/// 로그 파서 trait
///
/// 새로운 access 로그 형식을 지원하려면 이 trait을 구현합니다.
pub trait LogParser: Send + Sync {
    /// 지원하는 로그 형식 이름
    fn format_name(&self) -> &str;

    /// 원시 바이트를 요청 레코드로 파싱
    fn parse(&self, raw: &[u8]) -> Result<RequestEvent, PoolwatchError>;
}
