//! 도메인 타입: 요청 이벤트, 풀, 알림 종류, 에러율 위반 레코드
//!
//! 파서, 분석기, 디스패처, breach 저장소와 CLI가 공유하는 데이터 구조를 정의합니다.

use std::fmt;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// 숫자 필드 파싱 실패 시 사용하는 HTTP 상태 sentinel
pub const UNKNOWN_STATUS: u16 = 0;

/// 숫자 필드 파싱 실패 시 사용하는 요청 시간 sentinel (초)
pub const UNKNOWN_DURATION: f64 = -1.0;

/// 요청을 처리한 백엔드 풀
///
/// 로그에 풀 헤더가 없거나(`-`, 빈 값) 설정된 풀 목록에 없는 값이면 `Unknown`입니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pool {
    /// 식별된 풀 (예: "blue", "green")
    Named(String),
    /// 풀 헤더 없음
    Unknown,
}

impl Pool {
    /// 풀 이름을 반환합니다. `Unknown`이면 `"unknown"`입니다.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Named(name) => name,
            Self::Unknown => "unknown",
        }
    }

    /// 식별된 풀인지 확인합니다.
    pub fn is_known(&self) -> bool {
        matches!(self, Self::Named(_))
    }
}

impl fmt::Display for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 프록시 access 로그 한 줄을 검증한 레코드
///
/// 필수 필드는 항상 채워져 있고, 숫자 필드가 깨진 경우
/// [`UNKNOWN_STATUS`] / [`UNKNOWN_DURATION`] sentinel로 대체됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEvent {
    /// 요청을 처리한 풀
    pub pool: Pool,
    /// 릴리스 식별자
    pub release: String,
    /// 클라이언트에 반환된 HTTP 상태
    pub status: u16,
    /// 업스트림 상태 원본 문자열 (재시도 시 "502, 200" 형태)
    pub upstream_status: String,
    /// 업스트림 상태 코드 목록 (숫자가 아닌 항목은 제외)
    pub upstream_status_codes: Vec<u16>,
    /// 업스트림 주소
    pub upstream: String,
    /// 요청 처리 시간 (초)
    pub request_time: f64,
    /// 업스트림 응답 시간 (초), 실패한 요청에서는 없을 수 있음
    pub upstream_response_time: Option<f64>,
    /// HTTP 메서드
    pub method: String,
    /// 요청 URI
    pub uri: String,
    /// 로그 시각 원본 문자열
    pub time: String,
    /// RFC 3339로 해석된 로그 시각
    pub timestamp: Option<DateTime<FixedOffset>>,
}

impl RequestEvent {
    /// 5xx 응답인지 확인합니다.
    pub fn is_error(&self) -> bool {
        (500..=599).contains(&self.status)
    }
}

impl fmt::Display for RequestEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pool={} release={} status={} upstream_status={} upstream={} method={} uri={}",
            self.pool,
            self.release,
            self.status,
            self.upstream_status,
            self.upstream,
            self.method,
            self.uri,
        )
    }
}

/// 알림 종류
///
/// 종류마다 독립된 쿨다운을 가집니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// 서비스 풀 전환
    Failover,
    /// 에러율 임계값 초과
    ErrorRate,
    /// 원래 풀로 복귀
    Recovery,
}

impl AlertKind {
    /// 전체 알림 종류
    pub const ALL: [AlertKind; 3] = [Self::Failover, Self::ErrorRate, Self::Recovery];

    /// 직렬화 이름을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Failover => "failover",
            Self::ErrorRate => "error_rate",
            Self::Recovery => "recovery",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 에러율 임계값 위반 기록
///
/// breach 저장소에 JSON 한 줄로 저장되며, 한 번 쓰이면 변경되지 않습니다.
/// 알림이 실제로 전송되었는지와 무관하게 기록됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreachRecord {
    /// 기록 시각
    pub timestamp: DateTime<Utc>,
    /// 알림 종류 (항상 `error_rate`)
    pub kind: AlertKind,
    /// 위반 당시 가장 최근 요청의 풀
    pub pool: String,
    /// 에러율 (%, 소수점 둘째 자리 반올림)
    pub error_rate: f64,
    /// 설정된 윈도우 크기
    pub window_size: usize,
    /// 윈도우 내 에러 수
    pub error_count: usize,
    /// 윈도우 내 전체 요청 수
    #[serde(default)]
    pub total_count: usize,
    /// 적용된 임계값 (%)
    #[serde(default)]
    pub threshold: f64,
    /// 임계값 초과분 (%p)
    #[serde(default)]
    pub exceeded_by: f64,
}

impl BreachRecord {
    /// 윈도우 통계로부터 breach 기록을 생성합니다.
    pub fn error_rate(
        timestamp: DateTime<Utc>,
        pool: impl Into<String>,
        error_rate: f64,
        error_count: usize,
        total_count: usize,
        window_size: usize,
        threshold: f64,
    ) -> Self {
        Self {
            timestamp,
            kind: AlertKind::ErrorRate,
            pool: pool.into(),
            error_rate: round2(error_rate),
            window_size,
            error_count,
            total_count,
            threshold,
            exceeded_by: round2(error_rate - threshold),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
