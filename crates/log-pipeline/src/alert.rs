//! 알림 생성과 전송 정책
//!
//! [`AlertDispatcher`]는 [`AlertEngine`](crate::engine::AlertEngine)이 만든 알림 후보마다
//! 다음 순서로 결정을 내립니다.
//!
//! 1. `error_rate`이면 breach 기록을 먼저 추가 (전송 여부와 무관)
//! 2. 유지보수 모드이면 버림
//! 3. 같은 종류의 쿨다운이 남아 있으면 버림
//! 4. 웹훅 전송 후 쿨다운 갱신 (전송 실패도 갱신)
//!
//! 재시도는 하지 않습니다. 알림은 최대 한 번 전송됩니다.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use poolwatch_core::metrics as m;
use poolwatch_core::types::{AlertKind, BreachRecord, RequestEvent};

use crate::breach_store::BreachStore;
use crate::maintenance::MaintenanceGate;
use crate::notifier::{AlertPayload, Notifier};
use crate::window::WindowStats;

/// 알림 종류별 세부 필드
///
/// 웹훅 본문에 그대로 펼쳐서 직렬화됩니다.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AlertDetails {
    /// 서비스 풀 전환
    Failover {
        /// 이전 풀
        from_pool: String,
        /// 새 풀
        to_pool: String,
        /// 전환을 일으킨 요청의 릴리스
        release: String,
    },
    /// 에러율 임계값 초과
    ErrorRate {
        /// 에러율 (%)
        rate: f64,
        /// 임계값 (%)
        threshold: f64,
        /// 설정된 윈도우 크기
        window_size: usize,
        /// 윈도우 내 에러 수
        errors: usize,
        /// 가장 최근 요청의 풀
        pool: String,
    },
    /// 원래 풀로 복귀
    Recovery {
        /// 복귀한 풀
        pool: String,
        /// 복귀 요청의 릴리스
        release: String,
        /// 복귀 직전까지 트래픽을 받던 백업 풀
        previous_pool: String,
    },
}

impl AlertDetails {
    /// 알림 종류
    pub fn kind(&self) -> AlertKind {
        match self {
            Self::Failover { .. } => AlertKind::Failover,
            Self::ErrorRate { .. } => AlertKind::ErrorRate,
            Self::Recovery { .. } => AlertKind::Recovery,
        }
    }
}

/// 전송 후보 알림
#[derive(Debug, Clone)]
pub struct Alert {
    /// 알림 ID (UUID v4)
    pub id: String,
    /// 종류별 세부 필드
    pub details: AlertDetails,
    /// 생성 시각
    pub raised_at: DateTime<Utc>,
    /// 생성 시점의 윈도우 통계
    pub window: WindowStats,
    /// 최근 요청 스니펫 (오래된 순)
    pub snippet: Vec<RequestEvent>,
}

impl Alert {
    /// 새 알림을 생성합니다.
    pub fn new(
        details: AlertDetails,
        raised_at: DateTime<Utc>,
        window: WindowStats,
        snippet: Vec<RequestEvent>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            details,
            raised_at,
            window,
            snippet,
        }
    }

    /// 알림 종류
    pub fn kind(&self) -> AlertKind {
        self.details.kind()
    }

    /// 사람이 읽는 한 줄 요약
    pub fn summary(&self) -> String {
        match &self.details {
            AlertDetails::Failover {
                from_pool, to_pool, ..
            } => format!(
                "Failover detected: traffic switched from {} to {}",
                from_pool.to_uppercase(),
                to_pool.to_uppercase()
            ),
            AlertDetails::ErrorRate {
                rate,
                threshold,
                pool,
                ..
            } => format!(
                "High error rate: {rate:.2}% exceeds threshold {threshold}% (pool {})",
                pool.to_uppercase()
            ),
            AlertDetails::Recovery { pool, .. } => format!(
                "Recovery detected: {} pool is serving traffic again",
                pool.to_uppercase()
            ),
        }
    }
}

/// 알림 종류별 마지막 전송 시각
#[derive(Debug)]
pub struct CooldownTable {
    cooldown: Duration,
    last_sent: HashMap<AlertKind, DateTime<Utc>>,
}

impl CooldownTable {
    /// 쿨다운 기간으로 빈 테이블을 생성합니다.
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_sent: HashMap::new(),
        }
    }

    /// 쿨다운 기간
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// 남은 쿨다운을 반환합니다. 전송 가능하면 `None`입니다.
    ///
    /// 시계가 뒤로 간 경우 경과 시간을 0으로 봅니다.
    pub fn remaining(&self, kind: AlertKind, now: DateTime<Utc>) -> Option<Duration> {
        let last = self.last_sent.get(&kind)?;
        let elapsed = (now - *last).to_std().unwrap_or(Duration::ZERO);
        if elapsed >= self.cooldown {
            None
        } else {
            Some(self.cooldown - elapsed)
        }
    }

    /// 전송 시각을 기록합니다.
    pub fn stamp(&mut self, kind: AlertKind, now: DateTime<Utc>) {
        self.last_sent.insert(kind, now);
    }

    /// 마지막 전송 시각
    pub fn last_sent(&self, kind: AlertKind) -> Option<DateTime<Utc>> {
        self.last_sent.get(&kind).copied()
    }
}

/// 전송 결정 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// 웹훅 전송 성공
    Sent,
    /// 전송 시도했으나 실패 (쿨다운은 갱신됨)
    SendFailed,
    /// 유지보수 모드로 억제
    SuppressedMaintenance,
    /// 쿨다운으로 억제
    SuppressedCooldown {
        /// 남은 쿨다운
        remaining: Duration,
    },
}

impl DispatchOutcome {
    /// 메트릭 레이블 값
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::SendFailed => "send_failed",
            Self::SuppressedMaintenance => "suppressed_maintenance",
            Self::SuppressedCooldown { .. } => "suppressed_cooldown",
        }
    }

    /// 전송을 시도했는지 확인합니다.
    pub fn attempted(&self) -> bool {
        matches!(self, Self::Sent | Self::SendFailed)
    }
}

/// 전송 결정 카운터
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchCounters {
    /// 전송 성공
    pub sent: u64,
    /// 전송 실패
    pub failed: u64,
    /// 유지보수 모드 억제
    pub suppressed_maintenance: u64,
    /// 쿨다운 억제
    pub suppressed_cooldown: u64,
    /// 추가된 breach 기록
    pub breaches_recorded: u64,
}

/// 알림 전송기
///
/// 쿨다운 테이블을 소유하며 처리 태스크 하나에서만 사용됩니다.
pub struct AlertDispatcher<N> {
    notifier: N,
    gate: MaintenanceGate,
    cooldowns: CooldownTable,
    breach_store: BreachStore,
    counters: DispatchCounters,
}

impl<N: Notifier> AlertDispatcher<N> {
    /// 새 전송기를 생성합니다.
    pub fn new(
        notifier: N,
        gate: MaintenanceGate,
        cooldown: Duration,
        breach_store: BreachStore,
    ) -> Self {
        Self {
            notifier,
            gate,
            cooldowns: CooldownTable::new(cooldown),
            breach_store,
            counters: DispatchCounters::default(),
        }
    }

    /// 쿨다운 테이블
    pub fn cooldowns(&self) -> &CooldownTable {
        &self.cooldowns
    }

    /// 누적 결정 카운터
    pub fn counters(&self) -> DispatchCounters {
        self.counters
    }

    /// 알림 전송기 참조
    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// 알림 하나에 대한 전송 결정을 내리고 실행합니다.
    pub async fn dispatch(&mut self, alert: &Alert, now: DateTime<Utc>) -> DispatchOutcome {
        let kind = alert.kind();

        if let AlertDetails::ErrorRate {
            rate,
            threshold,
            window_size,
            errors,
            pool,
        } = &alert.details
        {
            let record = BreachRecord::error_rate(
                now,
                pool.as_str(),
                *rate,
                *errors,
                alert.window.total,
                *window_size,
                *threshold,
            );
            match self.breach_store.append(&record).await {
                Ok(()) => self.counters.breaches_recorded += 1,
                Err(e) => error!(
                    error = %e,
                    "failed to record error rate breach"
                ),
            }
        }

        let outcome = self.decide_and_send(alert, now).await;
        match outcome {
            DispatchOutcome::Sent => self.counters.sent += 1,
            DispatchOutcome::SendFailed => self.counters.failed += 1,
            DispatchOutcome::SuppressedMaintenance => self.counters.suppressed_maintenance += 1,
            DispatchOutcome::SuppressedCooldown { .. } => self.counters.suppressed_cooldown += 1,
        }
        metrics::counter!(
            m::ALERT_DECISIONS_TOTAL,
            m::LABEL_KIND => kind.as_str(),
            m::LABEL_OUTCOME => outcome.as_str()
        )
        .increment(1);
        outcome
    }

    async fn decide_and_send(&mut self, alert: &Alert, now: DateTime<Utc>) -> DispatchOutcome {
        let kind = alert.kind();

        if self.gate.is_suppressed().await {
            debug!(kind = %kind, alert_id = %alert.id, "alert suppressed by maintenance mode");
            return DispatchOutcome::SuppressedMaintenance;
        }

        if let Some(remaining) = self.cooldowns.remaining(kind, now) {
            debug!(
                kind = %kind,
                alert_id = %alert.id,
                remaining_secs = remaining.as_secs(),
                "alert suppressed by cooldown"
            );
            return DispatchOutcome::SuppressedCooldown { remaining };
        }

        let payload = AlertPayload::from_alert(alert);
        let outcome = match self.notifier.notify(&payload).await {
            Ok(()) => {
                info!(kind = %kind, alert_id = %alert.id, summary = %payload.text, "alert sent");
                DispatchOutcome::Sent
            }
            Err(e) => {
                error!(kind = %kind, alert_id = %alert.id, error = %e, "failed to send alert");
                DispatchOutcome::SendFailed
            }
        };

        // 실패한 전송도 시도한 것으로 본다
        self.cooldowns.stamp(kind, now);
        if outcome == DispatchOutcome::SendFailed {
            warn!(
                kind = %kind,
                cooldown_secs = self.cooldowns.cooldown().as_secs(),
                "alert dropped, next attempt after cooldown"
            );
        }
        outcome
    }
}
