//! 요청 레코드를 알림 후보로 바꾸는 분석 엔진
//!
//! 슬라이딩 윈도우, failover 추적기, 에러율 edge 상태를 한 값으로 묶습니다.
//! 처리 태스크 하나가 소유하며 공유되지 않습니다.
//!
//! # 에러율 edge
//!
//! 에러율 알림은 위반이 시작될 때 한 번 생기고, 위반이 계속되면 직전 edge로부터
//! 쿨다운이 지날 때마다 다시 생깁니다. 임계값 아래로 내려가면 해제됩니다.
//! 덕분에 위반이 지속되는 동안 레코드마다 breach 기록이 쌓이지 않습니다.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use poolwatch_core::metrics as m;
use poolwatch_core::types::RequestEvent;

use crate::alert::{Alert, AlertDetails};
use crate::error::LogPipelineError;
use crate::failover::{FailoverEdge, FailoverState, FailoverTracker};
use crate::notifier::{ERROR_SNIPPET_LINES, SNIPPET_LINES};
use crate::window::SlidingWindow;

/// 분석 엔진
#[derive(Debug)]
pub struct AlertEngine {
    window: SlidingWindow,
    tracker: FailoverTracker,
    cooldown: Duration,
    breach_active: bool,
    last_breach_edge: Option<DateTime<Utc>>,
}

impl AlertEngine {
    /// 새 엔진을 생성합니다.
    pub fn new(
        window_size: usize,
        min_samples: usize,
        threshold: f64,
        cooldown: Duration,
    ) -> Result<Self, LogPipelineError> {
        Ok(Self {
            window: SlidingWindow::new(window_size, min_samples, threshold)?,
            tracker: FailoverTracker::new(),
            cooldown,
            breach_active: false,
            last_breach_edge: None,
        })
    }

    /// 슬라이딩 윈도우
    pub fn window(&self) -> &SlidingWindow {
        &self.window
    }

    /// failover 상태
    pub fn failover_state(&self) -> Option<&FailoverState> {
        self.tracker.state()
    }

    /// 에러율 위반이 진행 중인지 확인합니다.
    pub fn breach_active(&self) -> bool {
        self.breach_active
    }

    /// 레코드 하나를 처리하고 생긴 알림 후보를 순서대로 반환합니다.
    ///
    /// 순서: 윈도우 추가, failover/recovery edge, 에러율 edge.
    pub fn process(&mut self, event: RequestEvent, now: DateTime<Utc>) -> Vec<Alert> {
        let release = event.release.clone();
        let pool = event.pool.clone();
        self.window.push(event);
        metrics::gauge!(m::LOG_PIPELINE_WINDOW_ERROR_RATE).set(self.window.error_rate());

        let mut alerts = Vec::new();

        if let Some(edge) = self.tracker.observe(&pool) {
            let details = match edge {
                FailoverEdge::Failover { from, to } => {
                    warn!(from = %from, to = %to, release = %release, "failover detected");
                    AlertDetails::Failover {
                        from_pool: from,
                        to_pool: to,
                        release,
                    }
                }
                FailoverEdge::Recovery { pool, previous } => {
                    info!(pool = %pool, previous = %previous, release = %release, "recovery detected");
                    AlertDetails::Recovery {
                        pool,
                        release,
                        previous_pool: previous,
                    }
                }
            };
            alerts.push(self.alert(details, now, SNIPPET_LINES, false));
        }

        if let Some(details) = self.breach_edge(now) {
            alerts.push(self.alert(details, now, ERROR_SNIPPET_LINES, true));
        }

        alerts
    }

    fn breach_edge(&mut self, now: DateTime<Utc>) -> Option<AlertDetails> {
        if !self.window.is_breached() {
            if self.breach_active {
                info!(
                    error_rate = self.window.error_rate(),
                    threshold = self.window.threshold(),
                    "error rate back below threshold"
                );
            }
            self.breach_active = false;
            return None;
        }

        let fire = if !self.breach_active {
            true
        } else {
            self.last_breach_edge.is_some_and(|last| {
                (now - last).to_std().unwrap_or(Duration::ZERO) >= self.cooldown
            })
        };
        if !fire {
            return None;
        }

        self.breach_active = true;
        self.last_breach_edge = Some(now);

        let stats = self.window.stats();
        let pool = self
            .window
            .last()
            .map(|e| e.pool.to_string())
            .unwrap_or_else(|| "unknown".to_owned());
        warn!(
            error_rate = stats.error_rate,
            threshold = self.window.threshold(),
            errors = stats.error_count,
            total = stats.total,
            pool = %pool,
            "error rate threshold breached"
        );

        Some(AlertDetails::ErrorRate {
            rate: (stats.error_rate * 100.0).round() / 100.0,
            threshold: self.window.threshold(),
            window_size: stats.capacity,
            errors: stats.error_count,
            pool,
        })
    }

    fn alert(
        &self,
        details: AlertDetails,
        now: DateTime<Utc>,
        lines: usize,
        errors_only: bool,
    ) -> Alert {
        let snippet = self
            .window
            .recent(lines, errors_only)
            .into_iter()
            .cloned()
            .collect();
        Alert::new(details, now, self.window.stats(), snippet)
    }
}
