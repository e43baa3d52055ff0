//! 풀 failover / 복구 감지 상태 머신
//!
//! 요청마다 응답한 풀을 관찰하여 서비스 풀이 바뀌는 순간(edge)만 보고합니다.
//!
//! ```text
//! (미초기화) --X--> Stable(X)                       알림 없음 (기준선)
//! Stable(P)  --X≠P--> FailedOver(from=P, to=X)     Failover edge
//! FailedOver(F, _) --F--> Stable(F)                Recovery edge
//! FailedOver(F, Q) --X∉{F,Q}--> FailedOver(F, X)   edge 없음 (두 번째 백업)
//! ```
//!
//! [`Pool::Unknown`] 레코드는 상태를 바꾸지 않으며 기준선으로도 쓰이지 않습니다.

use poolwatch_core::types::Pool;

/// failover 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailoverState {
    /// 한 풀이 안정적으로 트래픽을 처리 중
    Stable {
        /// 현재 풀
        pool: String,
    },
    /// 원래 풀에서 백업 풀로 전환된 상태
    FailedOver {
        /// 원래 풀
        from: String,
        /// 현재 트래픽을 받는 풀
        to: String,
    },
}

/// 상태 전이로 생긴 알림 후보
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailoverEdge {
    /// 서비스 풀 전환
    Failover {
        /// 이전 풀
        from: String,
        /// 새 풀
        to: String,
    },
    /// 원래 풀로 복귀
    Recovery {
        /// 복귀한 풀
        pool: String,
        /// 복귀 직전까지 트래픽을 받던 백업 풀
        previous: String,
    },
}

/// failover 상태 추적기
#[derive(Debug, Default)]
pub struct FailoverTracker {
    state: Option<FailoverState>,
}

impl FailoverTracker {
    /// 미초기화 상태의 추적기를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 요청의 풀을 관찰하고, 상태 전이가 알림 후보이면 edge를 반환합니다.
    pub fn observe(&mut self, pool: &Pool) -> Option<FailoverEdge> {
        let Pool::Named(observed) = pool else {
            return None;
        };

        match &mut self.state {
            None => {
                tracing::info!(pool = %observed, "initial pool detected");
                self.state = Some(FailoverState::Stable {
                    pool: observed.clone(),
                });
                None
            }
            Some(FailoverState::Stable { pool: current }) => {
                if current == observed {
                    return None;
                }
                let from = std::mem::take(current);
                self.state = Some(FailoverState::FailedOver {
                    from: from.clone(),
                    to: observed.clone(),
                });
                Some(FailoverEdge::Failover {
                    from,
                    to: observed.clone(),
                })
            }
            Some(FailoverState::FailedOver { from, to }) => {
                if from == observed {
                    let previous = std::mem::take(to);
                    self.state = Some(FailoverState::Stable {
                        pool: observed.clone(),
                    });
                    Some(FailoverEdge::Recovery {
                        pool: observed.clone(),
                        previous,
                    })
                } else {
                    if to != observed {
                        tracing::info!(
                            from = %from,
                            previous_backup = %to,
                            backup = %observed,
                            "traffic moved to another backup pool"
                        );
                        *to = observed.clone();
                    }
                    None
                }
            }
        }
    }

    /// 현재 상태 (첫 관찰 전에는 `None`)
    pub fn state(&self) -> Option<&FailoverState> {
        self.state.as_ref()
    }

    /// 현재 트래픽을 받는 풀
    pub fn current_pool(&self) -> Option<&str> {
        match self.state.as_ref()? {
            FailoverState::Stable { pool } => Some(pool),
            FailoverState::FailedOver { to, .. } => Some(to),
        }
    }

    /// failover 상태인지 확인합니다.
    pub fn failover_occurred(&self) -> bool {
        matches!(self.state, Some(FailoverState::FailedOver { .. }))
    }

    /// failover 이전 풀. failover 상태일 때만 값이 있습니다.
    pub fn failover_from_pool(&self) -> Option<&str> {
        match self.state.as_ref()? {
            FailoverState::FailedOver { from, .. } => Some(from),
            FailoverState::Stable { .. } => None,
        }
    }
}
