//! 슬라이딩 윈도우 에러율 분석
//!
//! [`SlidingWindow`]은 가장 최근 N개 요청을 고정 용량 FIFO로 보관하고
//! 5xx 응답 수를 삽입/제거와 함께 갱신하여 O(1)로 에러율을 계산합니다.
//!
//! 불변식: `error_count <= len <= capacity`

use std::collections::VecDeque;

use poolwatch_core::types::RequestEvent;

use crate::error::LogPipelineError;

/// 로그 스니펫을 만들 때 뒤에서부터 살펴보는 최대 요청 수
pub const SNIPPET_SCAN_DEPTH: usize = 20;

/// 윈도우 통계 스냅샷
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    /// 에러율 (%)
    pub error_rate: f64,
    /// 윈도우 내 에러 수
    pub error_count: usize,
    /// 윈도우 내 전체 요청 수
    pub total: usize,
    /// 윈도우 용량
    pub capacity: usize,
    /// 설정된 에러율 임계값 (%)
    pub threshold: f64,
}

impl WindowStats {
    /// 에러율이 임계값을 넘었는지 (min_samples와 무관한 순수 비교)
    pub fn above_threshold(&self) -> bool {
        self.error_rate > self.threshold
    }
}

/// 최근 N개 요청의 슬라이딩 윈도우
#[derive(Debug)]
pub struct SlidingWindow {
    events: VecDeque<RequestEvent>,
    capacity: usize,
    error_count: usize,
    min_samples: usize,
    threshold: f64,
}

impl SlidingWindow {
    /// 새 윈도우를 생성합니다. 용량은 생성 후 바뀌지 않습니다.
    ///
    /// `min_samples`는 `1..=capacity`여야 하며, `threshold`는 0~100 사이의 유한한 값이어야 합니다.
    pub fn new(capacity: usize, min_samples: usize, threshold: f64) -> Result<Self, LogPipelineError> {
        if capacity == 0 {
            return Err(LogPipelineError::Config {
                field: "window_size".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }
        if min_samples == 0 || min_samples > capacity {
            return Err(LogPipelineError::Config {
                field: "min_samples".to_owned(),
                reason: format!("must be 1-{capacity}"),
            });
        }
        if !threshold.is_finite() || !(0.0..=100.0).contains(&threshold) {
            return Err(LogPipelineError::Config {
                field: "error_rate_threshold".to_owned(),
                reason: "must be a finite percentage between 0 and 100".to_owned(),
            });
        }

        Ok(Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
            error_count: 0,
            min_samples,
            threshold,
        })
    }

    /// 요청을 추가합니다. 윈도우가 가득 차 있으면 가장 오래된 요청을 제거합니다.
    pub fn push(&mut self, event: RequestEvent) {
        if self.events.len() == self.capacity
            && let Some(evicted) = self.events.pop_front()
            && evicted.is_error()
        {
            self.error_count -= 1;
        }
        if event.is_error() {
            self.error_count += 1;
        }
        self.events.push_back(event);
    }

    /// 에러율(%)을 반환합니다. 윈도우가 비어 있으면 0입니다.
    pub fn error_rate(&self) -> f64 {
        if self.events.is_empty() {
            return 0.0;
        }
        100.0 * self.error_count as f64 / self.events.len() as f64
    }

    /// 최소 샘플 수를 채웠고 에러율이 임계값을 초과했는지 확인합니다.
    ///
    /// 임계값과 같은 에러율은 위반이 아닙니다.
    pub fn is_breached(&self) -> bool {
        self.events.len() >= self.min_samples && self.error_rate() > self.threshold
    }

    /// 현재 통계 스냅샷을 반환합니다.
    pub fn stats(&self) -> WindowStats {
        WindowStats {
            error_rate: self.error_rate(),
            error_count: self.error_count,
            total: self.events.len(),
            capacity: self.capacity,
            threshold: self.threshold,
        }
    }

    /// 윈도우 내 요청 수
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// 윈도우가 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// 윈도우 용량
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 윈도우 내 에러 수
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    /// 에러율 임계값 (%)
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// 가장 최근 요청
    pub fn last(&self) -> Option<&RequestEvent> {
        self.events.back()
    }

    /// 알림 스니펫용 최근 요청을 오래된 순서로 반환합니다.
    ///
    /// 마지막 [`SNIPPET_SCAN_DEPTH`]개 요청 중에서 (`errors_only`이면 에러만) 최대 `n`개를 고릅니다.
    pub fn recent(&self, n: usize, errors_only: bool) -> Vec<&RequestEvent> {
        let mut picked: Vec<&RequestEvent> = self
            .events
            .iter()
            .rev()
            .take(SNIPPET_SCAN_DEPTH)
            .filter(|e| !errors_only || e.is_error())
            .take(n)
            .collect();
        picked.reverse();
        picked
    }
}
