#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`collector`]: access 로그 파일 tail (로테이션/truncation 감지)
//! - [`parser`]: `key=value` access 로그 파서
//! - [`window`]: 슬라이딩 윈도우 에러율 분석
//! - [`failover`]: 풀 failover / 복구 상태 머신
//! - [`engine`]: 레코드를 알림 후보로 바꾸는 분석 엔진
//! - [`alert`]: 유지보수/쿨다운 정책과 전송 결정
//! - [`notifier`]: 웹훅 전송 채널
//! - [`maintenance`]: 유지보수 모드 게이트 (sentinel 파일)
//! - [`breach_store`]: 에러율 위반 기록 (JSON lines)
//! - [`pipeline`]: 전체 파이프라인 오케스트레이션 (Pipeline trait 구현)
//! - [`config`]: 파이프라인 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! LogTailer -> AccessLogParser -> AlertEngine -> AlertDispatcher -> Notifier
//!                                 |        |            |
//!                       SlidingWindow  FailoverTracker  MaintenanceGate / BreachStore
//! ```

pub mod alert;
pub mod breach_store;
pub mod config;
pub mod engine;
pub mod error;
pub mod failover;
pub mod maintenance;
pub mod notifier;
pub mod pipeline;
pub mod window;

pub mod collector;
pub mod parser;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{LogPipeline, LogPipelineBuilder};

// 설정
pub use config::{PipelineConfig, PipelineConfigBuilder, StartPosition};

// 에러
pub use error::LogPipelineError;

// 파서
pub use parser::AccessLogParser;

// 수집기
pub use collector::{LogTailer, RawLog, TailerConfig};

// 분석
pub use engine::AlertEngine;
pub use failover::{FailoverEdge, FailoverState, FailoverTracker};
pub use window::{SlidingWindow, WindowStats};

// 알림
pub use alert::{Alert, AlertDetails, AlertDispatcher, CooldownTable, DispatchOutcome};
pub use notifier::{AlertPayload, Notifier, WebhookNotifier};

// 상태 파일
pub use breach_store::{BreachStats, BreachStore};
pub use maintenance::MaintenanceGate;
