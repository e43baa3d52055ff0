//! 로그 파싱 모듈 -- 프록시 access 로그 파서
//!
//! 각 파서는 core의 [`LogParser`](poolwatch_core::pipeline::LogParser) trait을 구현합니다.
//! 파싱 실패는 파이프라인을 멈추지 않습니다. 호출자가 기록 후 해당 라인을 건너뜁니다.
//!
//! # 지원 형식
//! - `key=value` access 로그 ([`AccessLogParser`])

pub mod access;

pub use access::AccessLogParser;
