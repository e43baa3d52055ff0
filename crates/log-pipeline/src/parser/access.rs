//! 프록시 access 로그 파서
//!
//! 공백으로 구분된 `key=value` 토큰 형식의 access 로그 한 줄을
//! [`RequestEvent`]로 변환합니다.
//!
//! # 형식
//! ```text
//! pool=blue release=blue-v1 status=502 upstream_status=502, 200 upstream=172.18.0.3:3000, 172.18.0.4:3000
//!     request_time=0.012 upstream_response_time=0.010, 0.002 method=GET uri=/version time=2025-10-30T12:00:00+00:00
//! ```
//!
//! - 필수 키: `pool`, `release`, `status`, `upstream_status`, `upstream`,
//!   `request_time`, `method`, `uri`, `time`
//! - 선택 키: `upstream_response_time` (실패한 요청에서는 없거나 `-`)
//! - 알 수 없는 키는 무시합니다.
//! - `=`가 없는 토큰은 앞 값의 연속입니다 (업스트림 재시도 시 `502, 200`).
//! - 같은 키가 여러 번 나오면 첫 번째 값을 사용합니다.
//! - 숫자 필드가 깨져 있으면 에러 대신 sentinel 값으로 대체합니다.
//!
//! # 사용 예시
//! ```ignore
//! use poolwatch_log_pipeline::parser::AccessLogParser;
//! use poolwatch_core::pipeline::LogParser;
//!
//! let parser = AccessLogParser::default();
//! let event = parser.parse(b"pool=blue release=v1 status=200 ...")?;
//! ```

use chrono::DateTime;

use poolwatch_core::error::PoolwatchError;
use poolwatch_core::pipeline::LogParser;
use poolwatch_core::types::{Pool, RequestEvent, UNKNOWN_DURATION, UNKNOWN_STATUS};

use crate::error::LogPipelineError;

/// 파서 형식 이름
pub const FORMAT_NAME: &str = "access";

const POOL: usize = 0;
const RELEASE: usize = 1;
const STATUS: usize = 2;
const UPSTREAM_STATUS: usize = 3;
const UPSTREAM: usize = 4;
const REQUEST_TIME: usize = 5;
const UPSTREAM_RESPONSE_TIME: usize = 6;
const METHOD: usize = 7;
const URI: usize = 8;
const TIME: usize = 9;

const KEYS: [&str; 10] = [
    "pool",
    "release",
    "status",
    "upstream_status",
    "upstream",
    "request_time",
    "upstream_response_time",
    "method",
    "uri",
    "time",
];

const REQUIRED: [usize; 9] = [
    POOL,
    RELEASE,
    STATUS,
    UPSTREAM_STATUS,
    UPSTREAM,
    REQUEST_TIME,
    METHOD,
    URI,
    TIME,
];

/// access 로그 파서
///
/// `known_pools`가 비어 있지 않으면 목록에 없는 풀 값은 [`Pool::Unknown`]이 됩니다.
pub struct AccessLogParser {
    /// 알려진 풀 이름
    known_pools: Vec<String>,
    /// 최대 허용 입력 크기 (바이트)
    max_input_size: usize,
}

impl AccessLogParser {
    /// 알려진 풀 목록으로 파서를 생성합니다.
    pub fn new(known_pools: Vec<String>) -> Self {
        Self {
            known_pools,
            max_input_size: 64 * 1024,
        }
    }

    /// 최대 입력 크기를 설정합니다.
    pub fn with_max_input_size(mut self, size: usize) -> Self {
        self.max_input_size = size;
        self
    }

    /// 원시 바이트를 파싱합니다.
    pub fn parse_line(&self, raw: &[u8]) -> Result<RequestEvent, LogPipelineError> {
        if raw.len() > self.max_input_size {
            return Err(parse_error(
                0,
                format!(
                    "input too large: {} bytes (max: {})",
                    raw.len(),
                    self.max_input_size
                ),
            ));
        }

        let line = std::str::from_utf8(raw)
            .map_err(|e| parse_error(e.valid_up_to(), "invalid UTF-8"))?;
        let line = line.trim();
        if line.is_empty() {
            return Err(parse_error(0, "empty line"));
        }

        let fields = split_fields(line);

        if let Some(missing) = REQUIRED.iter().find(|idx| fields[**idx].is_none()) {
            return Err(parse_error(
                0,
                format!("missing required field '{}'", KEYS[*missing]),
            ));
        }

        let take = |idx: usize| fields[idx].clone().unwrap_or_default();

        let upstream_status = take(UPSTREAM_STATUS);
        let upstream_status_codes = upstream_status
            .split(',')
            .filter_map(|s| s.trim().parse::<u16>().ok())
            .collect();
        let time = take(TIME);
        let timestamp = DateTime::parse_from_rfc3339(&time).ok();

        Ok(RequestEvent {
            pool: self.resolve_pool(&take(POOL)),
            release: take(RELEASE),
            status: take(STATUS).parse::<u16>().unwrap_or(UNKNOWN_STATUS),
            upstream_status,
            upstream_status_codes,
            upstream: take(UPSTREAM),
            request_time: parse_duration(&take(REQUEST_TIME)).unwrap_or(UNKNOWN_DURATION),
            upstream_response_time: fields[UPSTREAM_RESPONSE_TIME]
                .as_deref()
                .and_then(parse_last_duration),
            method: take(METHOD),
            uri: take(URI),
            time,
            timestamp,
        })
    }

    fn resolve_pool(&self, value: &str) -> Pool {
        if value.is_empty() || value == "-" {
            return Pool::Unknown;
        }
        if !self.known_pools.is_empty() && !self.known_pools.iter().any(|p| p == value) {
            return Pool::Unknown;
        }
        Pool::Named(value.to_owned())
    }
}

impl Default for AccessLogParser {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl LogParser for AccessLogParser {
    fn format_name(&self) -> &str {
        FORMAT_NAME
    }

    fn parse(&self, raw: &[u8]) -> Result<RequestEvent, PoolwatchError> {
        self.parse_line(raw).map_err(PoolwatchError::from)
    }
}

fn parse_error(offset: usize, reason: impl Into<String>) -> LogPipelineError {
    LogPipelineError::Parse {
        format: FORMAT_NAME.to_owned(),
        offset,
        reason: reason.into(),
    }
}

/// 토큰을 필드 값으로 모읍니다.
fn split_fields(line: &str) -> [Option<String>; KEYS.len()] {
    let mut fields: [Option<String>; KEYS.len()] = Default::default();
    // 연속 토큰을 붙일 대상 필드. 알 수 없는 키나 중복 키 뒤에서는 None
    let mut current: Option<usize> = None;

    for token in line.split_ascii_whitespace() {
        match token.split_once('=') {
            Some((key, value)) if is_key(key) => {
                current = match KEYS.iter().position(|k| *k == key) {
                    Some(idx) if fields[idx].is_none() => {
                        fields[idx] = Some(value.to_owned());
                        Some(idx)
                    }
                    _ => None,
                };
            }
            _ => {
                if let Some(value) = current.and_then(|idx| fields[idx].as_mut()) {
                    value.push(' ');
                    value.push_str(token);
                }
            }
        }
    }

    fields
}

fn is_key(key: &str) -> bool {
    !key.is_empty() && key.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

fn parse_duration(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}

/// 재시도로 여러 값이 기록된 경우 마지막 업스트림의 응답 시간을 사용합니다.
fn parse_last_duration(value: &str) -> Option<f64> {
    value.rsplit(',').next().and_then(parse_duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SAMPLE: &[u8] = b"pool=blue release=blue-v1 status=200 upstream_status=200 upstream=172.18.0.3:3000 request_time=0.004 upstream_response_time=0.003 method=GET uri=/version time=2025-10-30T12:00:00+00:00";

    fn parser() -> AccessLogParser {
        AccessLogParser::new(vec!["blue".to_owned(), "green".to_owned()])
    }

    #[test]
    fn parses_complete_line() {
        let event = parser().parse_line(SAMPLE).unwrap();
        assert_eq!(event.pool, Pool::Named("blue".to_owned()));
        assert_eq!(event.release, "blue-v1");
        assert_eq!(event.status, 200);
        assert_eq!(event.upstream_status_codes, vec![200]);
        assert_eq!(event.upstream, "172.18.0.3:3000");
        assert_eq!(event.request_time, 0.004);
        assert_eq!(event.upstream_response_time, Some(0.003));
        assert_eq!(event.method, "GET");
        assert_eq!(event.uri, "/version");
        assert!(event.timestamp.is_some());
        assert!(!event.is_error());
    }

    #[test]
    fn multi_upstream_values_are_joined() {
        let line = b"pool=green release=green-v1 status=200 upstream_status=502, 200 upstream=172.18.0.3:3000, 172.18.0.4:3000 request_time=0.020 upstream_response_time=0.015, 0.004 method=GET uri=/version time=2025-10-30T12:00:01+00:00";
        let event = parser().parse_line(line).unwrap();
        assert_eq!(event.upstream_status, "502, 200");
        assert_eq!(event.upstream_status_codes, vec![502, 200]);
        assert_eq!(event.upstream, "172.18.0.3:3000, 172.18.0.4:3000");
        assert_eq!(event.upstream_response_time, Some(0.004));
    }

    #[test]
    fn optional_field_may_be_absent_or_dash() {
        let line = b"pool=blue release=v1 status=502 upstream_status=- upstream=- request_time=1.5 method=POST uri=/chaos time=-";
        let event = parser().parse_line(line).unwrap();
        assert_eq!(event.upstream_response_time, None);
        assert!(event.upstream_status_codes.is_empty());
        assert!(event.timestamp.is_none());
        assert!(event.is_error());

        let dash = b"pool=blue release=v1 status=200 upstream_status=200 upstream=a request_time=0.1 upstream_response_time=- method=GET uri=/ time=t";
        assert_eq!(parser().parse_line(dash).unwrap().upstream_response_time, None);
    }

    #[test]
    fn malformed_numbers_degrade_to_sentinels() {
        let line = b"pool=blue release=v1 status=abc upstream_status=x upstream=a request_time=fast upstream_response_time=slow method=GET uri=/ time=t";
        let event = parser().parse_line(line).unwrap();
        assert_eq!(event.status, UNKNOWN_STATUS);
        assert_eq!(event.request_time, UNKNOWN_DURATION);
        assert_eq!(event.upstream_response_time, None);
        assert!(!event.is_error());
    }

    #[test]
    fn missing_required_field_is_error() {
        let line = b"pool=blue release=v1 upstream_status=200 upstream=a request_time=0.1 method=GET uri=/ time=t";
        let err = parser().parse_line(line).unwrap_err();
        assert!(err.to_string().contains("'status'"));
    }

    #[test]
    fn unknown_and_dash_pools() {
        let p = parser();
        let line = |pool: &str| {
            format!(
                "pool={pool} release=v1 status=200 upstream_status=200 upstream=a request_time=0.1 method=GET uri=/ time=t"
            )
        };
        assert_eq!(p.parse_line(line("-").as_bytes()).unwrap().pool, Pool::Unknown);
        assert_eq!(p.parse_line(line("").as_bytes()).unwrap().pool, Pool::Unknown);
        assert_eq!(p.parse_line(line("red").as_bytes()).unwrap().pool, Pool::Unknown);

        // 풀 목록이 없으면 어떤 값이든 허용
        let open = AccessLogParser::default();
        assert_eq!(
            open.parse_line(line("red").as_bytes()).unwrap().pool,
            Pool::Named("red".to_owned())
        );
    }

    #[test]
    fn unknown_keys_ignored_and_first_occurrence_wins() {
        let line = b"pool=blue extra=foo bar release=v1 status=503 status=200 upstream_status=503 upstream=a request_time=0.1 method=GET uri=/ time=t";
        let event = parser().parse_line(line).unwrap();
        assert_eq!(event.status, 503);
        assert_eq!(event.pool, Pool::Named("blue".to_owned()));
    }

    #[test]
    fn uri_with_equals_sign_is_kept() {
        let line = b"pool=blue release=v1 status=200 upstream_status=200 upstream=a request_time=0.1 method=GET uri=/search?q=a&b=c time=t";
        let event = parser().parse_line(line).unwrap();
        assert_eq!(event.uri, "/search?q=a&b=c");
    }

    #[test]
    fn rejects_empty_non_utf8_and_oversized() {
        let p = parser();
        assert!(p.parse_line(b"").is_err());
        assert!(p.parse_line(b"   ").is_err());
        assert!(p.parse_line(&[0xff, 0xfe, 0x00]).is_err());

        let small = AccessLogParser::default().with_max_input_size(16);
        let err = small.parse_line(SAMPLE).unwrap_err();
        assert!(err.to_string().contains("too large"));
    }

    #[test]
    fn log_parser_trait_maps_errors() {
        let p = parser();
        assert_eq!(p.format_name(), "access");
        let err = LogParser::parse(&p, b"garbage").unwrap_err();
        assert!(matches!(err, PoolwatchError::Parse(_)));
    }

    proptest! {
        #[test]
        fn arbitrary_bytes_never_panic(raw in proptest::collection::vec(any::<u8>(), 0..512)) {
            let _ = parser().parse_line(&raw);
        }

        #[test]
        fn status_survives_rendering(status in 100u16..600, pool in prop_oneof![Just("blue"), Just("green")]) {
            let line = format!(
                "pool={pool} release=r status={status} upstream_status={status} upstream=a request_time=0.1 upstream_response_time=0.1 method=GET uri=/ time=t"
            );
            let event = parser().parse_line(line.as_bytes()).unwrap();
            prop_assert_eq!(event.status, status);
            prop_assert_eq!(event.is_error(), (500..600).contains(&status));
            prop_assert_eq!(event.pool.as_str(), pool);
        }
    }
}
