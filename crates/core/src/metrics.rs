//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `poolwatch_`
//! - 모듈명: `daemon_`, `log_pipeline_`, `alert_`, `breach_store_`
//! - 접미어: `_total` (counter), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(poolwatch_core::metrics::LOG_PIPELINE_LINES_PROCESSED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 알림 종류 레이블 키 (failover, error_rate, recovery)
pub const LABEL_KIND: &str = "kind";

/// 결과 레이블 키 (sent, failed, maintenance, cooldown)
pub const LABEL_OUTCOME: &str = "outcome";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "poolwatch_daemon_build_info";

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "poolwatch_daemon_uptime_seconds";

// ─── Log Pipeline 메트릭 ────────────────────────────────────────────

/// Log Pipeline: tailer가 읽은 전체 라인 수 (counter)
pub const LOG_PIPELINE_LINES_READ_TOTAL: &str = "poolwatch_log_pipeline_lines_read_total";

/// Log Pipeline: 파싱되어 처리된 레코드 수 (counter)
pub const LOG_PIPELINE_LINES_PROCESSED_TOTAL: &str =
    "poolwatch_log_pipeline_lines_processed_total";

/// Log Pipeline: 파싱 실패로 건너뛴 라인 수 (counter)
pub const LOG_PIPELINE_PARSE_ERRORS_TOTAL: &str = "poolwatch_log_pipeline_parse_errors_total";

/// Log Pipeline: 감지된 로그 로테이션/truncation 수 (counter)
pub const LOG_PIPELINE_ROTATIONS_TOTAL: &str = "poolwatch_log_pipeline_rotations_total";

/// Log Pipeline: 현재 슬라이딩 윈도우 에러율 (gauge, %)
pub const LOG_PIPELINE_WINDOW_ERROR_RATE: &str = "poolwatch_log_pipeline_window_error_rate";

// ─── Alert 메트릭 ────────────────────────────────────────────────────

/// Alert: 디스패치 결정 수 (counter, label: kind, outcome)
pub const ALERT_DECISIONS_TOTAL: &str = "poolwatch_alert_decisions_total";

// ─── Breach Store 메트릭 ─────────────────────────────────────────────

/// Breach Store: 기록된 breach 수 (counter)
pub const BREACH_STORE_RECORDS_TOTAL: &str = "poolwatch_breach_store_records_total";

/// Breach Store: 기록 실패 수 (counter)
pub const BREACH_STORE_WRITE_ERRORS_TOTAL: &str = "poolwatch_breach_store_write_errors_total";

/// 모든 메트릭의 설명을 등록합니다.
///
/// 레코더 설치 직후 한 번 호출합니다. 레코더가 없어도 패닉하지 않습니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    // Daemon
    describe_gauge!(DAEMON_BUILD_INFO, "Build information (always 1)");
    describe_gauge!(DAEMON_UPTIME_SECONDS, "Daemon uptime in seconds");

    // Log Pipeline
    describe_counter!(
        LOG_PIPELINE_LINES_READ_TOTAL,
        "Total number of complete lines read from the access log"
    );
    describe_counter!(
        LOG_PIPELINE_LINES_PROCESSED_TOTAL,
        "Total number of access log records parsed and analyzed"
    );
    describe_counter!(
        LOG_PIPELINE_PARSE_ERRORS_TOTAL,
        "Total number of access log lines skipped because they failed to parse"
    );
    describe_counter!(
        LOG_PIPELINE_ROTATIONS_TOTAL,
        "Total number of log rotations or truncations detected"
    );
    describe_gauge!(
        LOG_PIPELINE_WINDOW_ERROR_RATE,
        "Current 5xx error rate over the sliding window (percent)"
    );

    // Alert
    describe_counter!(
        ALERT_DECISIONS_TOTAL,
        "Alert dispatch decisions by kind and outcome"
    );

    // Breach Store
    describe_counter!(
        BREACH_STORE_RECORDS_TOTAL,
        "Total number of error-rate breach records appended"
    );
    describe_counter!(
        BREACH_STORE_WRITE_ERRORS_TOTAL,
        "Total number of breach records that could not be written"
    );
}
