//! 알림 전송 채널
//!
//! [`Notifier`] trait으로 전송 계층을 추상화합니다.
//! 운영 환경에서는 Slack 호환 incoming webhook으로 JSON을 POST하는 [`WebhookNotifier`]를,
//! 테스트에서는 메모리에 기록하는 구현을 사용합니다.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};

use poolwatch_core::types::{AlertKind, RequestEvent};

use crate::alert::{Alert, AlertDetails};
use crate::error::LogPipelineError;
use crate::window::WindowStats;

/// failover / recovery 알림의 스니펫 라인 수
pub const SNIPPET_LINES: usize = 3;

/// error_rate 알림의 스니펫 라인 수 (에러만)
pub const ERROR_SNIPPET_LINES: usize = 5;

/// 알림 전송 trait
///
/// 구현체는 한 번만 전송을 시도합니다. 재시도와 쿨다운은 호출자가 결정합니다.
pub trait Notifier: Send + Sync + 'static {
    /// 알림 본문 하나를 전송합니다.
    fn notify(
        &self,
        payload: &AlertPayload,
    ) -> impl Future<Output = Result<(), LogPipelineError>> + Send;
}

/// 웹훅 요청 본문
#[derive(Debug, Clone, Serialize)]
pub struct AlertPayload {
    /// 사람이 읽는 요약 (Slack 알림 미리보기)
    pub text: String,
    /// 알림 종류
    pub kind: AlertKind,
    /// 종류별 필드
    #[serde(flatten)]
    pub details: AlertDetails,
    /// 알림 생성 시각
    pub timestamp: DateTime<Utc>,
    /// 알림 ID
    pub alert_id: String,
    /// Slack Block Kit 블록
    pub blocks: Vec<Value>,
}

impl AlertPayload {
    /// 알림에서 요청 본문을 만듭니다.
    pub fn from_alert(alert: &Alert) -> Self {
        Self {
            text: alert.summary(),
            kind: alert.kind(),
            details: alert.details.clone(),
            timestamp: alert.raised_at,
            alert_id: alert.id.clone(),
            blocks: render_blocks(alert),
        }
    }
}

fn title(kind: AlertKind) -> &'static str {
    match kind {
        AlertKind::Failover => "🔄 FAILOVER DETECTED",
        AlertKind::ErrorRate => "🚨 HIGH ERROR RATE ALERT",
        AlertKind::Recovery => "✅ RECOVERY DETECTED",
    }
}

fn message(details: &AlertDetails) -> String {
    match details {
        AlertDetails::Failover {
            from_pool, to_pool, ..
        } => format!(
            "*Failover Event Detected!*\n\nTraffic has switched from the *{}* pool to the *{}* pool.\n\n_The backup pool is now serving all incoming requests._",
            from_pool.to_uppercase(),
            to_pool.to_uppercase()
        ),
        AlertDetails::ErrorRate {
            rate,
            threshold,
            pool,
            ..
        } => format!(
            "*High Error Rate Detected!*\n\nThe current error rate is *{rate:.2}%* which exceeds the configured threshold of *{threshold}%*.\n\n_The {} pool is returning 5xx errors._",
            pool.to_uppercase()
        ),
        AlertDetails::Recovery { pool, .. } => format!(
            "*Recovery Complete!*\n\nThe *{}* pool is serving traffic again.\n\n_Normal operations resumed._",
            pool.to_uppercase()
        ),
    }
}

fn field_pairs(details: &AlertDetails, window: &WindowStats) -> Vec<(&'static str, String)> {
    match details {
        AlertDetails::Failover {
            from_pool,
            to_pool,
            release,
        } => vec![
            ("From Pool", from_pool.to_uppercase()),
            ("To Pool", to_pool.to_uppercase()),
            ("New Release", release.clone()),
            (
                "Status",
                format!(
                    "⚠️ {} pool unhealthy, {} pool active",
                    from_pool.to_uppercase(),
                    to_pool.to_uppercase()
                ),
            ),
        ],
        AlertDetails::ErrorRate {
            rate,
            threshold,
            window_size,
            errors,
            pool,
        } => vec![
            ("Current Error Rate", format!("🔴 {rate:.2}%")),
            ("Threshold", format!("{threshold}%")),
            ("Window Size", format!("{window_size} requests")),
            (
                "Error Count",
                format!("{errors} errors out of {} requests", window.total),
            ),
            ("Current Pool", pool.to_uppercase()),
        ],
        AlertDetails::Recovery {
            pool,
            release,
            previous_pool,
        } => vec![
            ("Recovered Pool", pool.to_uppercase()),
            ("Release", release.clone()),
            ("Status", "✅ Primary pool healthy and active".to_owned()),
            (
                "Previous State",
                format!("Was using {} as backup", previous_pool.to_uppercase()),
            ),
        ],
    }
}

fn snippet_line(event: &RequestEvent) -> String {
    let marker = if event.is_error() { "🔴" } else { "🟢" };
    let upstream_response_time = event
        .upstream_response_time
        .map_or_else(|| "-".to_owned(), |t| t.to_string());
    format!(
        "{marker} `pool={} release={} status={} upstream_status={} upstream={} request_time={} upstream_response_time={} method={} uri={}`",
        event.pool,
        event.release,
        event.status,
        event.upstream_status,
        event.upstream,
        event.request_time,
        upstream_response_time,
        event.method,
        event.uri,
    )
}

fn render_blocks(alert: &Alert) -> Vec<Value> {
    let mut blocks = vec![
        json!({
            "type": "header",
            "text": { "type": "plain_text", "text": title(alert.kind()), "emoji": true }
        }),
        json!({ "type": "divider" }),
        json!({
            "type": "section",
            "text": { "type": "mrkdwn", "text": message(&alert.details) }
        }),
        json!({ "type": "divider" }),
        json!({
            "type": "section",
            "fields": field_pairs(&alert.details, &alert.window)
                .into_iter()
                .map(|(key, value)| json!({ "type": "mrkdwn", "text": format!("*{key}:*\n{value}") }))
                .collect::<Vec<_>>()
        }),
    ];

    let window = &alert.window;
    if window.total > 0 {
        let marker = if window.above_threshold() { "🔴" } else { "🟢" };
        blocks.push(json!({ "type": "divider" }));
        blocks.push(json!({
            "type": "section",
            "text": {
                "type": "mrkdwn",
                "text": format!(
                    "*📊 Current Error Rate*\n{marker} *{:.2}%* ({}/{} requests in last {} request window)",
                    window.error_rate, window.error_count, window.total, window.capacity
                )
            }
        }));
    }

    let snippet = if alert.snippet.is_empty() {
        "_No matching requests_".to_owned()
    } else {
        alert
            .snippet
            .iter()
            .map(snippet_line)
            .collect::<Vec<_>>()
            .join("\n")
    };
    blocks.push(json!({ "type": "divider" }));
    blocks.push(json!({
        "type": "section",
        "text": { "type": "mrkdwn", "text": format!("*📋 Recent Log Entries*\n{snippet}") }
    }));

    blocks.push(json!({ "type": "divider" }));
    blocks.push(json!({
        "type": "context",
        "elements": [{
            "type": "mrkdwn",
            "text": format!("⏰ *Timestamp:* {}", alert.raised_at.format("%Y-%m-%d %H:%M:%S UTC"))
        }]
    }));

    blocks
}

/// Slack 호환 incoming webhook 전송기
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    /// 웹훅 URL과 요청 타임아웃으로 전송기를 생성합니다.
    ///
    /// # Errors
    ///
    /// HTTP 클라이언트 생성에 실패하면 에러를 반환합니다.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, LogPipelineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LogPipelineError::Notify(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl Notifier for WebhookNotifier {
    async fn notify(&self, payload: &AlertPayload) -> Result<(), LogPipelineError> {
        // 웹훅 URL에는 토큰이 들어 있으므로 에러 메시지에서 제거
        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| LogPipelineError::Notify(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LogPipelineError::Notify(format!(
                "webhook responded with HTTP {status}"
            )));
        }
        Ok(())
    }
}

/// 테스트용 메모리 전송기
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MockNotifier {
    sent: std::sync::Arc<std::sync::Mutex<Vec<AlertPayload>>>,
    attempts: std::sync::Arc<std::sync::atomic::AtomicUsize>,
    failure: Option<String>,
}

#[cfg(test)]
impl MockNotifier {
    /// 모든 전송을 실패시킵니다.
    pub fn with_failure(mut self, reason: &str) -> Self {
        self.failure = Some(reason.to_owned());
        self
    }

    /// 성공한 전송 목록
    pub fn sent(&self) -> Vec<AlertPayload> {
        self.sent.lock().unwrap().clone()
    }

    /// 전송 시도 횟수
    pub fn attempts(&self) -> usize {
        self.attempts.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl Notifier for MockNotifier {
    async fn notify(&self, payload: &AlertPayload) -> Result<(), LogPipelineError> {
        self.attempts
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if let Some(reason) = &self.failure {
            return Err(LogPipelineError::Notify(reason.clone()));
        }
        self.sent.lock().unwrap().push(payload.clone());
        Ok(())
    }
}
