//! 파이프라인 오케스트레이션 -- 수집/파싱/분석/알림의 전체 흐름을 관리합니다.
//!
//! [`LogPipeline`]은 core의 [`Pipeline`](poolwatch_core::pipeline::Pipeline) trait을 구현하여
//! `poolwatch-daemon`에서 start/stop/health_check 생명주기로 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! LogTailer task -> mpsc(RawLog) -> processing task
//!                                   AccessLogParser -> AlertEngine -> AlertDispatcher -> Notifier
//!                                                                          |
//!                                                                     BreachStore
//! ```
//!
//! 처리 태스크는 엔진과 전송기를 단독으로 소유하고, 정지 시 파이프라인에 돌려줍니다.
//! 따라서 재시작해도 윈도우, failover 상태, 쿨다운이 유지됩니다.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use poolwatch_core::error::{PipelineError, PoolwatchError};
use poolwatch_core::metrics as m;
use poolwatch_core::pipeline::{HealthStatus, Pipeline};

use crate::alert::{AlertDispatcher, DispatchOutcome};
use crate::breach_store::BreachStore;
use crate::collector::{LogTailer, RawLog};
use crate::config::PipelineConfig;
use crate::engine::AlertEngine;
use crate::error::LogPipelineError;
use crate::maintenance::MaintenanceGate;
use crate::notifier::Notifier;
use crate::parser::AccessLogParser;

/// 파이프라인 실행 상태
#[derive(Debug, Clone, PartialEq, Eq)]
enum PipelineState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 태스크 간 공유 카운터
#[derive(Debug, Default)]
struct PipelineShared {
    processed: AtomicU64,
    parse_errors: AtomicU64,
    alerts_sent: AtomicU64,
    alerts_suppressed: AtomicU64,
    alerts_failed: AtomicU64,
    fatal: OnceLock<String>,
}

/// 처리 태스크가 소유하는 상태
struct Processor<N> {
    parser: AccessLogParser,
    engine: AlertEngine,
    dispatcher: AlertDispatcher<N>,
}

impl<N: Notifier> Processor<N> {
    async fn run(mut self, mut rx: mpsc::Receiver<RawLog>, shared: Arc<PipelineShared>) -> Self {
        // tailer가 송신 측을 닫을 때까지 남은 라인을 모두 처리한다
        while let Some(raw) = rx.recv().await {
            self.handle(raw, &shared).await;
        }
        debug!("processing task drained");
        self
    }

    async fn handle(&mut self, raw: RawLog, shared: &PipelineShared) {
        let event = match self.parser.parse_line(&raw.data) {
            Ok(event) => event,
            Err(e) => {
                shared.parse_errors.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(m::LOG_PIPELINE_PARSE_ERRORS_TOTAL).increment(1);
                debug!(source = %raw.source, error = %e, "skipping malformed log line");
                return;
            }
        };

        shared.processed.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(m::LOG_PIPELINE_LINES_PROCESSED_TOTAL).increment(1);

        let now = chrono::Utc::now();
        for alert in self.engine.process(event, now) {
            let counter = match self.dispatcher.dispatch(&alert, now).await {
                DispatchOutcome::Sent => &shared.alerts_sent,
                DispatchOutcome::SendFailed => &shared.alerts_failed,
                DispatchOutcome::SuppressedMaintenance | DispatchOutcome::SuppressedCooldown { .. } => {
                    &shared.alerts_suppressed
                }
            };
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// 로그 파이프라인
///
/// # 사용 예시
/// ```ignore
/// use poolwatch_log_pipeline::{LogPipelineBuilder, WebhookNotifier};
///
/// let notifier = WebhookNotifier::new(&config.webhook_url, config.request_timeout())?;
/// let mut pipeline = LogPipelineBuilder::new()
///     .config(config)
///     .notifier(notifier)
///     .build()?;
///
/// pipeline.start().await?;
/// ```
pub struct LogPipeline<N: Notifier> {
    config: PipelineConfig,
    state: PipelineState,
    processor: Option<Processor<N>>,
    shared: Arc<PipelineShared>,
    cancel: CancellationToken,
    failed: CancellationToken,
    tailer_task: Option<JoinHandle<()>>,
    processor_task: Option<JoinHandle<Processor<N>>>,
}

impl<N: Notifier> LogPipeline<N> {
    /// 현재 상태를 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }

    /// 파이프라인 설정
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// 파싱에 성공한 레코드 수
    pub fn processed_count(&self) -> u64 {
        self.shared.processed.load(Ordering::Relaxed)
    }

    /// 파싱 에러 수
    pub fn parse_error_count(&self) -> u64 {
        self.shared.parse_errors.load(Ordering::Relaxed)
    }

    /// 전송에 성공한 알림 수
    pub fn alerts_sent_count(&self) -> u64 {
        self.shared.alerts_sent.load(Ordering::Relaxed)
    }

    /// 유지보수 모드나 쿨다운으로 억제된 알림 수
    pub fn alerts_suppressed_count(&self) -> u64 {
        self.shared.alerts_suppressed.load(Ordering::Relaxed)
    }

    /// 전송에 실패한 알림 수
    pub fn alerts_failed_count(&self) -> u64 {
        self.shared.alerts_failed.load(Ordering::Relaxed)
    }

    /// 복구 불가능한 에러로 멈췄을 때 취소되는 토큰
    ///
    /// 데몬은 종료 시그널과 함께 이 토큰을 기다립니다.
    pub fn failure_token(&self) -> CancellationToken {
        self.failed.clone()
    }

    /// 파이프라인을 멈춘 복구 불가능한 에러
    pub fn fatal_error(&self) -> Option<&str> {
        self.shared.fatal.get().map(String::as_str)
    }
}

impl<N: Notifier> Pipeline for LogPipeline<N> {
    async fn start(&mut self) -> Result<(), PoolwatchError> {
        if self.state == PipelineState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }
        if self.fatal_error().is_some() {
            return Err(PipelineError::InitFailed(
                "pipeline stopped after a fatal error and cannot be restarted".to_owned(),
            )
            .into());
        }
        let processor = self.processor.take().ok_or_else(|| {
            PipelineError::InitFailed("processing state was lost by a previous run".to_owned())
        })?;

        info!(log_file = %self.config.log_file.display(), "starting log pipeline");

        self.cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(self.config.channel_capacity);

        let tailer = LogTailer::new(self.config.tailer_config());
        let cancel = self.cancel.clone();
        let failed = self.failed.clone();
        let shared = Arc::clone(&self.shared);
        self.tailer_task = Some(tokio::spawn(async move {
            if let Err(e) = tailer.run(tx, cancel).await {
                error!(error = %e, "log tailer failed, pipeline cannot continue");
                let _ = shared.fatal.set(e.to_string());
                failed.cancel();
            }
        }));

        self.processor_task = Some(tokio::spawn(
            processor.run(rx, Arc::clone(&self.shared)),
        ));

        self.state = PipelineState::Running;
        info!("log pipeline started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), PoolwatchError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        info!("stopping log pipeline");
        self.cancel.cancel();

        if let Some(task) = self.tailer_task.take()
            && let Err(e) = task.await
        {
            error!(error = %e, "log tailer task panicked");
        }

        if let Some(task) = self.processor_task.take() {
            match task.await {
                Ok(processor) => self.processor = Some(processor),
                Err(e) => error!(error = %e, "processing task panicked"),
            }
        }

        self.state = PipelineState::Stopped;
        info!(
            processed = self.processed_count(),
            parse_errors = self.parse_error_count(),
            alerts_sent = self.alerts_sent_count(),
            "log pipeline stopped"
        );
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PipelineState::Running => {
                if let Some(reason) = self.fatal_error() {
                    return HealthStatus::Unhealthy(reason.to_owned());
                }
                if self
                    .processor_task
                    .as_ref()
                    .is_none_or(JoinHandle::is_finished)
                {
                    return HealthStatus::Unhealthy("processing task exited".to_owned());
                }
                if self.alerts_failed_count() > 0 && self.alerts_sent_count() == 0 {
                    return HealthStatus::Degraded("webhook deliveries are failing".to_owned());
                }
                HealthStatus::Healthy
            }
            PipelineState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            PipelineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 로그 파이프라인 빌더
pub struct LogPipelineBuilder<N> {
    config: PipelineConfig,
    notifier: Option<N>,
}

impl<N: Notifier> LogPipelineBuilder<N> {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            notifier: None,
        }
    }

    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// 알림 전송기를 지정합니다.
    pub fn notifier(mut self, notifier: N) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// 파이프라인을 빌드합니다.
    ///
    /// # Errors
    ///
    /// 설정이 유효하지 않거나 전송기가 지정되지 않으면 에러를 반환합니다.
    pub fn build(self) -> Result<LogPipeline<N>, LogPipelineError> {
        self.config.validate()?;
        let notifier = self.notifier.ok_or_else(|| LogPipelineError::Config {
            field: "notifier".to_owned(),
            reason: "a notifier is required".to_owned(),
        })?;

        let config = self.config;
        let engine = AlertEngine::new(
            config.window_size,
            config.min_samples,
            config.error_rate_threshold,
            config.cooldown(),
        )?;
        let dispatcher = AlertDispatcher::new(
            notifier,
            MaintenanceGate::new(config.maintenance_mode, &config.maintenance_flag_file),
            config.cooldown(),
            BreachStore::new(&config.breach_store_path),
        );
        let parser = AccessLogParser::new(config.known_pools.clone());

        Ok(LogPipeline {
            config,
            state: PipelineState::Initialized,
            processor: Some(Processor {
                parser,
                engine,
                dispatcher,
            }),
            shared: Arc::new(PipelineShared::default()),
            cancel: CancellationToken::new(),
            failed: CancellationToken::new(),
            tailer_task: None,
            processor_task: None,
        })
    }
}

impl<N: Notifier> Default for LogPipelineBuilder<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PipelineConfigBuilder, StartPosition};
    use crate::notifier::MockNotifier;
    use std::io::Write;
    use std::time::Duration;

    fn config(dir: &std::path::Path) -> PipelineConfig {
        PipelineConfigBuilder::new()
            .log_file(dir.join("access.log"))
            .known_pools(vec!["blue".to_owned(), "green".to_owned()])
            .window_size(10)
            .poll_interval_ms(10)
            .start_from(StartPosition::Beginning)
            .open_retry(3, 10, 20)
            .maintenance_flag_file(dir.join("maintenance.flag"))
            .breach_store_path(dir.join("breaches.log"))
            .build()
            .unwrap()
    }

    fn line(pool: &str, status: u16) -> String {
        format!(
            "pool={pool} release={pool}-v1 status={status} upstream_status={status} upstream=172.18.0.3:3000 request_time=0.004 upstream_response_time=0.003 method=GET uri=/version time=2025-10-30T12:00:00+00:00\n"
        )
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not met in time");
    }

    #[test]
    fn builder_requires_notifier() {
        let result = LogPipelineBuilder::<MockNotifier>::new().build();
        assert!(matches!(result, Err(LogPipelineError::Config { .. })));
    }

    #[test]
    fn builder_with_invalid_config_fails() {
        let config = PipelineConfig {
            window_size: 0,
            ..Default::default()
        };
        let result = LogPipelineBuilder::new()
            .config(config)
            .notifier(MockNotifier::default())
            .build();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn pipeline_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("access.log"), b"").unwrap();
        let mut pipeline = LogPipelineBuilder::new()
            .config(config(dir.path()))
            .notifier(MockNotifier::default())
            .build()
            .unwrap();

        assert_eq!(pipeline.state_name(), "initialized");
        assert!(pipeline.health_check().await.is_unhealthy());
        assert!(pipeline.stop().await.is_err());

        pipeline.start().await.unwrap();
        assert_eq!(pipeline.state_name(), "running");
        assert!(pipeline.start().await.is_err());
        assert!(pipeline.health_check().await.is_healthy());

        pipeline.stop().await.unwrap();
        assert_eq!(pipeline.state_name(), "stopped");
        assert!(pipeline.health_check().await.is_unhealthy());

        // 정지 후 재시작 가능
        pipeline.start().await.unwrap();
        pipeline.stop().await.unwrap();
    }

    #[tokio::test]
    async fn processes_lines_and_counts_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("access.log");
        std::fs::write(&log, b"").unwrap();
        let notifier = MockNotifier::default();
        let mut pipeline = LogPipelineBuilder::new()
            .config(config(dir.path()))
            .notifier(notifier.clone())
            .build()
            .unwrap();
        pipeline.start().await.unwrap();

        {
            let mut file = std::fs::OpenOptions::new().append(true).open(&log).unwrap();
            file.write_all(line("blue", 200).as_bytes()).unwrap();
            file.write_all(b"garbage without fields\n").unwrap();
            file.write_all(line("green", 200).as_bytes()).unwrap();
        }

        wait_until(|| pipeline.processed_count() == 2).await;
        pipeline.stop().await.unwrap();

        assert_eq!(pipeline.parse_error_count(), 1);
        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, poolwatch_core::types::AlertKind::Failover);
        assert_eq!(pipeline.alerts_sent_count(), 1);
    }

    #[tokio::test]
    async fn missing_log_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = LogPipelineBuilder::new()
            .config(config(dir.path()))
            .notifier(MockNotifier::default())
            .build()
            .unwrap();
        pipeline.start().await.unwrap();

        let failed = pipeline.failure_token();
        tokio::time::timeout(Duration::from_secs(5), failed.cancelled())
            .await
            .unwrap();

        assert!(pipeline.fatal_error().unwrap().contains("access.log"));
        assert!(pipeline.health_check().await.is_unhealthy());
        pipeline.stop().await.unwrap();
        assert!(pipeline.start().await.is_err());
    }
}
