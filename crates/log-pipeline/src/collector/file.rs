//! 파일 기반 로그 수집기
//!
//! 로그 파일을 감시하며 새로운 라인이 추가되면 수집합니다.
//! `tail -F -n 0`과 유사한 동작을 바이트 오프셋 추적으로 구현합니다.
//!
//! # 로테이션 감지
//! - 경로의 파일 식별자(dev + inode) 변경 감지 (logrotate 등)
//!   -> 기존 핸들에 남은 데이터를 읽은 뒤 새 파일을 오프셋 0부터 읽습니다.
//! - 파일 크기가 현재 오프셋보다 작아짐 (truncation) -> 오프셋 0으로 되돌립니다.
//! - 경로에서 파일이 사라짐 -> 제한된 백오프로 새 파일을 기다립니다.
//!
//! # 라인 조립
//! 줄바꿈으로 끝난 완전한 라인만 내보냅니다. 마지막 불완전 라인은 다음 폴링까지
//! 보관하며, `max_line_length`를 넘는 라인은 경고와 함께 버립니다.

use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use poolwatch_core::metrics as m;

use super::{CollectorStatus, RawLog};
use crate::config::StartPosition;
use crate::error::LogPipelineError;

/// 한 번의 폴링에서 읽는 최대 바이트 수
const MAX_READ_PER_POLL: usize = 8 * 1024 * 1024;

/// 읽기 버퍼 크기
const READ_CHUNK: usize = 64 * 1024;

/// tailer 설정
#[derive(Debug, Clone)]
pub struct TailerConfig {
    /// 감시할 파일 경로
    pub path: PathBuf,
    /// 파일 상태 체크 주기
    pub poll_interval: Duration,
    /// 처음 열 때의 읽기 시작 위치
    pub start_from: StartPosition,
    /// 파일 열기 최대 시도 횟수
    pub max_open_retries: u32,
    /// 첫 재시도 대기 시간
    pub initial_backoff: Duration,
    /// 재시도 대기 시간 상한
    pub max_backoff: Duration,
    /// 최대 라인 길이 (바이트)
    pub max_line_length: usize,
}

impl Default for TailerConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/log/nginx/access.log"),
            poll_interval: Duration::from_millis(250),
            start_from: StartPosition::End,
            max_open_retries: 60,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(5),
            max_line_length: 16 * 1024,
        }
    }
}

/// 파일 식별자 (Unix 전용, 다른 플랫폼에서는 크기 비교만 사용)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileIdentity {
    dev: u64,
    ino: u64,
}

impl FileIdentity {
    #[cfg(unix)]
    fn of(meta: &std::fs::Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self {
            dev: meta.dev(),
            ino: meta.ino(),
        })
    }

    #[cfg(not(unix))]
    fn of(_meta: &std::fs::Metadata) -> Option<Self> {
        None
    }
}

/// 청크 단위 입력을 완전한 라인으로 조립합니다.
#[derive(Debug)]
struct LineAssembler {
    /// 아직 줄바꿈을 보지 못한 마지막 부분 라인
    carry: Vec<u8>,
    /// 길이 초과 라인의 나머지를 버리는 중
    discarding: bool,
    max_line_length: usize,
}

impl LineAssembler {
    fn new(max_line_length: usize) -> Self {
        Self {
            carry: Vec::new(),
            discarding: false,
            max_line_length,
        }
    }

    fn push(&mut self, chunk: &[u8], lines: &mut Vec<Bytes>) {
        let mut start = 0;
        for (pos, byte) in chunk.iter().enumerate() {
            if *byte != b'\n' {
                continue;
            }
            let segment = &chunk[start..pos];
            start = pos + 1;

            if self.discarding {
                self.discarding = false;
                self.carry.clear();
                continue;
            }
            self.carry.extend_from_slice(segment);
            self.emit(lines);
        }

        if !self.discarding {
            self.carry.extend_from_slice(&chunk[start..]);
            if self.carry.len() > self.max_line_length {
                warn!(
                    length = self.carry.len(),
                    max = self.max_line_length,
                    "log line exceeds max length, dropping"
                );
                self.carry.clear();
                self.discarding = true;
            }
        }
    }

    fn emit(&mut self, lines: &mut Vec<Bytes>) {
        let mut line = std::mem::take(&mut self.carry);
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        if line.len() > self.max_line_length {
            warn!(
                length = line.len(),
                max = self.max_line_length,
                "log line exceeds max length, dropping"
            );
            return;
        }
        if !line.is_empty() {
            lines.push(Bytes::from(line));
        }
    }

    /// 불완전 라인을 버립니다. 버린 바이트 수를 반환합니다.
    fn reset(&mut self) -> usize {
        let dropped = self.carry.len();
        self.carry.clear();
        self.discarding = false;
        dropped
    }

    fn pending(&self) -> usize {
        self.carry.len()
    }
}

/// 파일 기반 로그 수집기
///
/// 하나의 파일을 주기적으로 폴링하여 새로 추가된 라인을 수집합니다.
/// 파일 로테이션(inode 변경, truncation)을 자동 감지합니다.
pub struct LogTailer {
    /// 수집기 설정
    config: TailerConfig,
    /// 현재 열린 파일 핸들
    file: Option<File>,
    /// 열린 파일의 식별자
    identity: Option<FileIdentity>,
    /// 다음 읽기 위치 (바이트 오프셋)
    offset: u64,
    /// 라인 조립기
    assembler: LineAssembler,
    /// 현재 상태
    status: CollectorStatus,
}

impl LogTailer {
    /// 새 tailer를 생성합니다. 파일은 [`open`](Self::open) 또는 [`run`](Self::run)에서 엽니다.
    pub fn new(config: TailerConfig) -> Self {
        let assembler = LineAssembler::new(config.max_line_length);
        Self {
            config,
            file: None,
            identity: None,
            offset: 0,
            assembler,
            status: CollectorStatus::Idle,
        }
    }

    /// 현재 상태를 반환합니다.
    pub fn status(&self) -> &CollectorStatus {
        &self.status
    }

    /// 현재 읽기 오프셋을 반환합니다.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// 수집 소스 식별자
    pub fn source(&self) -> String {
        format!("file:{}", self.config.path.display())
    }

    /// 설정된 시작 위치로 파일을 엽니다.
    ///
    /// 파일이 없으면 지수 백오프로 기다리며, `max_open_retries`번 시도 후에도
    /// 열 수 없으면 [`LogPipelineError::SourceUnavailable`]을 반환합니다.
    pub async fn open(&mut self) -> Result<(), LogPipelineError> {
        self.wait_and_open(self.config.start_from).await
    }

    async fn wait_and_open(&mut self, position: StartPosition) -> Result<(), LogPipelineError> {
        let path = self.config.path.clone();
        let attempts = self.config.max_open_retries.max(1);
        let mut backoff = self.config.initial_backoff;

        for attempt in 1..=attempts {
            match self.open_at(position).await {
                Ok(()) => {
                    self.status = CollectorStatus::Running;
                    info!(
                        path = %path.display(),
                        offset = self.offset,
                        attempt,
                        "log file opened"
                    );
                    return Ok(());
                }
                Err(e) => {
                    self.status = CollectorStatus::Waiting;
                    if e.kind() == std::io::ErrorKind::NotFound {
                        debug!(path = %path.display(), attempt, "log file not found, waiting");
                    } else {
                        warn!(path = %path.display(), attempt, error = %e, "failed to open log file, retrying");
                    }
                }
            }

            if attempt < attempts {
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(self.config.max_backoff);
            }
        }

        self.status = CollectorStatus::Error("source unavailable".to_owned());
        Err(LogPipelineError::SourceUnavailable {
            path: path.display().to_string(),
            attempts,
        })
    }

    async fn open_at(&mut self, position: StartPosition) -> std::io::Result<()> {
        let mut file = File::open(&self.config.path).await?;
        let meta = file.metadata().await?;
        let offset = match position {
            StartPosition::End => file.seek(SeekFrom::End(0)).await?,
            StartPosition::Beginning => 0,
        };
        self.identity = FileIdentity::of(&meta);
        self.offset = offset;
        self.file = Some(file);
        self.assembler.reset();
        Ok(())
    }

    /// 마지막 읽기 이후 추가된 완전한 라인을 읽습니다.
    ///
    /// 로테이션을 감지하면 기존 핸들을 끝까지 읽은 뒤 새 파일을 처음부터 엽니다.
    /// 파일이 사라졌다면 새 파일이 생길 때까지 제한된 백오프로 기다립니다.
    pub async fn poll(&mut self) -> Result<Vec<Bytes>, LogPipelineError> {
        let mut lines = Vec::new();

        if self.file.is_none() {
            self.wait_and_open(StartPosition::Beginning).await?;
        }

        match tokio::fs::metadata(&self.config.path).await {
            Ok(meta) => {
                let current = FileIdentity::of(&meta);
                if current.is_some() && self.identity.is_some() && current != self.identity {
                    self.read_available(&mut lines).await?;
                    self.discard_partial("rotation");
                    info!(path = %self.config.path.display(), "log rotation detected, reopening");
                    metrics::counter!(m::LOG_PIPELINE_ROTATIONS_TOTAL).increment(1);
                    if let Err(e) = self.open_at(StartPosition::Beginning).await {
                        warn!(error = %e, "rotated log file not ready yet");
                        self.file = None;
                        return Ok(lines);
                    }
                } else if meta.len() < self.offset {
                    warn!(
                        path = %self.config.path.display(),
                        size = meta.len(),
                        offset = self.offset,
                        "log truncation detected, resetting offset"
                    );
                    metrics::counter!(m::LOG_PIPELINE_ROTATIONS_TOTAL).increment(1);
                    self.discard_partial("truncation");
                    if let Some(file) = self.file.as_mut() {
                        file.seek(SeekFrom::Start(0)).await?;
                    }
                    self.offset = 0;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // 이동된 파일의 남은 데이터만 읽고 새 파일을 기다립니다.
                self.read_available(&mut lines).await?;
                self.discard_partial("file removed");
                info!(path = %self.config.path.display(), "log file moved away, waiting for new file");
                self.file = None;
                self.identity = None;
                return Ok(lines);
            }
            Err(e) => {
                warn!(path = %self.config.path.display(), error = %e, "failed to stat log file");
            }
        }

        self.read_available(&mut lines).await?;
        Ok(lines)
    }

    async fn read_available(&mut self, lines: &mut Vec<Bytes>) -> Result<(), LogPipelineError> {
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };

        let mut buf = vec![0u8; READ_CHUNK];
        let mut total = 0usize;
        while total < MAX_READ_PER_POLL {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            total += n;
            self.offset += n as u64;
            self.assembler.push(&buf[..n], lines);
        }
        Ok(())
    }

    fn discard_partial(&mut self, reason: &str) {
        let dropped = self.assembler.reset();
        if dropped > 0 {
            debug!(bytes = dropped, reason, "discarding incomplete trailing line");
        }
    }

    /// 취소될 때까지 파일을 폴링하며 라인을 채널로 보냅니다.
    ///
    /// 수신 측이 닫히면 정상 종료합니다. 로그 파일을 재시도 예산 안에 열 수 없으면
    /// [`LogPipelineError::SourceUnavailable`]을 반환하며, 이는 복구 불가능한 에러입니다.
    pub async fn run(
        mut self,
        tx: mpsc::Sender<RawLog>,
        cancel: CancellationToken,
    ) -> Result<(), LogPipelineError> {
        let source = self.source();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.status = CollectorStatus::Stopped;
                return Ok(());
            }
            result = self.open() => result?,
        }

        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        'outer: loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            let polled = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                polled = self.poll() => polled,
            };

            let lines = match polled {
                Ok(lines) => lines,
                Err(e @ LogPipelineError::SourceUnavailable { .. }) => {
                    self.status = CollectorStatus::Error(e.to_string());
                    return Err(e);
                }
                Err(e) => {
                    warn!(source = %source, error = %e, "log read failed, retrying next poll");
                    continue;
                }
            };

            if !lines.is_empty() {
                metrics::counter!(m::LOG_PIPELINE_LINES_READ_TOTAL).increment(lines.len() as u64);
            }
            for line in lines {
                if tx.send(RawLog::new(line, source.clone())).await.is_err() {
                    debug!(source = %source, "receiver closed, stopping tailer");
                    break 'outer;
                }
            }
        }

        if self.assembler.pending() > 0 {
            debug!(bytes = self.assembler.pending(), "tailer stopped with incomplete line");
        }
        self.status = CollectorStatus::Stopped;
        info!(source = %source, offset = self.offset, "log tailer stopped");
        Ok(())
    }
}
