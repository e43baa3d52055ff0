//! breach 기록 저장소 (JSON lines)
//!
//! 에러율 임계값 위반을 한 줄에 JSON 객체 하나로 기록합니다.
//! 쓰는 쪽은 파이프라인 하나뿐이고, 외부 도구(`poolwatch breaches ...`)는
//! 파일 전체를 한 번에 읽습니다.
//!
//! - 추가: `O_APPEND`로 한 줄을 한 번에 씁니다.
//! - 비우기: 같은 디렉토리의 빈 임시 파일을 rename으로 덮어씁니다.
//! - 파일이 없으면 빈 기록으로 읽습니다.
//! - 깨진 라인은 경고 후 건너뜁니다.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use poolwatch_core::metrics as m;
use poolwatch_core::types::BreachRecord;

use crate::error::LogPipelineError;
use crate::maintenance::temp_sibling;

/// breach 기록 집계
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BreachStats {
    /// 기록 수
    pub count: usize,
    /// 최소 에러율 (%)
    pub min: Option<f64>,
    /// 평균 에러율 (%)
    pub mean: Option<f64>,
    /// 최대 에러율 (%)
    pub max: Option<f64>,
}

impl BreachStats {
    /// 기록 목록에서 집계를 계산합니다. 기록이 없으면 에러율 값은 모두 `None`입니다.
    pub fn from_records(records: &[BreachRecord]) -> Self {
        if records.is_empty() {
            return Self {
                count: 0,
                min: None,
                mean: None,
                max: None,
            };
        }

        let rates = records.iter().map(|r| r.error_rate);
        let min = rates.clone().fold(f64::INFINITY, f64::min);
        let max = rates.clone().fold(f64::NEG_INFINITY, f64::max);
        let mean = rates.sum::<f64>() / records.len() as f64;

        Self {
            count: records.len(),
            min: Some(min),
            mean: Some(mean),
            max: Some(max),
        }
    }
}

/// breach 기록 저장소
#[derive(Debug, Clone)]
pub struct BreachStore {
    path: PathBuf,
}

impl BreachStore {
    /// 파일 경로로 저장소를 생성합니다. 파일은 첫 기록 시 만들어집니다.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 저장소 파일 경로
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn error(&self, reason: impl std::fmt::Display) -> LogPipelineError {
        LogPipelineError::BreachStore {
            path: self.path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    /// 기록 하나를 추가합니다.
    pub async fn append(&self, record: &BreachRecord) -> Result<(), LogPipelineError> {
        let result = self.append_line(record).await;
        match &result {
            Ok(()) => metrics::counter!(m::BREACH_STORE_RECORDS_TOTAL).increment(1),
            Err(_) => metrics::counter!(m::BREACH_STORE_WRITE_ERRORS_TOTAL).increment(1),
        }
        result
    }

    async fn append_line(&self, record: &BreachRecord) -> Result<(), LogPipelineError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.error(e))?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.error(e))?;
        file.write_all(&line).await.map_err(|e| self.error(e))?;
        file.flush().await.map_err(|e| self.error(e))?;
        Ok(())
    }

    /// 모든 기록을 기록된 순서대로 반환합니다.
    pub async fn list(&self) -> Result<Vec<BreachRecord>, LogPipelineError> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.error(e)),
        };

        let text = String::from_utf8_lossy(&content);
        let mut records = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<BreachRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    path = %self.path.display(),
                    line = idx + 1,
                    error = %e,
                    "skipping malformed breach record"
                ),
            }
        }
        Ok(records)
    }

    /// 가장 최근 `k`개 기록을 오래된 순서로 반환합니다.
    pub async fn recent(&self, k: usize) -> Result<Vec<BreachRecord>, LogPipelineError> {
        let mut records = self.list().await?;
        let skip = records.len().saturating_sub(k);
        records.drain(..skip);
        Ok(records)
    }

    /// 특정 풀의 기록만 반환합니다 (대소문자 무시).
    pub async fn by_pool(&self, pool: &str) -> Result<Vec<BreachRecord>, LogPipelineError> {
        let mut records = self.list().await?;
        records.retain(|r| r.pool.eq_ignore_ascii_case(pool));
        Ok(records)
    }

    /// 에러율 집계를 계산합니다. `pool`이 있으면 해당 풀만 집계합니다.
    pub async fn stats(&self, pool: Option<&str>) -> Result<BreachStats, LogPipelineError> {
        let records = match pool {
            Some(pool) => self.by_pool(pool).await?,
            None => self.list().await?,
        };
        Ok(BreachStats::from_records(&records))
    }

    /// 모든 기록을 지웁니다. 파일은 빈 상태로 남습니다.
    pub async fn clear(&self) -> Result<(), LogPipelineError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.error(e))?;
        }

        let tmp = temp_sibling(&self.path);
        tokio::fs::write(&tmp, b"").await.map_err(|e| self.error(e))?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(self.error(e));
        }
        tracing::info!(path = %self.path.display(), "breach history cleared");
        Ok(())
    }
}
