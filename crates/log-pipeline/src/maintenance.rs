//! 유지보수 모드 게이트
//!
//! 정적 설정 플래그 또는 sentinel 파일의 존재로 알림 전송을 억제합니다.
//! sentinel 파일은 알림을 결정할 때마다 확인하므로 재시작 없이 켜고 끌 수 있습니다.
//! 정적 플래그는 재시작해야 바뀝니다.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::LogPipelineError;

/// 유지보수 모드 게이트
#[derive(Debug, Clone)]
pub struct MaintenanceGate {
    static_flag: bool,
    sentinel: PathBuf,
}

impl MaintenanceGate {
    /// 새 게이트를 생성합니다.
    pub fn new(static_flag: bool, sentinel: impl Into<PathBuf>) -> Self {
        Self {
            static_flag,
            sentinel: sentinel.into(),
        }
    }

    /// sentinel 파일 경로
    pub fn sentinel_path(&self) -> &Path {
        &self.sentinel
    }

    /// 정적 플래그 값
    pub fn static_flag(&self) -> bool {
        self.static_flag
    }

    /// 알림을 억제해야 하는지 확인합니다.
    pub async fn is_suppressed(&self) -> bool {
        self.static_flag || self.sentinel_present().await
    }

    /// sentinel 파일이 존재하는지 확인합니다.
    ///
    /// 확인 중 I/O 에러가 나면 경고를 남기고 없는 것으로 간주합니다.
    pub async fn sentinel_present(&self) -> bool {
        match tokio::fs::try_exists(&self.sentinel).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(
                    path = %self.sentinel.display(),
                    error = %e,
                    "failed to check maintenance sentinel, treating as absent"
                );
                false
            }
        }
    }

    /// sentinel 파일을 만들어 유지보수 모드를 켭니다.
    ///
    /// 같은 디렉토리의 임시 파일에 쓴 뒤 rename하므로 읽는 쪽은 항상 완전한 파일을 봅니다.
    pub async fn enable(&self, reason: Option<&str>) -> Result<(), LogPipelineError> {
        if let Some(parent) = self.sentinel.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = format!(
            "enabled_at={}\nreason={}\n",
            chrono::Utc::now().to_rfc3339(),
            reason.unwrap_or("-")
        );
        let tmp = temp_sibling(&self.sentinel);
        tokio::fs::write(&tmp, content).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.sentinel).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        info!(path = %self.sentinel.display(), "maintenance mode enabled");
        Ok(())
    }

    /// sentinel 파일을 지워 유지보수 모드를 끕니다. 파일이 없어도 에러가 아닙니다.
    pub async fn disable(&self) -> Result<(), LogPipelineError> {
        match tokio::fs::remove_file(&self.sentinel).await {
            Ok(()) => {
                info!(path = %self.sentinel.display(), "maintenance mode disabled");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// rename 대상과 같은 디렉토리에 있는 임시 파일 경로
pub(crate) fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{}.tmp", uuid::Uuid::new_v4().simple()))
}
