//! Run an orchestrator in the background with a test-controlled shutdown.

use std::time::Duration;

use poolwatch_core::config::PoolwatchConfig;
use poolwatch_daemon::orchestrator::Orchestrator;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A running daemon.
pub struct RunningDaemon {
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<(Orchestrator, anyhow::Result<()>)>,
}

#[allow(dead_code)]
impl RunningDaemon {
    /// Build the orchestrator from `config` and start it.
    pub fn spawn(config: PoolwatchConfig) -> Self {
        let orchestrator = Orchestrator::build_from_config(config)
            .expect("orchestrator should build")
            .with_health_interval(Duration::from_millis(50));
        Self::spawn_orchestrator(orchestrator)
    }

    pub fn spawn_orchestrator(mut orchestrator: Orchestrator) -> Self {
        let (stop, stop_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let result = orchestrator
                .run_until(async move {
                    let _ = stop_rx.await;
                    "test shutdown"
                })
                .await;
            (orchestrator, result)
        });
        Self {
            stop: Some(stop),
            handle,
        }
    }

    /// Request shutdown and wait for `run_until` to return.
    pub async fn shutdown(mut self) -> (Orchestrator, anyhow::Result<()>) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        tokio::time::timeout(Duration::from_secs(10), self.handle)
            .await
            .expect("daemon should stop within 10s")
            .expect("daemon task should not panic")
    }

    /// Wait for the daemon to return on its own (fatal error path).
    pub async fn join(self, timeout: Duration) -> (Orchestrator, anyhow::Result<()>) {
        tokio::time::timeout(timeout, self.handle)
            .await
            .expect("daemon should exit on its own")
            .expect("daemon task should not panic")
    }
}

/// Give the tailer time to pick up appended lines.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(300)).await;
}
