//! Core job API consumed by the transport layer.
//!
//! Performs no authentication; anything holding a [`JobService`] is trusted.

use std::sync::Arc;

use serde::Serialize;

use crate::config::LauncherConfig;
use crate::error::Result;
use crate::registry::{JobId, JobRegistry, JobSnapshot, JobStatus};
use crate::worker::JobLauncher;

/// Captured output of a job. Both streams stay empty until it terminates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Start, inspect and stop jobs backed by one [`JobRegistry`].
#[derive(Debug, Clone)]
pub struct JobService {
    registry: Arc<JobRegistry>,
    launcher: JobLauncher,
}

impl JobService {
    pub fn new(config: LauncherConfig) -> Self {
        let registry = Arc::new(JobRegistry::new());
        Self {
            launcher: JobLauncher::new(registry.clone(), config),
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Launch a process. Returns as soon as it has started.
    pub async fn start_job(&self, command: &str, args: &[String]) -> Result<JobId> {
        self.launcher.launch(command, args).await
    }

    pub async fn status(&self, id: &str) -> Result<JobStatus> {
        Ok(self.registry.snapshot(id).await?.status)
    }

    pub async fn output(&self, id: &str) -> Result<JobOutput> {
        let snap = self.registry.snapshot(id).await?;
        Ok(JobOutput {
            stdout: snap.stdout,
            stderr: snap.stderr,
        })
    }

    /// Full record, including exit code and timestamps.
    pub async fn job(&self, id: &str) -> Result<JobSnapshot> {
        self.registry.snapshot(id).await
    }

    /// Ask a job to stop.
    ///
    /// Only signals the job's supervisor, which terminates the process and
    /// records `Stopped`. Stopping a job twice, or one that already
    /// finished, succeeds and changes nothing.
    pub async fn stop_job(&self, id: &str) -> Result<()> {
        let token = self.registry.cancel_token(id).await?;
        if token.is_cancelled() {
            tracing::debug!(job_id = %id, "Stop already requested");
        } else {
            tracing::info!(job_id = %id, "Stop requested");
            token.cancel();
        }
        Ok(())
    }
}
