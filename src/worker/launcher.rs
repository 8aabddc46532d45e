use std::process::Stdio;
use std::sync::Arc;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::config::LauncherConfig;
use crate::error::{JobError, Result};
use crate::registry::{Job, JobId, JobRegistry};
use crate::worker::supervisor::Supervisor;

/// Spawns job processes and hands each one to its own [`Supervisor`].
#[derive(Debug, Clone)]
pub struct JobLauncher {
    registry: Arc<JobRegistry>,
    config: LauncherConfig,
}

impl JobLauncher {
    pub fn new(registry: Arc<JobRegistry>, config: LauncherConfig) -> Self {
        Self { registry, config }
    }

    /// Start `command` with `args` and return its job id once the process
    /// is running. Completion is tracked in the background.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::StartFailure`] if the process cannot be spawned
    /// (missing executable, permission denied, ...). No job is registered
    /// in that case.
    pub async fn launch(&self, command: &str, args: &[String]) -> Result<JobId> {
        let id = self.registry.allocate_id().await;
        let cancel = CancellationToken::new();

        let mut cmd = Command::new(command);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so a stop reaches everything the job forked.
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn().map_err(|source| {
            tracing::warn!(job_id = %id, command, error = %source, "Failed to start job");
            JobError::StartFailure {
                command: command.to_string(),
                source,
            }
        })?;

        let pid = child.id();
        let job = Job::new(id.clone(), command.to_string(), args.to_vec(), cancel.clone());
        self.registry.insert(job).await;

        tracing::info!(job_id = %id, command, args = ?args, pid = ?pid, "Job started");

        let supervisor = Supervisor::new(
            id.clone(),
            child,
            cancel,
            self.registry.clone(),
            self.config.stop_grace_period(),
        );
        tokio::spawn(supervisor.run());

        Ok(id)
    }
}
