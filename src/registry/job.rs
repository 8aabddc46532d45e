use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Opaque job identifier, unique for the lifetime of a registry.
pub type JobId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Running,
    Succeeded,
    Failed,
    Stopped,
}

impl JobStatus {
    /// Terminal statuses are absorbing: once reached, a job never changes again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Running => write!(f, "Running"),
            JobStatus::Succeeded => write!(f, "Succeeded"),
            JobStatus::Failed => write!(f, "Failed"),
            JobStatus::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Everything a supervisor learns when its process terminates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub status: JobStatus,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// One spawned process instance, owned by the registry.
#[derive(Debug)]
pub struct Job {
    pub id: JobId,
    pub command: String,
    pub args: Vec<String>,
    pub status: JobStatus,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    cancel: CancellationToken,
}

impl Job {
    pub fn new(id: JobId, command: String, args: Vec<String>, cancel: CancellationToken) -> Self {
        Self {
            id,
            command,
            args,
            status: JobStatus::Running,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            started_at: Utc::now(),
            finished_at: None,
            cancel,
        }
    }

    /// Handle that asks the job's supervisor to terminate the process.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Apply the terminal outcome. Returns false, leaving the job untouched,
    /// if it already left `Running`.
    pub(crate) fn finish(&mut self, outcome: Outcome) -> bool {
        if self.status.is_terminal() || !outcome.status.is_terminal() {
            return false;
        }
        self.status = outcome.status;
        self.exit_code = outcome.exit_code;
        self.stdout = outcome.stdout;
        self.stderr = outcome.stderr;
        self.finished_at = Some(Utc::now());
        true
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id.clone(),
            command: self.command.clone(),
            args: self.args.clone(),
            status: self.status,
            exit_code: self.exit_code,
            stdout: self.stdout.clone(),
            stderr: self.stderr.clone(),
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

/// Point-in-time copy of a job, taken under the registry lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub command: String,
    pub args: Vec<String>,
    pub status: JobStatus,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}
