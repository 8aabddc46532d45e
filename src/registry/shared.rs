use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::{JobError, Result};
use crate::registry::job::{Job, JobId, JobSnapshot, Outcome};
use crate::registry::table::JobTable;

/// The authoritative, lock-guarded store of all jobs.
///
/// Constructed once by the service and shared behind an `Arc`. Callers never
/// hold a reference to a [`Job`] outside the lock; reads hand out
/// [`JobSnapshot`] copies instead.
#[derive(Debug, Default)]
pub struct JobRegistry {
    table: RwLock<JobTable>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn allocate_id(&self) -> JobId {
        self.table.write().await.next_id()
    }

    pub async fn insert(&self, job: Job) -> bool {
        let id = job.id.clone();
        let inserted = self.table.write().await.insert(job);
        if !inserted {
            tracing::error!(job_id = %id, "Job id already registered, record dropped");
        }
        inserted
    }

    /// Consistent copy of a job's status, exit code and output.
    pub async fn snapshot(&self, id: &str) -> Result<JobSnapshot> {
        self.table
            .read()
            .await
            .get(id)
            .map(Job::snapshot)
            .ok_or_else(|| JobError::NotFound(id.to_string()))
    }

    pub async fn cancel_token(&self, id: &str) -> Result<CancellationToken> {
        self.table
            .read()
            .await
            .get(id)
            .map(|job| job.cancel_token().clone())
            .ok_or_else(|| JobError::NotFound(id.to_string()))
    }

    /// Record the terminal outcome. A no-op returning false if the job is
    /// unknown or already terminal.
    pub async fn finalize(&self, id: &str, outcome: Outcome) -> bool {
        self.table.write().await.finalize(id, outcome)
    }

    pub async fn running_count(&self) -> usize {
        self.table.read().await.running_count()
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.table.read().await.is_empty()
    }
}
