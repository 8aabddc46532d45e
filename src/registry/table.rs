use std::collections::HashMap;

use crate::registry::job::{Job, JobId, JobStatus, Outcome};

/// Job records plus the counter that names them.
///
/// Not synchronized on its own; [`JobRegistry`](super::JobRegistry) wraps it
/// in a single reader/writer lock so that id allocation and record updates
/// share one critical section.
#[derive(Debug)]
pub struct JobTable {
    jobs: HashMap<JobId, Job>,
    next_id: u64,
}

impl Default for JobTable {
    fn default() -> Self {
        Self::new()
    }
}

impl JobTable {
    pub fn new() -> Self {
        Self {
            jobs: HashMap::new(),
            next_id: 1,
        }
    }

    /// Issue a fresh identifier. Identifiers are never reissued, even if
    /// the job they were meant for fails to start.
    pub fn next_id(&mut self) -> JobId {
        let id = self.next_id;
        self.next_id += 1;
        id.to_string()
    }

    /// Register a job. Returns false if the id is already taken.
    pub fn insert(&mut self, job: Job) -> bool {
        if self.jobs.contains_key(&job.id) {
            return false;
        }
        self.jobs.insert(job.id.clone(), job);
        true
    }

    pub fn get(&self, id: &str) -> Option<&Job> {
        self.jobs.get(id)
    }

    /// Move a running job to its terminal state.
    ///
    /// Returns false for unknown ids and for jobs that are no longer
    /// `Running`; neither case modifies the table.
    pub fn finalize(&mut self, id: &str, outcome: Outcome) -> bool {
        match self.jobs.get_mut(id) {
            Some(job) => job.finish(outcome),
            None => false,
        }
    }

    pub fn running_count(&self) -> usize {
        self.jobs
            .values()
            .filter(|j| j.status == JobStatus::Running)
            .count()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
