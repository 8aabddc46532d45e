use thiserror::Error;

use crate::registry::JobId;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("job not found: {0}")]
    NotFound(JobId),

    #[error("failed to start `{command}`: {source}")]
    StartFailure {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, JobError>;
