pub mod job;
pub mod shared;
pub mod table;

pub use job::{Job, JobId, JobSnapshot, JobStatus, Outcome};
pub use shared::JobRegistry;
pub use table::JobTable;
