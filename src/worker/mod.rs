//! Process execution for jobs.
//!
//! - **Launch**: spawns the OS process with piped stdout/stderr and
//!   registers a `Running` job
//! - **Supervise**: one task per job waits for the process to end, either on
//!   its own or because a stop was requested, and finalizes the job
//!
//! # Components
//!
//! - [`JobLauncher`]: spawns processes and starts their supervisors
//! - [`Supervisor`]: waits, captures output, classifies the exit
//! - [`signal`]: SIGTERM then SIGKILL termination of a process group
//!
//! # Stop Flow
//!
//! 1. A stop cancels the job's [`CancellationToken`](tokio_util::sync::CancellationToken)
//! 2. The supervisor observes the token and signals the process group
//! 3. Once the process is reaped the job becomes `Stopped`
//!
//! A process that ignores SIGTERM is killed after the configured grace period.

pub mod launcher;
pub mod signal;
pub mod supervisor;

pub use launcher::JobLauncher;
pub use supervisor::Supervisor;
