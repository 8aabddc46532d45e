use std::future::Future;
use std::io;
use std::pin::Pin;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::registry::{JobId, JobRegistry, JobStatus, Outcome};
use crate::worker::signal::{interrupt_group, kill_group, terminate};

type Captured = (io::Result<Vec<u8>>, io::Result<Vec<u8>>);

/// How the process came to an end, as seen by its supervisor.
#[derive(Debug)]
pub(crate) enum Exit {
    /// The process exited on its own, before any stop request reached it.
    Natural(io::Result<ExitStatus>),
    /// A stop request was observed while the job was still running.
    Stopped(io::Result<ExitStatus>),
}

/// Waits for one job's process to end and records the outcome.
///
/// Owns the child and its output pipes. Nothing it encounters is returned to
/// a caller: by the time it runs, the launch request has already been
/// answered, so faults are folded into the job's terminal status.
///
/// A job is running until its process has exited and both output streams
/// are closed. Processes it forked can keep the streams open after the
/// main process is gone, so a stop is honored during either phase.
pub struct Supervisor {
    job_id: JobId,
    child: Child,
    /// Process group of the job. The leader's pid, recorded before reaping.
    pgid: Option<u32>,
    cancel: CancellationToken,
    registry: Arc<JobRegistry>,
    grace: Duration,
    /// Set once a stop has been acted on. Stragglers in the group are killed
    /// when it passes.
    kill_deadline: Option<Instant>,
}

impl Supervisor {
    pub fn new(
        job_id: JobId,
        child: Child,
        cancel: CancellationToken,
        registry: Arc<JobRegistry>,
        grace: Duration,
    ) -> Self {
        let pgid = child.id();
        Self {
            job_id,
            child,
            pgid,
            cancel,
            registry,
            grace,
            kill_deadline: None,
        }
    }

    pub async fn run(mut self) {
        // Drain both pipes while waiting, so a chatty process cannot block
        // on a full pipe buffer.
        let stdout = spawn_capture(self.child.stdout.take());
        let stderr = spawn_capture(self.child.stderr.take());
        let captures = async move { tokio::join!(join_capture(stdout), join_capture(stderr)) };
        tokio::pin!(captures);

        let exit = self.wait_for_exit().await;
        let (exit, (stdout, stderr)) = self.collect_output(exit, captures).await;

        if let Err(e) = &stdout {
            tracing::warn!(job_id = %self.job_id, error = %e, "Failed to capture stdout");
        }
        if let Err(e) = &stderr {
            tracing::warn!(job_id = %self.job_id, error = %e, "Failed to capture stderr");
        }
        if let Exit::Natural(Err(e)) | Exit::Stopped(Err(e)) = &exit {
            tracing::warn!(job_id = %self.job_id, error = %e, "Failed to wait for process");
        }

        let outcome = classify(exit, stdout, stderr);
        let status = outcome.status;
        let exit_code = outcome.exit_code;

        if self.registry.finalize(&self.job_id, outcome).await {
            tracing::info!(
                job_id = %self.job_id,
                status = %status,
                exit_code = ?exit_code,
                "Job finished"
            );
        } else {
            tracing::debug!(job_id = %self.job_id, "Job already finalized, outcome ignored");
        }
    }

    async fn wait_for_exit(&mut self) -> Exit {
        tokio::select! {
            // A process that is done by the time both are ready exited on its own.
            biased;

            status = self.child.wait() => Exit::Natural(status),

            _ = self.cancel.cancelled() => {
                match self.child.try_wait() {
                    Ok(Some(status)) => Exit::Natural(Ok(status)),
                    _ => {
                        tracing::info!(job_id = %self.job_id, "Terminating job process");
                        self.kill_deadline = Some(Instant::now() + self.grace);
                        Exit::Stopped(terminate(&mut self.child, self.grace).await)
                    }
                }
            }
        }
    }

    /// Wait for both output streams to close.
    ///
    /// After a natural exit a stop can still arrive while the job's other
    /// processes hold the streams open; the exit then becomes `Stopped`.
    /// Once stopped, whatever remains of the process group gets SIGKILL at
    /// the kill deadline, or as soon as the streams close.
    async fn collect_output<F>(
        &mut self,
        exit: Exit,
        mut captures: Pin<&mut F>,
    ) -> (Exit, Captured)
    where
        F: Future<Output = Captured>,
    {
        let exit = match exit {
            Exit::Natural(status) => tokio::select! {
                biased;

                captured = captures.as_mut() => return (Exit::Natural(status), captured),

                _ = self.cancel.cancelled() => {
                    tracing::info!(
                        job_id = %self.job_id,
                        "Process exited but the job still holds output open, terminating process group"
                    );
                    self.kill_deadline = Some(Instant::now() + self.grace);
                    if let Some(pgid) = self.pgid {
                        if let Err(e) = interrupt_group(pgid) {
                            tracing::debug!(job_id = %self.job_id, error = %e, "SIGTERM to process group failed");
                        }
                    }
                    Exit::Stopped(status)
                }
            },
            stopped @ Exit::Stopped(_) => stopped,
        };

        let deadline = self
            .kill_deadline
            .unwrap_or_else(|| Instant::now() + self.grace);
        let captured = match tokio::time::timeout_at(deadline, captures.as_mut()).await {
            Ok(captured) => {
                self.kill_stragglers();
                captured
            }
            Err(_) => {
                tracing::warn!(
                    job_id = %self.job_id,
                    grace_ms = self.grace.as_millis() as u64,
                    "Job processes still hold output open after SIGTERM, sending SIGKILL"
                );
                self.kill_stragglers();
                captures.await
            }
        };

        (exit, captured)
    }

    fn kill_stragglers(&self) {
        if let Some(pgid) = self.pgid {
            if let Err(e) = kill_group(pgid) {
                tracing::debug!(job_id = %self.job_id, error = %e, "SIGKILL to process group failed");
            }
        }
    }
}

fn spawn_capture<R>(pipe: Option<R>) -> JoinHandle<io::Result<Vec<u8>>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf).await?;
        }
        Ok(buf)
    })
}

async fn join_capture(handle: JoinHandle<io::Result<Vec<u8>>>) -> io::Result<Vec<u8>> {
    handle.await.map_err(io::Error::other)?
}

fn into_text(captured: &io::Result<Vec<u8>>) -> String {
    match captured {
        Ok(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        Err(_) => String::new(),
    }
}

/// Reduce an exit and the captured output to a terminal outcome.
///
/// A stop that reached a running process always yields `Stopped`, whatever
/// code the process died with. Otherwise only a clean exit with both streams
/// captured counts as `Succeeded`.
pub(crate) fn classify(
    exit: Exit,
    stdout: io::Result<Vec<u8>>,
    stderr: io::Result<Vec<u8>>,
) -> Outcome {
    let captured = stdout.is_ok() && stderr.is_ok();

    let (status, exit_code) = match exit {
        Exit::Stopped(result) => (JobStatus::Stopped, result.ok().and_then(|s| s.code())),
        Exit::Natural(Ok(s)) if s.success() && captured => (JobStatus::Succeeded, s.code()),
        Exit::Natural(Ok(s)) => (JobStatus::Failed, s.code()),
        Exit::Natural(Err(_)) => (JobStatus::Failed, None),
    };

    Outcome {
        status,
        exit_code,
        stdout: into_text(&stdout),
        stderr: into_text(&stderr),
    }
}
