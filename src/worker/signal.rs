use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;

/// Terminate a running child and reap it.
///
/// On Unix the child leads its own process group. The whole group gets
/// SIGTERM, and SIGKILL if the leader is still alive once `grace` has
/// elapsed. Other group members are left to [`kill_group`].
#[cfg(unix)]
pub async fn terminate(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    // Already reaped.
    let Some(pid) = child.id() else {
        return child.wait().await;
    };

    if let Err(e) = interrupt_group(pid) {
        tracing::debug!(pid, error = %e, "SIGTERM to process group failed");
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => status,
        Err(_) => {
            tracing::warn!(
                pid,
                grace_ms = grace.as_millis() as u64,
                "Process still alive after SIGTERM, sending SIGKILL"
            );
            if let Err(e) = kill_group(pid) {
                tracing::debug!(pid, error = %e, "SIGKILL to process group failed");
                child.start_kill()?;
            }
            child.wait().await
        }
    }
}

#[cfg(not(unix))]
pub async fn terminate(child: &mut Child, _grace: Duration) -> io::Result<ExitStatus> {
    child.start_kill()?;
    child.wait().await
}

/// Send SIGTERM to every process in the group led by `pgid`.
///
/// A group with no members left counts as delivered.
#[cfg(unix)]
pub fn interrupt_group(pgid: u32) -> io::Result<()> {
    signal_group(pgid, nix::sys::signal::Signal::SIGTERM)
}

/// Send SIGKILL to every process in the group led by `pgid`.
///
/// A group with no members left counts as delivered.
#[cfg(unix)]
pub fn kill_group(pgid: u32) -> io::Result<()> {
    signal_group(pgid, nix::sys::signal::Signal::SIGKILL)
}

#[cfg(unix)]
fn signal_group(pgid: u32, signal: nix::sys::signal::Signal) -> io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    match killpg(Pid::from_raw(pgid as i32), signal) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(errno.into()),
    }
}

// Process groups are Unix only. Elsewhere `terminate` handles the job's own
// process and its descendants are out of reach.
#[cfg(not(unix))]
pub fn interrupt_group(_pgid: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(not(unix))]
pub fn kill_group(_pgid: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn signalling_an_empty_group_is_not_an_error() {
        // Far above any default pid_max, so no such group exists.
        let pgid = 0x3fff_fff0;
        assert!(interrupt_group(pgid).is_ok());
        assert!(kill_group(pgid).is_ok());
    }
}
