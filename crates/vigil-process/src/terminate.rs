//! Process termination primitives.

use crate::check::process_exists;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};
use vigil_common::{ProcessError, ProcessResult};

/// Send SIGTERM to a single process.
pub fn terminate_gracefully(pid: u32) -> ProcessResult<()> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        kill(Pid::from_raw(pid as i32), Signal::SIGTERM)
            .map_err(|e| ProcessError::stop_failed(pid.to_string(), e.to_string()))
    }

    #[cfg(not(unix))]
    {
        Err(ProcessError::stop_failed(
            pid.to_string(),
            "graceful termination is only supported on Unix",
        ))
    }
}

/// Send SIGKILL to a single process.
pub fn force_kill(pid: u32) -> ProcessResult<()> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        kill(Pid::from_raw(pid as i32), Signal::SIGKILL)
            .map_err(|e| ProcessError::stop_failed(pid.to_string(), e.to_string()))
    }

    #[cfg(not(unix))]
    {
        Err(ProcessError::stop_failed(
            pid.to_string(),
            "force kill is only supported on Unix",
        ))
    }
}

/// Signal a process group led by `pid`, falling back to the pid alone when
/// the group does not exist (e.g. the process never became a group leader).
#[cfg(unix)]
fn signal_group(pid: u32, signal: nix::sys::signal::Signal) -> ProcessResult<()> {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    match kill(Pid::from_raw(-(pid as i32)), signal) {
        Ok(()) => Ok(()),
        Err(Errno::ESRCH) => match kill(Pid::from_raw(pid as i32), signal) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(ProcessError::stop_failed(pid.to_string(), e.to_string())),
        },
        Err(e) => {
            warn!("Failed to send {:?} to process group {}: {}", signal, pid, e);
            kill(Pid::from_raw(pid as i32), signal)
                .map_err(|e| ProcessError::stop_failed(pid.to_string(), e.to_string()))
        }
    }
}

/// Send SIGTERM to the process group led by `pid`.
pub fn terminate_group(pid: u32) -> ProcessResult<()> {
    #[cfg(unix)]
    {
        signal_group(pid, nix::sys::signal::Signal::SIGTERM)
    }

    #[cfg(not(unix))]
    {
        terminate_gracefully(pid)
    }
}

/// Send SIGKILL to the process group led by `pid`.
pub fn kill_group(pid: u32) -> ProcessResult<()> {
    #[cfg(unix)]
    {
        signal_group(pid, nix::sys::signal::Signal::SIGKILL)
    }

    #[cfg(not(unix))]
    {
        force_kill(pid)
    }
}

/// Terminate a process we do not own: SIGTERM, poll for disappearance until
/// `grace` elapses, then SIGKILL.
///
/// Only suitable for processes that are not our children; a child stays
/// visible as a zombie until it is reaped.
pub async fn terminate_with_grace(pid: u32, grace: Duration) -> ProcessResult<()> {
    if !process_exists(pid) {
        return Ok(());
    }

    terminate_gracefully(pid)?;

    let deadline = Instant::now() + grace;
    while Instant::now() < deadline {
        if !process_exists(pid) {
            debug!("Process {} exited after SIGTERM", pid);
            return Ok(());
        }
        sleep(Duration::from_millis(200)).await;
    }

    if process_exists(pid) {
        warn!("Process {} ignored SIGTERM for {:?}, force killing", pid, grace);
        force_kill(pid)?;
    }

    Ok(())
}
