//! Process existence checks.

/// Returns true when a process with this pid exists.
///
/// On Unix this sends the null signal, so a pid owned by another user still
/// counts as alive. Pid 0 is never considered alive: signalling it would
/// target our own process group.
#[cfg(unix)]
pub fn process_exists(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    if pid == 0 || pid > i32::MAX as u32 {
        return false;
    }

    match kill(Pid::from_raw(pid as i32), None::<Signal>) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
pub fn process_exists(pid: u32) -> bool {
    use sysinfo::{Pid, System};

    if pid == 0 {
        return false;
    }

    let mut system = System::new();
    system.refresh_process(Pid::from_u32(pid));
    system.process(Pid::from_u32(pid)).is_some()
}
