//! Signals delivered to the whole process group of a child.
//!
//! Children are spawned as group leaders, so signalling `-pid` also reaches
//! anything the app forked (reloader workers, shells).

use std::io;

#[cfg(unix)]
pub fn interrupt(pid: u32) -> io::Result<()> {
    send_to_group(pid, libc::SIGINT)
}

#[cfg(unix)]
pub fn kill(pid: u32) -> io::Result<()> {
    send_to_group(pid, libc::SIGKILL)
}

#[cfg(unix)]
fn send_to_group(pid: u32, signal: libc::c_int) -> io::Result<()> {
    let pid = libc::pid_t::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    // SAFETY: kill(2) has no memory-safety preconditions.
    let rc = unsafe { libc::kill(-pid, signal) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// No process groups off unix: the caller falls back to killing the child.
#[cfg(not(unix))]
pub fn interrupt(_pid: u32) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "interrupt is only supported on unix",
    ))
}

#[cfg(not(unix))]
pub fn kill(_pid: u32) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "group kill is only supported on unix",
    ))
}
