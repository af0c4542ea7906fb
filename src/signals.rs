//! Signal plumbing shared by both fronts: delivery to foreign PIDs and the daemon stop flag.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{anyhow, Result};

/// Flag set by the SIGTERM/SIGINT handlers; the daemon loop polls it.
static STOP_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Handler for daemon termination signals.
///
/// Only flips an atomic flag, which is async-signal-safe; the drain loop
/// observes it on its next cycle.
extern "C" fn handle_stop_signal(_: libc::c_int) {
    STOP_REQUESTED.store(true, Ordering::SeqCst);
}

/// Install SIGTERM and SIGINT handlers that request a cooperative stop.
pub fn install_stop_handlers() -> Result<()> {
    // SAFETY: handle_stop_signal is an extern "C" handler whose only effect
    // is storing to an atomic, which is async-signal-safe.
    unsafe {
        let handler = handle_stop_signal as *const () as libc::sighandler_t;
        if libc::signal(libc::SIGTERM, handler) == libc::SIG_ERR {
            return Err(errno_error("failed to install SIGTERM handler"));
        }
        if libc::signal(libc::SIGINT, handler) == libc::SIG_ERR {
            return Err(errno_error("failed to install SIGINT handler"));
        }
    }
    Ok(())
}

/// Whether a termination signal has been observed since the handlers were installed.
#[must_use]
pub fn stop_requested() -> bool {
    STOP_REQUESTED.load(Ordering::SeqCst)
}

#[cfg(test)]
pub(crate) fn reset_stop_flag() {
    STOP_REQUESTED.store(false, Ordering::SeqCst);
}

/// Deliver `signal` to `pid`. Non-positive PIDs are ignored.
pub fn send_signal(pid: i32, signal: libc::c_int) -> io::Result<()> {
    if pid <= 0 {
        return Ok(());
    }
    // SAFETY: kill only delivers a signal; it does not touch our memory.
    unsafe {
        if libc::kill(pid, signal) == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

/// Probe `pid` with signal 0.
///
/// EPERM still means the process exists; only ESRCH (or a non-positive PID)
/// counts as gone.
#[must_use]
pub fn process_exists(pid: i32) -> bool {
    if pid <= 0 {
        return false;
    }
    // SAFETY: kill(pid, 0) checks deliverability without sending a signal.
    unsafe {
        if libc::kill(pid, 0) == 0 {
            return true;
        }
    }
    matches!(
        io::Error::last_os_error().raw_os_error(),
        Some(code) if code == libc::EPERM
    )
}

/// Whether an error from signal delivery means the target is already gone.
#[must_use]
pub fn is_no_such_process(err: &io::Error) -> bool {
    matches!(err.raw_os_error(), Some(code) if code == libc::ESRCH)
}

/// Format the current OS error with context.
pub(crate) fn errno_error(context: &str) -> anyhow::Error {
    anyhow!("{context}: {}", io::Error::last_os_error())
}
