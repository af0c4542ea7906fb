//! Headless front: detach from the terminal, supervise, tee logs to disk, and
//! answer out-of-band `stop`/`logs` requests from other invocations.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::Path;
use std::thread;
use std::time::Duration;

use crate::process::Process;
use crate::session;
use crate::signals;
use crate::supervisor::Supervisor;

/// Idle sleep between daemon poll cycles when no bytes flowed.
const IDLE_SLEEP: Duration = Duration::from_millis(50);

/// Coordination failures between invocations and the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonError {
    /// A live daemon already owns this session.
    AlreadyRunning,
    /// No usable PID file exists for this session.
    NotRunning,
    /// No captured log for the requested process name.
    LogNotFound(String),
    /// The PID file exists but does not hold a PID.
    InvalidPid,
    /// Underlying filesystem or process error.
    Io(String),
}

impl fmt::Display for DaemonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyRunning => write!(f, "a deck daemon is already running for this session"),
            Self::NotRunning => write!(f, "no deck daemon is running for this session"),
            Self::LogNotFound(name) => write!(f, "no captured log for process '{name}'"),
            Self::InvalidPid => write!(f, "daemon.pid does not contain a valid PID"),
            Self::Io(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for DaemonError {}

/// How much of a captured log file to stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRange {
    /// First `n` newline-delimited lines.
    Head(usize),
    /// Last `n` newline-delimited lines.
    Tail(usize),
    /// The whole file.
    All,
}

/// PID recorded in the session's `daemon.pid`, if the file exists.
///
/// # Errors
///
/// `InvalidPid` when the file holds something other than a decimal PID;
/// `Io` when it cannot be read for another reason.
pub fn read_pid(session_dir: &Path) -> Result<Option<i32>, DaemonError> {
    let path = session::pid_file(session_dir);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(DaemonError::Io(err.to_string())),
    };
    content
        .trim()
        .parse::<i32>()
        .map(Some)
        .map_err(|_| DaemonError::InvalidPid)
}

/// Probe the session's daemon with signal 0, unlinking a stale PID file.
#[must_use]
pub fn is_daemon_running(session_dir: &Path) -> bool {
    match read_pid(session_dir) {
        Ok(Some(pid)) if signals::process_exists(pid) => true,
        Ok(Some(_)) | Err(DaemonError::InvalidPid) => {
            let _ = fs::remove_file(session::pid_file(session_dir));
            false
        }
        Ok(None) | Err(_) => false,
    }
}

/// Fork a detached daemon supervising `processes` for this session.
///
/// Returns the daemon's PID in the calling process; the forked child never
/// returns from this function.
///
/// # Errors
///
/// `AlreadyRunning` when a live daemon owns the session; `Io` when the
/// session directory cannot be created or the fork fails.
pub fn start(session_dir: &Path, processes: Vec<Process>) -> Result<i32, DaemonError> {
    fs::create_dir_all(session_dir).map_err(|err| DaemonError::Io(err.to_string()))?;
    if is_daemon_running(session_dir) {
        return Err(DaemonError::AlreadyRunning);
    }
    // SAFETY: the CLI is single-threaded here, so the child inherits a
    // consistent address space; it re-execs nothing and proceeds straight
    // into its own supervision loop.
    let pid = unsafe { libc::fork() };
    if pid < 0 {
        return Err(DaemonError::Io(io::Error::last_os_error().to_string()));
    }
    if pid > 0 {
        return Ok(pid);
    }
    run_daemon(session_dir, processes)
}

fn run_daemon(session_dir: &Path, processes: Vec<Process>) -> ! {
    detach();
    // SAFETY: getpid has no preconditions.
    let own_pid = unsafe { libc::getpid() };
    if let Err(err) = fs::write(session::pid_file(session_dir), format!("{own_pid}\n")) {
        tracing::error!(error = %err, "failed to write daemon.pid");
        std::process::exit(1);
    }
    let mut supervisor = open_tee_files(session_dir, processes);
    if let Err(err) = signals::install_stop_handlers() {
        tracing::warn!(error = %err, "stop handlers unavailable");
    }
    for process in supervisor.processes_mut() {
        if let Err(err) = process.spawn() {
            // One bad command abandons that Process only; the rest continue.
            tracing::warn!(error = %err, "daemon spawn failed");
        }
    }
    tracing::debug!(pid = own_pid, "daemon supervising");

    while !signals::stop_requested() && supervisor.any_alive() {
        if !supervisor.read_all() {
            thread::sleep(IDLE_SLEEP);
        }
    }

    supervisor.kill_all();
    for process in supervisor.processes() {
        let _ = fs::remove_file(session::log_file(session_dir, process.name()));
    }
    let _ = fs::remove_file(session::pid_file(session_dir));
    tracing::debug!(pid = own_pid, "daemon stopped");
    std::process::exit(0);
}

/// Become a session leader with stdio pointed at /dev/null.
fn detach() {
    // SAFETY: setsid/open/dup2/close operate on our own process; the fds
    // involved are the standard streams and a freshly opened /dev/null.
    unsafe {
        let _ = libc::setsid();
        let devnull = libc::open(b"/dev/null\0".as_ptr() as *const libc::c_char, libc::O_RDWR);
        if devnull >= 0 {
            let _ = libc::dup2(devnull, libc::STDIN_FILENO);
            let _ = libc::dup2(devnull, libc::STDOUT_FILENO);
            let _ = libc::dup2(devnull, libc::STDERR_FILENO);
            if devnull > libc::STDERR_FILENO {
                let _ = libc::close(devnull);
            }
        }
    }
}

/// Truncate-open one log file per Process and attach it as the drain tee.
fn open_tee_files(session_dir: &Path, mut processes: Vec<Process>) -> Supervisor {
    let logs_dir = session::logs_dir(session_dir);
    if let Err(err) = fs::create_dir_all(&logs_dir) {
        tracing::warn!(error = %err, "failed to create logs dir");
    }
    for process in &mut processes {
        let path = session::log_file(session_dir, process.name());
        match OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
        {
            Ok(file) => process.attach_tee(file),
            Err(err) => {
                tracing::warn!(name = process.name(), error = %err, "failed to open log file");
            }
        }
    }
    Supervisor::new(processes)
}

/// Ask the session's daemon to shut down.
///
/// A PID file naming an already-gone process is unlinked; a live daemon is
/// trusted to clean up after itself once the SIGTERM lands.
///
/// # Errors
///
/// `NotRunning` when the session has no PID file; `InvalidPid`/`Io` when it
/// cannot be used.
pub fn stop(session_dir: &Path) -> Result<(), DaemonError> {
    let pid = read_pid(session_dir)?.ok_or(DaemonError::NotRunning)?;
    match signals::send_signal(pid, libc::SIGTERM) {
        Ok(()) => Ok(()),
        Err(err) if signals::is_no_such_process(&err) => {
            let _ = fs::remove_file(session::pid_file(session_dir));
            Ok(())
        }
        Err(err) => Err(DaemonError::Io(err.to_string())),
    }
}

/// Read the requested slice of a process's captured log file.
///
/// # Errors
///
/// `LogNotFound` when no log file exists for the name.
pub fn read_log(session_dir: &Path, name: &str, range: LogRange) -> Result<Vec<u8>, DaemonError> {
    let path = session::log_file(session_dir, name);
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(DaemonError::LogNotFound(name.to_string()));
        }
        Err(err) => return Err(DaemonError::Io(err.to_string())),
    };
    Ok(select_range(&bytes, range))
}

fn select_range(bytes: &[u8], range: LogRange) -> Vec<u8> {
    match range {
        LogRange::All => bytes.to_vec(),
        LogRange::Head(n) => bytes
            .split_inclusive(|&b| b == b'\n')
            .take(n)
            .collect::<Vec<_>>()
            .concat(),
        LogRange::Tail(n) => {
            let lines: Vec<&[u8]> = bytes.split_inclusive(|&b| b == b'\n').collect();
            let start = lines.len().saturating_sub(n);
            lines[start..].concat()
        }
    }
}
