//! Lifecycle and non-blocking capture for one supervised command.

use std::fmt;
use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;
use std::process::{Child, ChildStderr, ChildStdout, Command, Stdio};

use anyhow::{Context, Result};

use crate::log_buffer::LogBuffer;
use crate::signals::errno_error;

/// Per-drain read size for each pipe.
const DRAIN_BUF_BYTES: usize = 8192;

/// Where a supervised command is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    /// Created or restarted, not yet spawned.
    Pending,
    /// Child is running and its pipes are being drained.
    Running,
    /// Child finished with exit code 0, or was killed on request.
    Exited,
    /// Child finished with a non-zero code, died to a signal, or its pipe failed.
    Crashed,
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProcessStatus::Pending => "pending",
            ProcessStatus::Running => "running",
            ProcessStatus::Exited => "exited",
            ProcessStatus::Crashed => "crashed",
        };
        write!(f, "{label}")
    }
}

enum PipeState {
    /// Pipe still open; whether this drain moved bytes.
    Open(bool),
    /// Child closed its end.
    Eof,
    /// Read failed with something other than would-block.
    Failed,
}

/// One supervised command: its child process, pipes, and captured scrollback.
pub struct Process {
    name: String,
    command: String,
    status: ProcessStatus,
    exit_code: Option<i32>,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    log: LogBuffer,
    tee: Option<File>,
}

impl Process {
    /// Create a supervised command in the `Pending` state.
    #[must_use]
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            status: ProcessStatus::Pending,
            exit_code: None,
            child: None,
            stdout: None,
            stderr: None,
            log: LogBuffer::new(),
            tee: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    #[must_use]
    pub fn status(&self) -> ProcessStatus {
        self.status
    }

    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    #[must_use]
    pub fn log(&self) -> &LogBuffer {
        &self.log
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.status == ProcessStatus::Running
    }

    /// Mirror every drained chunk into `file`, byte-for-byte.
    ///
    /// Write failures are swallowed per-write; losing log bytes is preferred
    /// to failing the drain.
    pub fn attach_tee(&mut self, file: File) {
        self.tee = Some(file);
    }

    /// Launch the command via `/bin/sh -c` with both output pipes non-blocking.
    ///
    /// # Errors
    ///
    /// Returns an error if the fork/exec itself fails or the pipes cannot be
    /// switched to non-blocking mode.
    pub fn spawn(&mut self) -> Result<()> {
        let mut child = Command::new("/bin/sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", self.command))?;

        let stdout = child
            .stdout
            .take()
            .context("spawned child is missing its stdout pipe")?;
        let stderr = child
            .stderr
            .take()
            .context("spawned child is missing its stderr pipe")?;
        set_nonblocking(stdout.as_raw_fd())?;
        set_nonblocking(stderr.as_raw_fd())?;

        tracing::debug!(name = %self.name, pid = child.id(), "spawned");
        self.child = Some(child);
        self.stdout = Some(stdout);
        self.stderr = Some(stderr);
        self.status = ProcessStatus::Running;
        Ok(())
    }

    /// Best-effort non-blocking drain of both pipes.
    ///
    /// Returns true iff some bytes were drained this call; the drivers use
    /// that to decide whether to idle-sleep. Once both pipes report EOF the
    /// child is reaped. A read error other than would-block marks the
    /// Process crashed and releases the child.
    pub fn read_output(&mut self) -> bool {
        if self.status != ProcessStatus::Running {
            return false;
        }
        let mut drained = false;
        let mut failed = false;

        if let Some(mut pipe) = self.stdout.take() {
            match self.drain_pipe(&mut pipe) {
                PipeState::Open(moved) => {
                    drained |= moved;
                    self.stdout = Some(pipe);
                }
                PipeState::Eof => {}
                PipeState::Failed => failed = true,
            }
        }
        if let Some(mut pipe) = self.stderr.take() {
            match self.drain_pipe(&mut pipe) {
                PipeState::Open(moved) => {
                    drained |= moved;
                    self.stderr = Some(pipe);
                }
                PipeState::Eof => {}
                PipeState::Failed => failed = true,
            }
        }

        if failed {
            self.dispose_child();
            self.status = ProcessStatus::Crashed;
            return false;
        }
        if self.stdout.is_none() && self.stderr.is_none() {
            self.reap();
        }
        drained
    }

    fn drain_pipe<R: Read>(&mut self, pipe: &mut R) -> PipeState {
        let mut buf = [0u8; DRAIN_BUF_BYTES];
        match pipe.read(&mut buf) {
            Ok(0) => PipeState::Eof,
            Ok(n) => {
                self.record_chunk(&buf[..n]);
                PipeState::Open(true)
            }
            Err(err)
                if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::Interrupted =>
            {
                PipeState::Open(false)
            }
            Err(err) => {
                tracing::debug!(name = %self.name, error = %err, "pipe read failed");
                PipeState::Failed
            }
        }
    }

    fn record_chunk(&mut self, chunk: &[u8]) {
        self.log.append(chunk);
        if let Some(tee) = self.tee.as_mut() {
            let _ = tee.write_all(chunk);
        }
    }

    /// Collect the terminated child's exit status, exactly once.
    pub fn reap(&mut self) {
        self.stdout = None;
        self.stderr = None;
        let Some(mut child) = self.child.take() else {
            return;
        };
        match child.wait() {
            Ok(status) => match status.code() {
                Some(0) => {
                    self.exit_code = Some(0);
                    self.status = ProcessStatus::Exited;
                }
                Some(code) => {
                    self.exit_code = Some(code);
                    self.status = ProcessStatus::Crashed;
                }
                // Signal-terminated: no exit code to report.
                None => self.status = ProcessStatus::Crashed,
            },
            Err(err) => {
                tracing::debug!(name = %self.name, error = %err, "wait failed");
                self.status = ProcessStatus::Crashed;
            }
        }
        tracing::debug!(name = %self.name, status = %self.status, "reaped");
    }

    /// Terminate the child with SIGKILL, if one is present, and reap it.
    ///
    /// Idempotent: without a child handle this is a no-op and the status is
    /// left alone. Errors are swallowed so releasing OS resources always
    /// succeeds.
    pub fn kill(&mut self) {
        if self.child.is_none() {
            return;
        }
        self.dispose_child();
        self.status = ProcessStatus::Exited;
        tracing::debug!(name = %self.name, "killed");
    }

    /// Kill, wipe the scrollback, and spawn the command again.
    ///
    /// # Errors
    ///
    /// Propagates the respawn failure; the Process is left `Pending` with an
    /// empty log in that case.
    pub fn restart(&mut self) -> Result<()> {
        self.kill();
        self.log.clear();
        self.exit_code = None;
        self.status = ProcessStatus::Pending;
        self.spawn()
    }

    fn dispose_child(&mut self) {
        self.stdout = None;
        self.stderr = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl Drop for Process {
    fn drop(&mut self) {
        // A dropped Process must not leak a running child or a zombie.
        self.dispose_child();
    }
}

/// Derive a display name from a command: first whitespace token, directory
/// prefix stripped.
#[must_use]
pub fn default_name(command: &str) -> String {
    let token = command.split_whitespace().next().unwrap_or(command);
    Path::new(token)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(token)
        .to_string()
}

/// Switch a pipe's read end to non-blocking mode.
fn set_nonblocking(fd: RawFd) -> Result<()> {
    // SAFETY: fd belongs to a pipe we just created and own.
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL, 0);
        if flags < 0 {
            return Err(errno_error("fcntl(F_GETFL) failed"));
        }
        if libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
            return Err(errno_error("fcntl(F_SETFL) failed"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::thread;
    use std::time::{Duration, Instant};

    /// Poll a process until it reaches a terminal state or the deadline passes.
    fn drain_until_done(process: &mut Process) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while process.status() == ProcessStatus::Running && Instant::now() < deadline {
            if !process.read_output() {
                thread::sleep(Duration::from_millis(10));
            }
        }
    }

    fn line_text(process: &Process, i: usize) -> Vec<u8> {
        process.log().line(i).map(|l| l.text.clone()).unwrap_or_default()
    }

    #[test]
    fn single_line_command_captures_and_exits_cleanly() {
        let mut process = Process::new("echo", "echo 'hello world'");
        process.spawn().expect("spawn echo");
        drain_until_done(&mut process);
        assert_eq!(process.status(), ProcessStatus::Exited);
        assert_eq!(process.exit_code(), Some(0));
        assert_eq!(process.log().len(), 1);
        assert_eq!(line_text(&process, 0), b"hello world");
    }

    #[test]
    fn multi_line_output_preserves_order() {
        let mut process = Process::new("echo", "echo 'line1'; echo 'line2'; echo 'line3'");
        process.spawn().expect("spawn");
        drain_until_done(&mut process);
        assert_eq!(process.log().len(), 3);
        assert_eq!(line_text(&process, 0), b"line1");
        assert_eq!(line_text(&process, 1), b"line2");
        assert_eq!(line_text(&process, 2), b"line3");
    }

    #[test]
    fn split_writes_reassemble_into_one_line() {
        let mut process = Process::new("printf", "printf 'hel'; printf 'lo\\n'");
        process.spawn().expect("spawn");
        drain_until_done(&mut process);
        assert_eq!(process.log().len(), 1);
        assert_eq!(line_text(&process, 0), b"hello");
    }

    #[test]
    fn ring_overflow_keeps_the_last_thousand_lines() {
        let mut process = Process::new("seq", "seq 1 1050");
        process.spawn().expect("spawn");
        drain_until_done(&mut process);
        assert_eq!(process.log().len(), 1000);
        assert_eq!(line_text(&process, 0), b"51");
        assert_eq!(line_text(&process, 999), b"1050");
    }

    #[test]
    fn non_zero_exit_is_a_crash_with_its_code() {
        let mut process = Process::new("fail", "exit 1");
        process.spawn().expect("spawn");
        drain_until_done(&mut process);
        assert_eq!(process.status(), ProcessStatus::Crashed);
        assert_eq!(process.exit_code(), Some(1));
    }

    #[test]
    fn stderr_is_drained_alongside_stdout() {
        let mut process = Process::new("mix", "echo out; echo err 1>&2");
        process.spawn().expect("spawn");
        drain_until_done(&mut process);
        assert_eq!(process.status(), ProcessStatus::Exited);
        assert_eq!(process.log().len(), 2);
        let lines: Vec<Vec<u8>> = process.log().iter().map(|l| l.text.clone()).collect();
        assert!(lines.contains(&b"out".to_vec()));
        assert!(lines.contains(&b"err".to_vec()));
    }

    #[test]
    fn kill_is_immediate_and_idempotent() {
        let mut process = Process::new("sleep", "sleep 10");
        process.spawn().expect("spawn");
        assert!(process.is_alive());
        process.kill();
        assert!(!process.is_alive());
        assert_eq!(process.status(), ProcessStatus::Exited);
        // Second call must be a no-op on a terminal state.
        process.kill();
        assert_eq!(process.status(), ProcessStatus::Exited);
    }

    #[test]
    fn restart_clears_the_log_before_any_new_output() {
        let mut process = Process::new("echo", "echo once; sleep 5");
        process.spawn().expect("spawn");
        let deadline = Instant::now() + Duration::from_secs(2);
        while process.log().is_empty() && Instant::now() < deadline {
            if !process.read_output() {
                thread::sleep(Duration::from_millis(10));
            }
        }
        assert!(!process.log().is_empty());
        process.restart().expect("restart");
        assert_eq!(process.log().len(), 0);
        assert_eq!(process.exit_code(), None);
        assert!(process.is_alive());
        process.kill();
    }

    #[test]
    fn is_alive_tracks_running_status_only() {
        let mut process = Process::new("true", "true");
        assert_eq!(process.status(), ProcessStatus::Pending);
        assert!(!process.is_alive());
        process.spawn().expect("spawn");
        assert!(process.is_alive());
        drain_until_done(&mut process);
        assert!(!process.is_alive());
    }

    #[rstest]
    #[case("npm run dev", "npm")]
    #[case("./scripts/watch.sh --fast", "watch.sh")]
    #[case("/usr/bin/python3 app.py", "python3")]
    #[case("cargo", "cargo")]
    fn default_name_takes_the_first_token_basename(#[case] command: &str, #[case] expected: &str) {
        assert_eq!(default_name(command), expected);
    }
}
