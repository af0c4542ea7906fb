//! Session identity and on-disk layout shared by both fronts.
//!
//! Two invocations started in the same directory share a session; sibling
//! directories get distinct ones. An explicit `--session` name overrides the
//! derived id.

use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a over a byte string.
#[must_use]
pub fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for &byte in bytes {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Resolve the session id: the explicit name verbatim, or the FNV-1a hash of
/// the canonical working directory rendered as lowercase hex. Falls back to
/// hashing `/tmp` when the working directory cannot be canonicalised.
#[must_use]
pub fn session_id(explicit: Option<&str>) -> String {
    if let Some(name) = explicit {
        return name.to_string();
    }
    let cwd = std::env::current_dir()
        .and_then(std::fs::canonicalize)
        .unwrap_or_else(|_| PathBuf::from("/tmp"));
    format!("{:016x}", fnv1a_64(cwd.as_os_str().as_bytes()))
}

/// Root of all deck state: `${XDG_DATA_HOME:-$HOME/.local/share}/deck`, or
/// `/tmp/deck` when no home directory is available.
#[must_use]
pub fn data_root() -> PathBuf {
    if let Some(dir) = std::env::var_os("XDG_DATA_HOME") {
        if !dir.is_empty() {
            return PathBuf::from(dir).join("deck");
        }
    }
    match dirs::home_dir() {
        Some(home) => home.join(".local/share").join("deck"),
        None => PathBuf::from("/tmp/deck"),
    }
}

/// State directory for one session.
#[must_use]
pub fn session_dir(session: &str) -> PathBuf {
    data_root().join(session)
}

/// PID file marking a live daemon for the session.
#[must_use]
pub fn pid_file(session_dir: &Path) -> PathBuf {
    session_dir.join("daemon.pid")
}

/// Directory holding the daemon's per-process log files.
#[must_use]
pub fn logs_dir(session_dir: &Path) -> PathBuf {
    session_dir.join("logs")
}

/// On-disk log file for one supervised process.
#[must_use]
pub fn log_file(session_dir: &Path, name: &str) -> PathBuf {
    logs_dir(session_dir).join(format!("{}.log", sanitise_name(name)))
}

/// Make a process name filesystem-safe: `/`, space, and `\` become `_`.
#[must_use]
pub fn sanitise_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | ' ' | '\\' => '_',
            other => other,
        })
        .collect()
}
