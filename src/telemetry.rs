//! Opt-in diagnostics written as JSON lines, kept away from the dashboard's terminal.

use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_subscriber::fmt::time::UtcTime;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Path the trace file is written to: `DECK_TRACE_LOG` or a temp-dir default.
pub fn trace_log_path() -> PathBuf {
    env::var("DECK_TRACE_LOG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| env::temp_dir().join("deck_trace.jsonl"))
}

/// Install the global JSON subscriber once, when diagnostics are requested.
///
/// Disabled silently when the trace file cannot be opened; the supervisor
/// must keep working without its diagnostics.
pub fn init_tracing(enabled: bool) {
    if !enabled {
        return;
    }
    let _ = TRACING_INIT.get_or_init(|| {
        let path = trace_log_path();
        let file = match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => file,
            Err(_) => return,
        };
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_timer(UtcTime::rfc_3339())
            .with_writer(file)
            .with_current_span(false)
            .with_span_list(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
