//! Supervision and log-capture engine shared by the deck dashboard and daemon fronts.

pub mod daemon;
pub mod log_buffer;
pub mod process;
pub mod session;
pub mod signals;
pub mod supervisor;
mod telemetry;

pub use daemon::{DaemonError, LogRange};
pub use log_buffer::{LogBuffer, LogLine};
pub use process::{Process, ProcessStatus};
pub use supervisor::Supervisor;
pub use telemetry::{init_tracing, trace_log_path};
