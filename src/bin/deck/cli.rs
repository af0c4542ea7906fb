//! CLI flag schema so both fronts share one explicit command surface.

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};

use deck::daemon::LogRange;
use deck::process::default_name;

/// Default line count for `deck logs` when neither --head nor --tail is given.
const DEFAULT_TAIL_LINES: usize = 100;

#[derive(Debug, Parser)]
#[command(
    name = "deck",
    about = "Run and watch several long-lived commands from one terminal",
    version,
    args_conflicts_with_subcommands = true
)]
pub(crate) struct DeckCli {
    #[command(subcommand)]
    pub(crate) command: Option<DeckCommand>,

    #[command(flatten)]
    pub(crate) run: RunArgs,
}

#[derive(Debug, Subcommand)]
pub(crate) enum DeckCommand {
    /// Run the supervisor as a background daemon
    Start(RunArgs),
    /// Stop this session's daemon
    Stop {
        /// Session id override (defaults to a hash of the working directory)
        #[arg(short = 's', long = "session")]
        session: Option<String>,
    },
    /// Print a supervised process's captured log
    Logs(LogsArgs),
}

#[derive(Debug, Clone, Args)]
pub(crate) struct RunArgs {
    /// Comma-separated process names; the count must match the commands
    #[arg(short = 'n', long = "names", value_delimiter = ',')]
    pub(crate) names: Vec<String>,

    /// Session id override (defaults to a hash of the working directory)
    #[arg(short = 's', long = "session")]
    pub(crate) session: Option<String>,

    /// Write JSON diagnostics to the trace file (DECK_TRACE_LOG overrides the path)
    #[arg(long = "logs", default_value_t = false)]
    pub(crate) logs: bool,

    /// Commands to supervise, each executed via `/bin/sh -c`
    #[arg(value_name = "CMD")]
    pub(crate) commands: Vec<String>,
}

#[derive(Debug, Args)]
pub(crate) struct LogsArgs {
    /// Process name whose log to print
    pub(crate) name: String,

    /// Print only the first N lines
    #[arg(long = "head", value_parser = parse_line_count, conflicts_with = "tail")]
    pub(crate) head: Option<usize>,

    /// Print only the last N lines (default when neither flag is given: 100)
    #[arg(long = "tail", value_parser = parse_line_count)]
    pub(crate) tail: Option<usize>,

    /// Session id override (defaults to a hash of the working directory)
    #[arg(short = 's', long = "session")]
    pub(crate) session: Option<String>,
}

impl LogsArgs {
    pub(crate) fn range(&self) -> LogRange {
        match (self.head, self.tail) {
            (Some(n), _) => LogRange::Head(n),
            (None, Some(n)) => LogRange::Tail(n),
            (None, None) => LogRange::Tail(DEFAULT_TAIL_LINES),
        }
    }
}

fn parse_line_count(raw: &str) -> Result<usize, String> {
    raw.parse()
        .map_err(|_| format!("invalid line count '{raw}'"))
}

/// Pair every command with a name: the matching `-n` entry, or the command's
/// first token with any directory prefix stripped.
///
/// # Errors
///
/// Fails before any side effect when no commands were given or the name
/// count does not match the command count.
pub(crate) fn resolve_processes(args: &RunArgs) -> Result<Vec<(String, String)>> {
    if args.commands.is_empty() {
        bail!("no commands given; pass at least one CMD");
    }
    if !args.names.is_empty() && args.names.len() != args.commands.len() {
        bail!(
            "expected {} names, got {}",
            args.commands.len(),
            args.names.len()
        );
    }
    Ok(args
        .commands
        .iter()
        .enumerate()
        .map(|(i, command)| {
            let name = args
                .names
                .get(i)
                .cloned()
                .unwrap_or_else(|| default_name(command));
            (name, command.clone())
        })
        .collect())
}
