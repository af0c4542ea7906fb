//! Entry point: parse the command surface, then hand off to the dashboard or
//! the daemon front.

mod app;
mod cli;
mod terminal;
mod ui;

use std::io::{self, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::event::{self, Event};

use deck::{daemon, init_tracing, session, Process, Supervisor};

use app::App;
use cli::{DeckCli, DeckCommand, LogsArgs, RunArgs};

/// Foreground poll cadence (~60 Hz).
const TICK: Duration = Duration::from_millis(16);

fn main() -> Result<()> {
    let cli = DeckCli::parse();
    match cli.command {
        Some(DeckCommand::Start(args)) => run_start(args),
        Some(DeckCommand::Stop { session }) => run_stop(session),
        Some(DeckCommand::Logs(args)) => run_logs(&args),
        None => run_foreground(cli.run),
    }
}

fn build_processes(args: &RunArgs) -> Result<Vec<Process>> {
    Ok(cli::resolve_processes(args)?
        .into_iter()
        .map(|(name, command)| Process::new(name, command))
        .collect())
}

fn run_foreground(args: RunArgs) -> Result<()> {
    init_tracing(args.logs);
    let mut supervisor = Supervisor::new(build_processes(&args)?);
    if let Err(err) = supervisor.spawn_all() {
        supervisor.kill_all();
        return Err(err);
    }
    terminal::run(|terminal| app_loop(terminal, &mut supervisor))
}

/// One cooperative cycle: drain, handle input, render, idle.
fn app_loop(terminal: &mut terminal::Tui, supervisor: &mut Supervisor) -> Result<()> {
    let mut app = App::new();
    while !app.quit {
        let flowed = supervisor.read_all();
        if flowed {
            app.follow_output(supervisor);
        }
        while event::poll(Duration::ZERO).context("failed to poll events")? {
            if let Event::Key(key) = event::read().context("failed to read event")? {
                app.handle_key(key, supervisor);
            }
        }
        terminal
            .draw(|frame| ui::draw(frame, &mut app, supervisor))
            .context("failed to draw frame")?;
        // The tick doubles as the idle sleep; input wakes the loop early.
        let _ = event::poll(TICK);
    }
    supervisor.kill_all();
    Ok(())
}

fn run_start(args: RunArgs) -> Result<()> {
    init_tracing(args.logs);
    let processes = build_processes(&args)?;
    let session_id = session::session_id(args.session.as_deref());
    let session_dir = session::session_dir(&session_id);
    let pid = daemon::start(&session_dir, processes)?;
    println!("deck daemon started (pid {pid}, session {session_id})");
    Ok(())
}

fn run_stop(session: Option<String>) -> Result<()> {
    let session_id = session::session_id(session.as_deref());
    daemon::stop(&session::session_dir(&session_id))?;
    println!("deck daemon stopped (session {session_id})");
    Ok(())
}

fn run_logs(args: &LogsArgs) -> Result<()> {
    let session_id = session::session_id(args.session.as_deref());
    let bytes = daemon::read_log(&session::session_dir(&session_id), &args.name, args.range())?;
    io::stdout()
        .write_all(&bytes)
        .context("failed to write log to stdout")?;
    Ok(())
}
