//! Raw-mode lifecycle so the dashboard always restores the caller's terminal.

use std::io;

use anyhow::{Context, Result};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

pub(crate) type Tui = Terminal<CrosstermBackend<io::Stdout>>;

/// Enter raw mode and the alternate screen, run `body`, and restore the
/// terminal regardless of how the body finished.
pub(crate) fn run<T>(body: impl FnOnce(&mut Tui) -> Result<T>) -> Result<T> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to init terminal backend")?;

    let result = body(&mut terminal);

    let restore = disable_raw_mode()
        .context("failed to disable raw mode")
        .and_then(|()| {
            execute!(terminal.backend_mut(), LeaveAlternateScreen)
                .context("failed to leave alternate screen")
        })
        .and_then(|()| terminal.show_cursor().context("failed to show cursor"));

    match (result, restore) {
        (Ok(value), Ok(())) => Ok(value),
        (Err(err), _) => Err(err),
        (Ok(_), Err(err)) => Err(err),
    }
}
