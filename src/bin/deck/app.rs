//! Foreground driver state: pane selection, scrolling, and key dispatch.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use deck::Supervisor;

/// Page distance when the last draw's viewport height is not known yet.
const PAGE_JUMP_FALLBACK: usize = 10;

/// Mutable state the foreground loop threads through every cycle.
pub(crate) struct App {
    /// Index of the Process whose log the UI foregrounds.
    pub(crate) selected: usize,
    /// First visible log line in the foregrounded pane.
    pub(crate) scroll_offset: usize,
    /// Track the newest line whenever bytes flow.
    pub(crate) auto_scroll: bool,
    pub(crate) quit: bool,
    /// Rows available to the log pane on the last draw; drives paging and follow.
    pub(crate) log_viewport_rows: usize,
}

impl App {
    pub(crate) fn new() -> Self {
        Self {
            selected: 0,
            scroll_offset: 0,
            auto_scroll: true,
            quit: false,
            log_viewport_rows: 0,
        }
    }

    fn max_scroll(&self, supervisor: &Supervisor) -> usize {
        let len = supervisor
            .processes()
            .get(self.selected)
            .map(|p| p.log().len())
            .unwrap_or(0);
        len.saturating_sub(self.log_viewport_rows.max(1))
    }

    fn page_jump(&self) -> usize {
        if self.log_viewport_rows > 0 {
            self.log_viewport_rows
        } else {
            PAGE_JUMP_FALLBACK
        }
    }

    /// Advance the scroll so the newest line is visible, when following.
    pub(crate) fn follow_output(&mut self, supervisor: &Supervisor) {
        if self.auto_scroll {
            self.scroll_offset = self.max_scroll(supervisor);
        }
    }

    fn select_offset(&mut self, supervisor: &Supervisor, step: isize) {
        let count = supervisor.len();
        if count == 0 {
            return;
        }
        let current = self.selected as isize;
        self.selected = (current + step).rem_euclid(count as isize) as usize;
        self.scroll_offset = self.max_scroll(supervisor);
    }

    /// Process one key press; restart/kill act on the current selection.
    pub(crate) fn handle_key(&mut self, key: KeyEvent, supervisor: &mut Supervisor) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.quit = true;
            return;
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.quit = true,
            KeyCode::Tab | KeyCode::Right => self.select_offset(supervisor, 1),
            KeyCode::BackTab | KeyCode::Left => self.select_offset(supervisor, -1),
            KeyCode::Up => {
                self.scroll_offset = self.scroll_offset.saturating_sub(1);
                self.auto_scroll = false;
            }
            KeyCode::Down => {
                self.scroll_offset = (self.scroll_offset + 1).min(self.max_scroll(supervisor));
            }
            KeyCode::PageUp => {
                self.scroll_offset = self.scroll_offset.saturating_sub(self.page_jump());
                self.auto_scroll = false;
            }
            KeyCode::PageDown => {
                self.scroll_offset =
                    (self.scroll_offset + self.page_jump()).min(self.max_scroll(supervisor));
            }
            KeyCode::Home => {
                self.scroll_offset = 0;
                self.auto_scroll = false;
            }
            KeyCode::End => {
                self.scroll_offset = self.max_scroll(supervisor);
                self.auto_scroll = true;
            }
            KeyCode::Char('a') => self.auto_scroll = !self.auto_scroll,
            KeyCode::Char('r') => {
                if let Some(process) = supervisor.process_mut(self.selected) {
                    if let Err(err) = process.restart() {
                        tracing::warn!(error = %err, "restart failed");
                    }
                    self.scroll_offset = 0;
                }
            }
            KeyCode::Char('x') => {
                if let Some(process) = supervisor.process_mut(self.selected) {
                    process.kill();
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deck::Process;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn idle_supervisor(count: usize) -> Supervisor {
        let processes = (0..count)
            .map(|i| Process::new(format!("p{i}"), "true"))
            .collect();
        Supervisor::new(processes)
    }

    #[test]
    fn quit_keys_set_the_flag() {
        let mut supervisor = idle_supervisor(1);
        let mut app = App::new();
        app.handle_key(key(KeyCode::Char('q')), &mut supervisor);
        assert!(app.quit);

        let mut app = App::new();
        app.handle_key(
            KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
            &mut supervisor,
        );
        assert!(app.quit);
    }

    #[test]
    fn selection_wraps_in_both_directions() {
        let mut supervisor = idle_supervisor(3);
        let mut app = App::new();
        app.handle_key(key(KeyCode::BackTab), &mut supervisor);
        assert_eq!(app.selected, 2);
        app.handle_key(key(KeyCode::Tab), &mut supervisor);
        assert_eq!(app.selected, 0);
        app.handle_key(key(KeyCode::Right), &mut supervisor);
        assert_eq!(app.selected, 1);
    }

    #[test]
    fn manual_scrolling_disables_auto_scroll_and_end_restores_it() {
        let mut supervisor = idle_supervisor(1);
        let mut app = App::new();
        assert!(app.auto_scroll);
        app.handle_key(key(KeyCode::Up), &mut supervisor);
        assert!(!app.auto_scroll);
        app.handle_key(key(KeyCode::End), &mut supervisor);
        assert!(app.auto_scroll);
    }

    #[test]
    fn scroll_never_escapes_the_log_bounds() {
        let mut supervisor = idle_supervisor(1);
        let mut app = App::new();
        app.handle_key(key(KeyCode::Down), &mut supervisor);
        app.handle_key(key(KeyCode::PageDown), &mut supervisor);
        assert_eq!(app.scroll_offset, 0);
        app.handle_key(key(KeyCode::Up), &mut supervisor);
        assert_eq!(app.scroll_offset, 0);
    }

    #[test]
    fn empty_supervisor_ignores_selection_keys() {
        let mut supervisor = idle_supervisor(0);
        let mut app = App::new();
        app.handle_key(key(KeyCode::Tab), &mut supervisor);
        assert_eq!(app.selected, 0);
    }
}
