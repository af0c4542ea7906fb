//! Dashboard rendering: process sidebar, foregrounded log pane, key hints.

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, BorderType, Borders, Paragraph};
use ratatui::Frame;

use deck::{Process, ProcessStatus, Supervisor};

use crate::app::App;

const SIDEBAR_WIDTH: u16 = 28;

pub(crate) fn draw(frame: &mut Frame<'_>, app: &mut App, supervisor: &Supervisor) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(frame.area());
    let panes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(20)])
        .split(rows[0]);

    draw_sidebar(frame, panes[0], app, supervisor);
    draw_log_pane(frame, panes[1], app, supervisor);
    draw_footer(frame, rows[1], app, supervisor);
}

fn status_style(status: ProcessStatus) -> Style {
    match status {
        ProcessStatus::Running => Style::default().fg(Color::Green),
        ProcessStatus::Pending => Style::default().fg(Color::DarkGray),
        ProcessStatus::Exited => Style::default().fg(Color::Gray),
        ProcessStatus::Crashed => Style::default().fg(Color::Red),
    }
}

fn status_label(process: &Process) -> String {
    match process.exit_code() {
        Some(code) if process.status() != ProcessStatus::Running => {
            format!("{} ({code})", process.status())
        }
        _ => process.status().to_string(),
    }
}

fn draw_sidebar(frame: &mut Frame<'_>, area: Rect, app: &App, supervisor: &Supervisor) {
    let lines: Vec<Line> = supervisor
        .processes()
        .iter()
        .enumerate()
        .map(|(i, process)| {
            let marker = if i == app.selected { "> " } else { "  " };
            let name_style = if i == app.selected {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            Line::from(vec![
                Span::raw(marker),
                Span::styled(process.name().to_string(), name_style),
                Span::raw("  "),
                Span::styled(status_label(process), status_style(process.status())),
            ])
        })
        .collect();
    let sidebar = Paragraph::new(Text::from(lines)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .title(" processes "),
    );
    frame.render_widget(sidebar, area);
}

fn draw_log_pane(frame: &mut Frame<'_>, area: Rect, app: &mut App, supervisor: &Supervisor) {
    let viewport_rows = area.height.saturating_sub(2) as usize;
    app.log_viewport_rows = viewport_rows;

    let Some(process) = supervisor.processes().get(app.selected) else {
        frame.render_widget(
            Paragraph::new("no processes").block(Block::default().borders(Borders::ALL)),
            area,
        );
        return;
    };

    let lines: Vec<Line> = process
        .log()
        .iter_from(app.scroll_offset)
        .take(viewport_rows)
        .map(|line| Line::from(line.text_lossy().into_owned()))
        .collect();
    let title = format!(" {} - {} ", process.name(), process.command());
    let pane = Paragraph::new(Text::from(lines)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(status_style(process.status()))
            .title(title),
    );
    frame.render_widget(pane, area);
}

fn draw_footer(frame: &mut Frame<'_>, area: Rect, app: &App, supervisor: &Supervisor) {
    let follow = if app.auto_scroll { "on" } else { "off" };
    let alive = if supervisor.any_alive() {
        String::new()
    } else {
        "  [all stopped]".to_string()
    };
    let hints = format!(
        " q quit | tab switch | up/down scroll | r restart | x kill | a follow: {follow}{alive}"
    );
    frame.render_widget(
        Paragraph::new(hints).style(Style::default().fg(Color::DarkGray)),
        area,
    );
}
