use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use super::styles;

const BINDINGS: &[(&str, &str)] = &[
    ("a A K P < m", "previous file"),
    ("f F J N > /", "next file"),
    ("s S k p ,", "previous diff"),
    ("d D j n .", "next diff"),
    ("[ x", "previous comment"),
    ("] c", "next comment"),
    ("r", "recenter selection"),
    ("e", "expand collapsed lines"),
    ("w", "hide whitespace-only changes"),
    ("W", "highlight extra whitespace"),
    ("R", "retry failed files"),
    ("Ctrl-r", "reload the diff"),
    ("↑ ↓ PgUp PgDn", "scroll"),
    ("Home End", "top / bottom"),
    ("Ctrl-u Ctrl-d", "half page"),
    ("Tab", "file index"),
    ("q Ctrl-q", "quit"),
];

/// Keybinding reference popup
pub fn render_help(f: &mut Frame, area: Rect) {
    let height = (BINDINGS.len() as u16 + 4).min(area.height.saturating_sub(2));
    let width = 52u16.min(area.width.saturating_sub(4));
    let popup = centered_rect(width, height, area);
    f.render_widget(Clear, popup);

    let mut lines: Vec<Line> = vec![Line::from("")];
    for (keys, action) in BINDINGS {
        lines.push(Line::from(vec![
            Span::styled(format!("  {:<16}", keys), styles::key_hint_style().fg(styles::CYAN)),
            Span::styled(*action, Style::default().fg(styles::TEXT)),
        ]));
    }

    let block = Block::default()
        .title(Span::styled(
            " Keys · ? or Esc to close ",
            Style::default().fg(styles::BRIGHT).add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(styles::BLUE))
        .style(Style::default().bg(styles::PANEL));

    f.render_widget(Paragraph::new(lines).block(block), popup);
}

fn centered_rect(width: u16, height: u16, r: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(r.height.saturating_sub(height) / 2),
            Constraint::Length(height),
            Constraint::Min(0),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(r.width.saturating_sub(width) / 2),
            Constraint::Length(width),
            Constraint::Min(0),
        ])
        .split(vertical[1])[1]
}
