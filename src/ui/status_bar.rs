use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use super::styles;
use crate::app::{App, Focus};

/// One key hint in the bottom bar
struct Hint {
    key: &'static str,
    label: &'static str,
}

impl Hint {
    const fn new(key: &'static str, label: &'static str) -> Self {
        Hint { key, label }
    }

    fn width(&self) -> usize {
        self.key.chars().count() + self.label.chars().count()
    }
}

fn spans_width(spans: &[Span]) -> usize {
    spans.iter().map(|s| s.content.chars().count()).sum()
}

/// Top bar: title, load progress (left) and display toggles (right)
pub fn render_top_bar(f: &mut Frame, area: Rect, app: &App) {
    let page = &app.page;
    let (loaded, total) = page.progress();
    let flags = page.document().defaults();

    let mut left = vec![
        Span::styled(
            format!(" {}", app.title),
            Style::default().fg(styles::CYAN).add_modifier(Modifier::BOLD),
        ),
        Span::styled(" · ", Style::default().fg(styles::BORDER)),
        Span::styled(
            format!("{} file{}", total, if total == 1 { "" } else { "s" }),
            Style::default().fg(styles::GREEN),
        ),
    ];
    if page.is_loading() {
        left.push(Span::styled(
            format!("  loading {}/{}", loaded, total),
            Style::default().fg(styles::YELLOW),
        ));
    }
    let failed = page.document().failed_containers().len();
    if failed > 0 {
        left.push(Span::styled(
            format!("  {} failed", failed),
            Style::default().fg(styles::RED),
        ));
    }

    let toggle = |label: &'static str, on: bool| {
        if on {
            Span::styled(label, Style::default().fg(styles::BG).bg(styles::BLUE))
        } else {
            Span::styled(label, Style::default().fg(styles::MUTED))
        }
    };
    let right = vec![
        toggle(" w hide ws-only ", flags.collapse_whitespace_chunks),
        Span::raw(" "),
        toggle(" W extra ws ", flags.show_extra_whitespace),
        Span::raw(" "),
    ];

    let gap = (area.width as usize).saturating_sub(spans_width(&left) + spans_width(&right));
    let mut spans = left;
    spans.push(Span::raw(" ".repeat(gap)));
    spans.extend(right);

    let bar = Paragraph::new(Line::from(spans)).style(Style::default().bg(styles::PANEL));
    f.render_widget(bar, area);
}

fn build_hints(app: &App) -> Vec<Hint> {
    if app.focus == Focus::Index {
        return vec![
            Hint::new("j/k", " move "),
            Hint::new("⏎", " jump "),
            Hint::new("Tab", " back "),
            Hint::new("q", " quit "),
        ];
    }

    let mut hints = vec![
        Hint::new("f/a", " files "),
        Hint::new("d/s", " diffs "),
        Hint::new("]/[", " comments "),
        Hint::new("r", " recenter "),
    ];
    if app.page.has_loader() {
        hints.push(Hint::new("e", " expand "));
    }
    hints.push(Hint::new("w/W", " whitespace "));
    if !app.page.document().failed_containers().is_empty() {
        hints.push(Hint::new("R", " retry "));
    }
    hints.push(Hint::new("Tab", " index "));
    hints.push(Hint::new("?", " help "));
    hints.push(Hint::new("q", " quit "));
    hints
}

/// Pack hints into as many lines as the width requires
fn pack_hint_lines(hints: &[Hint], width: usize) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();
    let mut current_w: usize = 1;

    for hint in hints {
        let hw = hint.width();
        if current_w + hw > width && !current.is_empty() {
            lines.push(Line::from(std::mem::take(&mut current)));
            current_w = 1;
        }
        if current.is_empty() {
            current.push(Span::raw(" "));
        }
        current.push(Span::styled(hint.key, styles::key_hint_style()));
        current.push(Span::styled(hint.label, Style::default().fg(styles::DIM)));
        current_w += hw;
    }
    if !current.is_empty() {
        lines.push(Line::from(current));
    }
    if lines.is_empty() {
        lines.push(Line::from(" "));
    }
    lines
}

/// Calculate how many rows the bottom bar needs
pub fn bottom_bar_height(app: &App, width: u16) -> u16 {
    (pack_hint_lines(&build_hints(app), width as usize).len() as u16).max(1)
}

/// Render the bottom keybinding hints bar
pub fn render_bottom_bar(f: &mut Frame, area: Rect, app: &App) {
    let lines = pack_hint_lines(&build_hints(app), area.width as usize);
    let bar = Paragraph::new(lines).style(Style::default().bg(styles::PANEL));
    f.render_widget(bar, area);
}

/// Transient notification in the top-right corner
pub fn render_notification(f: &mut Frame, area: Rect, message: &str) {
    let width = (message.chars().count() as u16 + 4).min(area.width);
    let notif_area = Rect {
        x: area.x + area.width.saturating_sub(width + 2),
        y: area.y + 2,
        width,
        height: 1,
    };

    let notif = Paragraph::new(Line::from(vec![
        Span::styled(" ● ", Style::default().fg(styles::GREEN)),
        Span::styled(message.to_string(), Style::default().fg(styles::TEXT)),
        Span::raw(" "),
    ]))
    .style(Style::default().bg(styles::PANEL).fg(styles::TEXT));

    f.render_widget(notif, notif_area);
}
