use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem},
    Frame,
};

use super::styles;
use crate::app::{App, Focus};
use crate::diff::FileStatus;
use crate::document::ContainerState;

/// Render the file index panel (left side)
pub fn render(f: &mut Frame, area: Rect, app: &App) {
    let doc = app.page.document();
    let containers = doc.containers();
    let (loaded, total) = app.page.progress();
    let focused = app.focus == Focus::Index;
    let current = app.page.current_container();

    let title = if loaded < total {
        format!(" FILES ({}/{}) ", loaded, total)
    } else {
        format!(" FILES ({}) ", total)
    };

    // Virtualized: only the window around the index cursor is built
    let viewport_height = area.height.saturating_sub(1) as usize;
    let anchor_row = if focused {
        app.index_selected
    } else {
        current.unwrap_or(0)
    };
    let scroll = if containers.len() <= viewport_height || anchor_row < viewport_height / 2 {
        0
    } else {
        anchor_row
            .saturating_sub(viewport_height / 2)
            .min(containers.len().saturating_sub(viewport_height))
    };
    let end = (scroll + viewport_height).min(containers.len());

    let path_width = (area.width as usize).saturating_sub(14).max(1);
    let items: Vec<ListItem> = containers[scroll..end]
        .iter()
        .enumerate()
        .map(|(offset, container)| {
            let idx = scroll + offset;
            let is_selected = focused && idx == app.index_selected;
            let is_current = current == Some(idx);

            let (symbol, symbol_style, stats) = match &container.state {
                ContainerState::Placeholder => ("…", Style::default().fg(styles::DIM), String::new()),
                ContainerState::Failed(_) => ("✗", styles::status_deleted(), "failed".to_string()),
                ContainerState::Rendered(r) => {
                    let style = match r.status {
                        FileStatus::Added => styles::status_added(),
                        FileStatus::Deleted => styles::status_deleted(),
                        FileStatus::Renamed(_) => styles::status_renamed(),
                        FileStatus::Modified => styles::status_modified(),
                    };
                    (r.status.symbol(), style, format!("+{} -{}", r.adds, r.dels))
                }
            };

            let path = shorten_path(&container.file.path, path_width);
            let path_style = if is_selected {
                styles::selected_style()
            } else if is_current {
                Style::default().fg(styles::BRIGHT)
            } else {
                Style::default().fg(styles::TEXT)
            };

            let mut spans = vec![
                Span::styled(if is_current { "▸" } else { " " }, Style::default().fg(styles::CYAN)),
                Span::styled(format!("{} ", symbol), symbol_style),
                Span::styled(format!("{:<width$}", path, width = path_width), path_style),
            ];
            if area.width > 24 {
                spans.push(Span::styled(format!("{:>9} ", stats), Style::default().fg(styles::DIM)));
            }

            let line_style = if is_selected {
                styles::selected_style()
            } else {
                Style::default().bg(styles::PANEL)
            };
            ListItem::new(Line::from(spans)).style(line_style)
        })
        .collect();

    let border_color = if focused { styles::BLUE } else { styles::BORDER };
    let block = Block::default()
        .title(Span::styled(title, Style::default().fg(styles::MUTED)))
        .borders(Borders::RIGHT)
        .border_style(Style::default().fg(border_color))
        .style(Style::default().bg(styles::PANEL));

    f.render_widget(List::new(items).block(block), area);
}

/// Fit a path into `max_width` columns, keeping the file name when possible
fn shorten_path(path: &str, max_width: usize) -> String {
    let len = path.chars().count();
    if len <= max_width {
        return path.to_string();
    }

    let name = path.rsplit('/').next().unwrap_or(path);
    let name_len = name.chars().count();
    if name_len < max_width {
        let room = max_width.saturating_sub(name_len + 2);
        if room > 0 {
            let dir: String = path.chars().take(room).collect();
            return format!("{}…/{}", dir, name);
        }
        return name.to_string();
    }

    let truncated: String = name.chars().take(max_width.saturating_sub(1)).collect();
    format!("{}…", truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_paths_are_kept() {
        assert_eq!(shorten_path("src/lib.rs", 20), "src/lib.rs");
    }

    #[test]
    fn long_directories_are_elided() {
        let shown = shorten_path("reviewboard/static/rb/js/views/diffViewerPageView.js", 30);
        assert!(shown.ends_with("…/diffViewerPageView.js"));
        assert!(shown.chars().count() <= 30);
    }

    #[test]
    fn long_file_name_is_truncated() {
        assert_eq!(shorten_path("a/abcdefghij.rs", 6), "abcde…");
    }
}
