use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Padding, Paragraph},
    Frame,
};

use super::highlight::Highlighter;
use super::styles;
use crate::app::App;
use crate::diff::FileStatus;
use crate::document::{ContainerState, DocRow, FileContainer, RenderedFile, Row, RowGroup, RowKind};

/// A run of display text; `extra` marks whitespace worth flagging
#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment {
    text: String,
    extra: bool,
}

/// Split a line for display: tabs expand to `tab_width` columns, and with
/// `show_extra` tabs and trailing whitespace become their own segments.
fn whitespace_segments(text: &str, tab_width: usize, show_extra: bool) -> Vec<Segment> {
    let tab_width = tab_width.max(1);
    let trailing_from = text.trim_end().len();
    let mut segments: Vec<Segment> = Vec::new();
    let mut col = 0;

    let push = |segments: &mut Vec<Segment>, piece: &str, extra: bool| {
        match segments.last_mut() {
            Some(last) if last.extra == extra => last.text.push_str(piece),
            _ => segments.push(Segment {
                text: piece.to_string(),
                extra,
            }),
        }
    };

    for (i, ch) in text.char_indices() {
        let trailing = show_extra && i >= trailing_from;
        if ch == '\t' {
            let width = tab_width - col % tab_width;
            let shown = if show_extra {
                format!("→{}", " ".repeat(width - 1))
            } else {
                " ".repeat(width)
            };
            push(&mut segments, &shown, show_extra);
            col += width;
        } else {
            let mut buf = [0u8; 4];
            push(&mut segments, ch.encode_utf8(&mut buf), trailing);
            col += 1;
        }
    }
    segments
}

/// Render the diff view panel (right side)
pub fn render(f: &mut Frame, area: Rect, app: &App, hl: &mut Highlighter) {
    let page = &app.page;
    let doc = page.document();
    if doc.containers().is_empty() {
        render_empty(f, area);
        return;
    }

    let viewport = page.viewport();
    let height = area.height as usize;
    let mut lines: Vec<Line> = Vec::with_capacity(height);

    for doc_row in doc.rows(viewport.scroll_top, height) {
        match doc_row {
            DocRow::Pending { container, line } => lines.push(pending_line(container, line)),
            DocRow::Line {
                container,
                group_index,
                file,
                group,
                row_index,
                row,
            } => {
                let highlighted = viewport.highlighted == Some((container, group_index));
                lines.push(row_line(app, hl, file, group, row_index, row, highlighted));
            }
        }
    }

    let block = Block::default()
        .borders(Borders::NONE)
        .style(Style::default().bg(styles::BG))
        .padding(Padding::new(0, 1, 0, 0));
    f.render_widget(Paragraph::new(lines).block(block), area);

    // Position indicator in the top-right corner
    let anchors = page.anchors();
    let indicator_text = match anchors.cursor() {
        Some(i) => format!("{}/{}", i + 1, anchors.len()),
        None => "–".to_string(),
    };
    let indicator_width = indicator_text.chars().count() as u16 + 2;
    let indicator_area = Rect {
        x: area.x + area.width.saturating_sub(indicator_width + 1),
        y: area.y,
        width: indicator_width.min(area.width),
        height: 1,
    };
    let indicator = Paragraph::new(Line::from(Span::styled(
        format!(" {} ", indicator_text),
        Style::default().fg(styles::MUTED).bg(styles::PANEL),
    )));
    f.render_widget(indicator, indicator_area);
}

fn pending_line(container: &FileContainer, line: usize) -> Line<'static> {
    if line > 0 {
        return Line::from("");
    }
    match &container.state {
        ContainerState::Failed(message) => Line::from(vec![
            Span::styled("  ✗ ", styles::status_deleted()),
            Span::styled(container.file.path.clone(), Style::default().fg(styles::BRIGHT)),
            Span::styled(format!("  {}", message), Style::default().fg(styles::RED)),
            Span::styled("  R to retry", Style::default().fg(styles::DIM)),
        ]),
        _ => Line::from(vec![
            Span::styled("  ⋯ ", Style::default().fg(styles::DIM)),
            Span::styled(container.file.path.clone(), Style::default().fg(styles::MUTED)),
            Span::styled("  loading", Style::default().fg(styles::DIM)),
        ]),
    }
}

fn row_line(
    app: &App,
    hl: &mut Highlighter,
    file: &RenderedFile,
    group: &RowGroup,
    row_index: usize,
    row: &Row,
    highlighted: bool,
) -> Line<'static> {
    let bar = if highlighted {
        Span::styled("▌", Style::default().fg(styles::CYAN))
    } else {
        Span::raw(" ")
    };

    match row.kind {
        RowKind::FileHeader => {
            let status_style = match file.status {
                FileStatus::Added => styles::status_added(),
                FileStatus::Deleted => styles::status_deleted(),
                FileStatus::Renamed(_) => styles::status_renamed(),
                FileStatus::Modified => styles::status_modified(),
            };
            let mut spans = vec![
                bar,
                Span::styled(format!(" {} ", file.status.symbol()), status_style.bg(styles::HEADER_BG)),
                Span::styled(file.path.clone(), styles::file_header_style()),
            ];
            if let FileStatus::Renamed(from) = &file.status {
                spans.push(Span::styled(
                    format!("  (from {})", from),
                    Style::default().fg(styles::DIM).bg(styles::HEADER_BG),
                ));
            }
            spans.push(Span::styled(
                format!("  +{} -{}", file.adds, file.dels),
                Style::default().fg(styles::DIM).bg(styles::HEADER_BG),
            ));
            Line::from(spans).style(Style::default().bg(styles::HEADER_BG))
        }
        RowKind::Collapsed => {
            let mut spans = vec![bar, Span::styled(format!("   {}", row.text), styles::collapsed_style())];
            spans.extend(comment_marker(group, row_index));
            spans.push(Span::styled("  e to expand", Style::default().fg(styles::DIM).bg(styles::PANEL)));
            Line::from(spans).style(Style::default().bg(styles::PANEL))
        }
        RowKind::Context | RowKind::Insert | RowKind::Delete => {
            let (prefix, base_style) = match row.kind {
                RowKind::Insert => ("+", styles::add_style()),
                RowKind::Delete => ("-", styles::del_style()),
                _ => (" ", styles::default_style()),
            };
            let base_style = if highlighted && row.kind == RowKind::Context {
                base_style.bg(styles::HIGHLIGHT_BG)
            } else {
                base_style
            };

            let mut spans = vec![bar];
            if app.config.display.line_numbers {
                let num = |n: Option<usize>| n.map(|n| format!("{:>4}", n)).unwrap_or_else(|| "    ".to_string());
                spans.push(Span::styled(
                    format!("{} {} │", num(row.old_num), num(row.new_num)),
                    Style::default().fg(styles::DIM),
                ));
            }
            spans.push(Span::styled(prefix, base_style));

            let segments = whitespace_segments(
                &row.text,
                app.config.display.tab_width as usize,
                file.flags.show_extra_whitespace,
            );
            for segment in segments {
                if segment.extra {
                    spans.push(Span::styled(segment.text, styles::extra_whitespace_style()));
                } else {
                    spans.extend(hl.highlight(&segment.text, &file.path, base_style));
                }
            }
            spans.extend(comment_marker(group, row_index));
            Line::from(spans).style(base_style)
        }
    }
}

/// "💬 2 (1 open)" after the first row of a comment block
fn comment_marker(group: &RowGroup, row_index: usize) -> Vec<Span<'static>> {
    let mut spans = Vec::new();
    for anchor in group.anchors.iter().filter(|a| a.row == row_index) {
        let Some(marker) = anchor.marker else {
            continue;
        };
        spans.push(Span::styled(
            format!("  💬 {}", marker.count),
            Style::default().fg(styles::CYAN),
        ));
        if marker.unresolved > 0 {
            spans.push(Span::styled(
                format!(" ({} open)", marker.unresolved),
                Style::default().fg(styles::YELLOW),
            ));
        }
    }
    spans
}

/// Render an empty state when the diff has no files
fn render_empty(f: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::NONE)
        .style(Style::default().bg(styles::BG));

    let text = Paragraph::new(vec![
        Line::from(""),
        Line::from(""),
        Line::from(Span::styled("  This diff has no files", Style::default().fg(styles::MUTED))),
    ])
    .block(block);

    f.render_widget(text, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(text: &str, extra: bool) -> Segment {
        Segment {
            text: text.to_string(),
            extra,
        }
    }

    #[test]
    fn plain_line_is_one_segment() {
        assert_eq!(whitespace_segments("let x = 1;", 4, true), vec![seg("let x = 1;", false)]);
    }

    #[test]
    fn tabs_expand_to_next_stop() {
        assert_eq!(whitespace_segments("a\tb", 4, false), vec![seg("a   b", false)]);
    }

    #[test]
    fn tabs_and_trailing_space_are_flagged() {
        assert_eq!(
            whitespace_segments("\tx = 1;  ", 4, true),
            vec![seg("→   ", true), seg("x = 1;", false), seg("  ", true)]
        );
    }

    #[test]
    fn trailing_whitespace_untouched_when_off() {
        assert_eq!(whitespace_segments("x  ", 4, false), vec![seg("x  ", false)]);
    }
}
