mod diff_view;
mod file_index;
mod help;
pub mod highlight;
mod status_bar;
mod styles;

use crate::app::App;
use highlight::Highlighter;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::Frame;

/// Index panels narrower than this leave too little room for the diff
const MIN_DIFF_WIDTH: u16 = 40;

/// Render the entire UI
pub fn draw(f: &mut Frame, app: &App, hl: &mut Highlighter) {
    let bottom_height = status_bar::bottom_bar_height(app, f.area().width);

    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),             // top bar
            Constraint::Min(1),                // main content
            Constraint::Length(bottom_height), // key hints
        ])
        .split(f.area());

    status_bar::render_top_bar(f, outer[0], app);

    let index_width = app.config.display.index_width;
    if index_width > 0 && outer[1].width >= index_width + MIN_DIFF_WIDTH {
        let main_area = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(index_width), Constraint::Min(1)])
            .split(outer[1]);
        file_index::render(f, main_area[0], app);
        diff_view::render(f, main_area[1], app, hl);
    } else {
        diff_view::render(f, outer[1], app, hl);
    }

    status_bar::render_bottom_bar(f, outer[2], app);

    if let Some(ref msg) = app.message {
        status_bar::render_notification(f, f.area(), msg);
    }

    if app.show_help {
        help::render_help(f, f.area());
    }
}

/// Rows available to the diff for a terminal of `width` x `height`
pub fn diff_height(app: &App, width: u16, height: u16) -> usize {
    let bottom = status_bar::bottom_bar_height(app, width);
    height.saturating_sub(1 + bottom) as usize
}
