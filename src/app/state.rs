use super::DiffPage;
use crate::config::ViewerConfig;
use crate::document::ContainerState;
use std::collections::VecDeque;

// ── Enums ──

/// Which panel receives navigation keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Diff,
    Index,
}

// ── Main App State ──

pub struct App {
    /// The diff page being viewed
    pub page: DiffPage,

    /// Application configuration (global + .rbd-config.toml)
    pub config: ViewerConfig,

    /// Shown in the top bar, e.g. "r/88 · diff 2"
    pub title: String,

    pub focus: Focus,

    /// Highlighted row of the file index
    pub index_selected: usize,

    pub show_help: bool,

    /// Should the app quit?
    pub should_quit: bool,

    /// Last notification message
    pub message: Option<String>,

    /// Ticks since last notification (for auto-clearing)
    pub message_ticks: u8,

    /// Page notices waiting for the notification slot
    pub pending_notices: VecDeque<String>,

    /// Height of the diff area at the last draw, for paging
    pub diff_height: usize,
}

impl App {
    pub fn new(page: DiffPage, config: ViewerConfig, title: String) -> Self {
        App {
            page,
            config,
            title,
            focus: Focus::Diff,
            index_selected: 0,
            show_help: false,
            should_quit: false,
            message: None,
            message_ticks: 0,
            pending_notices: VecDeque::new(),
            diff_height: 20,
        }
    }

    // ── File index ──

    pub fn toggle_index_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Diff => {
                self.sync_index_selection();
                Focus::Index
            }
            Focus::Index => Focus::Diff,
        };
    }

    pub fn index_next(&mut self) {
        let total = self.page.document().containers().len();
        if self.index_selected + 1 < total {
            self.index_selected += 1;
        }
    }

    pub fn index_prev(&mut self) {
        self.index_selected = self.index_selected.saturating_sub(1);
    }

    /// Jump to the file under the index cursor and hand focus back to the diff
    pub fn index_jump(&mut self) {
        let container = self.index_selected;
        if !self.page.jump_to_file(container) {
            let msg = match self.page.document().container(container).map(|c| &c.state) {
                Some(ContainerState::Rendered(_)) => "That file has nothing to show",
                Some(ContainerState::Failed(_)) => "That file failed to load (R to retry)",
                Some(ContainerState::Placeholder) => "Will jump once the file has loaded",
                None => "",
            };
            if !msg.is_empty() {
                self.notify(msg);
            }
        }
        self.focus = Focus::Diff;
    }

    /// Keep the index cursor on the file being viewed
    pub fn sync_index_selection(&mut self) {
        if let Some(container) = self.page.current_container() {
            self.index_selected = container;
        }
    }

    // ── Page commands ──

    /// Run a navigation command; the index follows the cursor
    pub fn navigate(&mut self, command: fn(&mut DiffPage) -> bool) {
        if command(&mut self.page) {
            self.sync_index_selection();
        }
    }

    pub fn expand_in_view(&mut self) {
        match self.page.expandable_in_view(self.diff_height) {
            Some((container, group)) => {
                self.page.expand_chunk(container, group);
            }
            None => self.notify("No collapsed lines in view"),
        }
    }

    pub fn toggle_whitespace_only_chunks(&mut self) {
        let hidden = self.page.toggle_whitespace_only_chunks();
        self.notify(if hidden {
            "Hiding whitespace-only changes"
        } else {
            "Showing whitespace-only changes"
        });
    }

    pub fn toggle_extra_whitespace(&mut self) {
        let shown = self.page.toggle_extra_whitespace();
        self.notify(if shown {
            "Highlighting extra whitespace"
        } else {
            "Extra whitespace highlighting off"
        });
    }

    pub fn retry_failed(&mut self) {
        match self.page.retry_failed() {
            0 => self.notify("Nothing to retry"),
            n => self.notify(&format!("Retrying {} file{}", n, if n == 1 { "" } else { "s" })),
        }
    }

    pub fn reload(&mut self) {
        self.page.reload();
        self.index_selected = 0;
        self.notify("Reloading diff");
    }

    pub fn page_down(&mut self) {
        self.page.scroll_down(self.diff_height.max(1));
    }

    pub fn page_up(&mut self) {
        self.page.scroll_up(self.diff_height.max(1));
    }

    pub fn half_page_down(&mut self) {
        self.page.scroll_down((self.diff_height / 2).max(1));
    }

    pub fn half_page_up(&mut self) {
        self.page.scroll_up((self.diff_height / 2).max(1));
    }

    pub fn quit(&mut self) {
        self.page.dispose();
        self.should_quit = true;
    }

    // ── Notifications ──

    pub fn notify(&mut self, msg: &str) {
        self.message = Some(msg.to_string());
        self.message_ticks = 0;
    }

    /// Tick called on every event loop iteration: auto-clears the current
    /// notification, then shows the next queued page notice
    pub fn tick(&mut self) {
        self.pending_notices.extend(self.page.take_notices());
        if self.message.is_some() {
            self.message_ticks += 1;
            if self.message_ticks > 30 {
                self.message = None;
                self.message_ticks = 0;
            }
        }
        if self.message.is_none() {
            if let Some(next) = self.pending_notices.pop_front() {
                self.notify(&next);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::AppContext;
    use crate::diff::{parse_patch, DiffFile};
    use crate::session::MemorySession;
    use std::collections::HashMap;
    use std::sync::Arc;

    const PATCH: &str = "\
diff --git a/a.rs b/a.rs
--- a/a.rs
+++ b/a.rs
@@ -1,2 +1,2 @@
-one
+uno
 two
diff --git a/b.rs b/b.rs
--- a/b.rs
+++ b/b.rs
@@ -1,1 +1,2 @@
 three
+four
diff --git a/c.rs b/c.rs
--- a/c.rs
+++ b/c.rs
@@ -1,1 +1,1 @@
-five
+cinco
";

    fn make_app() -> App {
        let config = ViewerConfig::default();
        let ctx = AppContext {
            config: config.clone(),
            session: Arc::new(MemorySession::default()),
        };
        let patches = parse_patch(PATCH);
        let mut page = DiffPage::new(&ctx, DiffFile::from_local_patches(&patches), HashMap::new(), None);
        for (i, patch) in patches.iter().enumerate() {
            page.prerender(i, patch);
        }
        page.init();
        App::new(page, config, "test".into())
    }

    #[test]
    fn navigation_keeps_index_in_step() {
        let mut app = make_app();
        app.navigate(DiffPage::select_next_file);
        assert_eq!(app.index_selected, 1);
        app.navigate(DiffPage::select_next_file);
        assert_eq!(app.index_selected, 2);
        app.navigate(DiffPage::select_next_file);
        assert_eq!(app.index_selected, 2);
    }

    #[test]
    fn index_jump_selects_file_anchor_and_returns_focus() {
        let mut app = make_app();
        app.toggle_index_focus();
        assert_eq!(app.focus, Focus::Index);
        app.index_next();
        app.index_next();
        app.index_next();
        assert_eq!(app.index_selected, 2);
        app.index_jump();
        assert_eq!(app.focus, Focus::Diff);
        assert_eq!(app.page.selected_anchor().unwrap().name, "2");
    }

    #[test]
    fn notifications_clear_after_ticks() {
        let mut app = make_app();
        app.notify("hello");
        for _ in 0..31 {
            app.tick();
        }
        assert!(app.message.is_none());
    }

    #[test]
    fn retry_with_nothing_failed_says_so() {
        let mut app = make_app();
        app.retry_failed();
        assert_eq!(app.message.as_deref(), Some("Nothing to retry"));
    }

    /// Nothing prerendered and no loader: every file fails
    fn failing_app() -> App {
        let config = ViewerConfig::default();
        let ctx = AppContext {
            config: config.clone(),
            session: Arc::new(MemorySession::default()),
        };
        let files = DiffFile::from_local_patches(&parse_patch(PATCH));
        let mut page = DiffPage::new(&ctx, files, HashMap::new(), None);
        page.init();
        App::new(page, config, "test".into())
    }

    #[test]
    fn every_failure_notice_is_shown_in_turn() {
        let mut app = failing_app();
        let mut shown: Vec<String> = Vec::new();
        for _ in 0..200 {
            app.tick();
            if let Some(msg) = &app.message {
                if shown.last() != Some(msg) {
                    shown.push(msg.clone());
                }
            }
        }
        assert_eq!(shown.len(), 3);
        for path in ["a.rs", "b.rs", "c.rs"] {
            assert!(shown.iter().any(|m| m.contains(path)), "no notice for {}", path);
        }
    }

    #[test]
    fn jumping_to_failed_file_points_at_retry() {
        let mut app = failing_app();
        app.toggle_index_focus();
        app.index_next();
        app.index_jump();
        let msg = app.message.as_deref().unwrap();
        assert!(msg.contains("failed"));
        assert!(msg.contains("R to retry"));
    }

    #[test]
    fn quit_disposes_page() {
        let mut app = make_app();
        app.quit();
        assert!(app.should_quit);
        assert!(!app.page.is_loading());
    }
}
