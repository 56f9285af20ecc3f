use super::AppContext;
use crate::diff::{parse_context_lines, parse_file_patch, CommentBlock, DiffFile, FilePatch};
use crate::document::{
    expand_collapsed, render_file, DiffDocument, DocRow, GroupKind, PageSurface, RenderFlags,
    Viewport,
};
use crate::load::{LoadEvent, LoadQueue, LoadQueueEntry, LoadTask, LoadWorker};
use crate::nav::{Anchor, AnchorIndex, AnchorSurface};
use crate::session::{SessionAttribute, SessionStore};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Controller for one diff page: owns the document, the anchor index and
/// the load queue, and turns worker results into rendered files.
///
/// Every load result flows through [`DiffPage::handle_event`], which is
/// also the only place the queue advances.
pub struct DiffPage {
    document: DiffDocument,
    anchors: AnchorIndex,
    viewport: Viewport,
    queue: LoadQueue<LoadQueueEntry>,
    worker: Option<LoadWorker>,
    session: Arc<dyn SessionStore>,
    comments: HashMap<u64, Vec<CommentBlock>>,
    /// Patches that came with the page, kept so a reload can render them again
    prerendered: HashMap<usize, FilePatch>,
    /// Deep-link target still waiting for its file to load
    pending_anchor: Option<String>,
    /// Collapsed groups with a chunk fetch queued or in flight
    expanding: HashSet<(usize, usize)>,
    generation: u64,
    notices: Vec<String>,
    disposed: bool,
}

impl DiffPage {
    pub fn new(
        ctx: &AppContext,
        files: Vec<DiffFile>,
        comments: HashMap<u64, Vec<CommentBlock>>,
        worker: Option<LoadWorker>,
    ) -> Self {
        let display = &ctx.config.display;
        let defaults = RenderFlags {
            collapse_whitespace_chunks: display.hide_whitespace_only,
            show_extra_whitespace: display.show_extra_whitespace,
        };
        DiffPage {
            document: DiffDocument::new(files, defaults),
            anchors: AnchorIndex::new(display.anchor_offset),
            viewport: Viewport::default(),
            queue: LoadQueue::new(),
            worker,
            session: Arc::clone(&ctx.session),
            comments,
            prerendered: HashMap::new(),
            pending_anchor: None,
            expanding: HashSet::new(),
            generation: 0,
            notices: Vec::new(),
            disposed: false,
        }
    }

    // ── Accessors ──

    pub fn document(&self) -> &DiffDocument {
        &self.document
    }

    pub fn anchors(&self) -> &AnchorIndex {
        &self.anchors
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn selected_anchor(&self) -> Option<&Anchor> {
        self.anchors.selected()
    }

    /// Container the user is looking at: the selected anchor's file, or the
    /// file at the top of the viewport
    pub fn current_container(&self) -> Option<usize> {
        self.anchors
            .selected()
            .map(|a| a.node.container)
            .or_else(|| self.document.container_at(self.viewport.scroll_top))
    }

    pub fn is_loading(&self) -> bool {
        !self.queue.is_idle()
    }

    /// (rendered files, total files)
    pub fn progress(&self) -> (usize, usize) {
        (self.document.loaded_count(), self.document.containers().len())
    }

    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }

    fn notice(&mut self, msg: impl Into<String>) {
        self.notices.push(msg.into());
    }

    fn comments_for(&self, file: &DiffFile) -> &[CommentBlock] {
        self.comments
            .get(&file.filediff_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    // ── Lifecycle ──

    /// Render a file whose content came with the page itself. Its queue
    /// entry will skip the fetch.
    pub fn prerender(&mut self, container: usize, patch: &FilePatch) {
        if self.render_patch(container, patch) {
            self.prerendered.insert(container, patch.clone());
        }
    }

    fn render_patch(&mut self, container: usize, patch: &FilePatch) -> bool {
        let Some(file) = self.document.container(container).map(|c| c.file.clone()) else {
            return false;
        };
        let rendered = render_file(&file, patch, self.comments_for(&file), self.document.defaults());
        self.document.set_rendered(container, rendered);
        true
    }

    /// Anchor to jump to as soon as it is registered
    pub fn set_start_anchor(&mut self, name: Option<String>) {
        self.pending_anchor = name.filter(|n| !n.is_empty());
    }

    /// Queue every file in page order and start loading
    pub fn init(&mut self) {
        let files: Vec<DiffFile> = self
            .document
            .containers()
            .iter()
            .map(|c| c.file.clone())
            .collect();
        log::info!("loading {} files", files.len());
        for (container, file) in files.into_iter().enumerate() {
            self.queue_load_diff(container, file);
        }
        let next = self.queue.start();
        self.dispatch(next);
    }

    pub fn queue_load_diff(&mut self, container: usize, file: DiffFile) {
        self.queue.enqueue(LoadQueueEntry {
            container,
            file,
            task: LoadTask::File,
            generation: self.generation,
        });
    }

    /// Stop loading. Pending entries are dropped and late results ignored.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        let dropped = self.queue.cancel();
        if let Some(worker) = &self.worker {
            worker.cancel();
        }
        log::debug!("page disposed, {} pending loads dropped", dropped);
    }

    /// Hand entries to the worker until one is actually in flight.
    /// Files that are already rendered only need their anchors registered.
    fn dispatch(&mut self, mut next: Option<LoadQueueEntry>) {
        while let Some(entry) = next.take() {
            if entry.task == LoadTask::File && self.document.is_rendered(entry.container) {
                log::debug!("{} already rendered, skipping fetch", entry.file.path);
                self.register(entry.container);
                next = self.queue.complete();
                continue;
            }

            let submitted = match &self.worker {
                Some(worker) => worker.submit(entry.clone()),
                None => false,
            };
            if submitted {
                return;
            }

            log::warn!("no loader available for {}", entry.file.path);
            self.fail(&entry, "no review server to load from".to_string());
            next = self.queue.complete();
        }
        self.finish_if_idle();
    }

    /// Apply one worker result and move the queue on
    pub fn handle_event(&mut self, event: LoadEvent) {
        let entry = match &event {
            LoadEvent::Loaded { entry, .. } | LoadEvent::Failed { entry, .. } => entry,
        };
        if self.disposed || entry.generation != self.generation {
            log::debug!("dropping stale result for {}", entry.file.path);
            return;
        }

        match event {
            LoadEvent::Loaded { entry, body } => self.apply_loaded(entry, body),
            LoadEvent::Failed { entry, error } => {
                log::warn!("failed to load {}: {}", entry.file.path, error);
                self.fail(&entry, error.to_string());
            }
        }

        let next = self.queue.complete();
        self.dispatch(next);
    }

    fn apply_loaded(&mut self, entry: LoadQueueEntry, body: String) {
        match entry.task {
            LoadTask::File => {
                let patch = parse_file_patch(&body, &entry.file.path);
                let rendered = render_file(
                    &entry.file,
                    &patch,
                    self.comments_for(&entry.file),
                    self.document.defaults(),
                );
                self.document.set_rendered(entry.container, rendered);
                self.register(entry.container);
            }
            LoadTask::Chunk { group, chunk_index } => {
                self.expanding.remove(&(entry.container, group));
                let lines = parse_context_lines(&body);
                let expanded = self
                    .document
                    .rendered_mut(entry.container)
                    .is_some_and(|r| expand_collapsed(r, group, lines));
                debug_assert!(
                    expanded,
                    "chunk {} of {} is not a collapsed group",
                    chunk_index, entry.file.path
                );
                if !expanded {
                    log::error!("chunk {} of {} is not a collapsed group", chunk_index, entry.file.path);
                    return;
                }
                self.recenter_selected();
            }
        }
    }

    fn fail(&mut self, entry: &LoadQueueEntry, message: String) {
        match entry.task {
            LoadTask::File => {
                self.document.set_failed(entry.container, message);
                self.notice(format!("Failed to load {} (R to retry)", entry.file.path));
            }
            LoadTask::Chunk { group, .. } => {
                self.expanding.remove(&(entry.container, group));
                self.notice(format!("Failed to expand lines in {}", entry.file.path));
            }
        }
    }

    /// Scan a freshly rendered container, then try the deep link
    fn register(&mut self, container: usize) {
        let mut surface = PageSurface {
            document: &self.document,
            viewport: &mut self.viewport,
        };
        self.anchors.register_anchors(container, &mut surface);

        if let Some(name) = self.pending_anchor.as_deref() {
            if self.anchors.select_anchor_by_name(name, true, &mut surface) {
                log::info!("jumped to anchor {}", name);
                self.pending_anchor = None;
            }
        }
    }

    fn finish_if_idle(&mut self) {
        if !self.queue.is_idle() {
            return;
        }
        if let Some(name) = self.pending_anchor.take() {
            log::info!("anchor {} not found on this page", name);
            self.notice(format!("No anchor named {}", name));
        }
    }

    /// Re-queue every file that failed to load
    pub fn retry_failed(&mut self) -> usize {
        let failed = self.document.failed_containers();
        for &container in &failed {
            if let Some(file) = self.document.container(container).map(|c| c.file.clone()) {
                self.queue_load_diff(container, file);
            }
        }
        if !failed.is_empty() {
            log::info!("retrying {} failed files", failed.len());
            let next = self.queue.start();
            self.dispatch(next);
        }
        failed.len()
    }

    /// Throw away everything rendered and load the page again. Files that
    /// came with the page are rendered again from their own patches.
    pub fn reload(&mut self) {
        self.generation += 1;
        self.queue.cancel();
        self.expanding.clear();
        self.document.reset();
        self.anchors.reset();
        self.viewport = Viewport::default();
        self.disposed = false;

        let prerendered = std::mem::take(&mut self.prerendered);
        for (&container, patch) in &prerendered {
            self.render_patch(container, patch);
        }
        self.prerendered = prerendered;

        self.init();
    }

    pub fn has_loader(&self) -> bool {
        self.worker.is_some()
    }

    // ── Navigation ──

    fn with_surface(&mut self, f: impl FnOnce(&mut AnchorIndex, &mut dyn AnchorSurface) -> bool) -> bool {
        let mut surface = PageSurface {
            document: &self.document,
            viewport: &mut self.viewport,
        };
        f(&mut self.anchors, &mut surface)
    }

    pub fn select_previous_file(&mut self) -> bool {
        self.with_surface(AnchorIndex::select_previous_file)
    }

    pub fn select_next_file(&mut self) -> bool {
        self.with_surface(AnchorIndex::select_next_file)
    }

    pub fn select_previous_diff(&mut self) -> bool {
        self.with_surface(AnchorIndex::select_previous_diff)
    }

    pub fn select_next_diff(&mut self) -> bool {
        self.with_surface(AnchorIndex::select_next_diff)
    }

    pub fn select_previous_comment(&mut self) -> bool {
        self.with_surface(AnchorIndex::select_previous_comment)
    }

    pub fn select_next_comment(&mut self) -> bool {
        self.with_surface(AnchorIndex::select_next_comment)
    }

    pub fn recenter_selected(&mut self) -> bool {
        self.with_surface(AnchorIndex::recenter_selected)
    }

    pub fn select_anchor_by_name(&mut self, name: &str) -> bool {
        self.with_surface(|anchors, surface| anchors.select_anchor_by_name(name, true, surface))
    }

    /// Jump to a file's header. A file that has not loaded yet becomes the
    /// pending target and is selected once its anchors register.
    pub fn jump_to_file(&mut self, container: usize) -> bool {
        let Some(name) = self.document.container(container).map(|c| c.file.anchor_name()) else {
            return false;
        };
        if self.select_anchor_by_name(&name) {
            return true;
        }
        if !self.document.is_rendered(container) && !self.queue.is_idle() {
            self.pending_anchor = Some(name);
        }
        false
    }

    // ── Display toggles ──

    pub fn toggle_whitespace_only_chunks(&mut self) -> bool {
        let hidden = self.document.toggle_whitespace_only_chunks();
        log::debug!("whitespace-only chunks hidden: {}", hidden);
        self.recenter_selected();
        self.clamp_scroll();
        hidden
    }

    pub fn toggle_extra_whitespace(&mut self) -> bool {
        let shown = self.document.toggle_extra_whitespace();
        self.session.set(SessionAttribute::ShowExtraWhitespace, shown);
        self.recenter_selected();
        shown
    }

    // ── Chunk expansion ──

    /// The group `e` acts on: the highlighted one when it is collapsed,
    /// else the first collapsed group inside the viewport
    pub fn expandable_in_view(&self, height: usize) -> Option<(usize, usize)> {
        if let Some((container, group)) = self.viewport.highlighted {
            if self.is_collapsed(container, group) {
                return Some((container, group));
            }
        }
        self.document
            .rows(self.viewport.scroll_top, height)
            .into_iter()
            .find_map(|row| match row {
                DocRow::Line {
                    container,
                    group_index,
                    group,
                    ..
                } if matches!(group.kind, GroupKind::Collapsed { .. }) => Some((container, group_index)),
                _ => None,
            })
    }

    fn is_collapsed(&self, container: usize, group: usize) -> bool {
        self.document
            .container(container)
            .and_then(|c| c.rendered())
            .and_then(|r| r.groups.get(group))
            .is_some_and(|g| matches!(g.kind, GroupKind::Collapsed { .. }))
    }

    /// Queue a fetch for the unchanged lines behind a collapsed group.
    /// Returns false when the group is already being expanded or there is
    /// nothing to fetch from.
    pub fn expand_chunk(&mut self, container: usize, group: usize) -> bool {
        let Some(c) = self.document.container(container) else {
            return false;
        };
        let chunk_index = c
            .rendered()
            .and_then(|r| r.groups.get(group))
            .filter(|g| matches!(g.kind, GroupKind::Collapsed { .. }))
            .and_then(|g| g.chunk_index);
        debug_assert!(
            chunk_index.is_some(),
            "group {} of {} is not an expandable chunk",
            group,
            c.file.path
        );
        let Some(chunk_index) = chunk_index else {
            log::error!("group {} of {} is not an expandable chunk", group, c.file.path);
            return false;
        };
        let file = c.file.clone();

        if self.worker.is_none() {
            self.notice("Collapsed lines need a review server to load from");
            return false;
        }
        if !self.expanding.insert((container, group)) {
            return false;
        }
        log::debug!("expanding chunk {} of {}", chunk_index, file.path);
        self.queue.enqueue(LoadQueueEntry {
            container,
            file,
            task: LoadTask::Chunk { group, chunk_index },
            generation: self.generation,
        });
        let next = self.queue.start();
        self.dispatch(next);
        true
    }

    // ── Scrolling ──

    fn max_scroll(&self) -> usize {
        self.document.total_height().saturating_sub(1)
    }

    fn clamp_scroll(&mut self) {
        self.viewport.scroll_top = self.viewport.scroll_top.min(self.max_scroll());
    }

    pub fn scroll_down(&mut self, amount: usize) {
        self.viewport.scroll_top = self.viewport.scroll_top.saturating_add(amount).min(self.max_scroll());
    }

    pub fn scroll_up(&mut self, amount: usize) {
        self.viewport.scroll_top = self.viewport.scroll_top.saturating_sub(amount);
    }

    pub fn scroll_to_top(&mut self) {
        self.viewport.scroll_top = 0;
    }

    pub fn scroll_to_bottom(&mut self, height: usize) {
        self.viewport.scroll_top = self.document.total_height().saturating_sub(height);
    }
}

impl Drop for DiffPage {
    fn drop(&mut self) {
        self.dispose();
    }
}
