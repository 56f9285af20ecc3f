//! Headless model of the rendered diff page: one container per file,
//! each holding row groups of rows, with anchor nodes attached to the
//! groups. Layout is counted in terminal rows.

mod render;

pub use render::{expand_collapsed, render_file};

use crate::diff::{DiffFile, FileStatus};
use crate::nav::{Anchor, AnchorKind, AnchorRef, AnchorSurface};

/// Rows a file takes while it is loading or after it failed
const PENDING_HEIGHT: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Delete,
    Replace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    Header,
    Equal,
    Change(ChangeKind),
    /// Unchanged lines left out of the fragment; expandable on request
    Collapsed {
        count: usize,
        old_start: usize,
        new_start: usize,
        first_vline: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    FileHeader,
    Context,
    Insert,
    Delete,
    Collapsed,
}

#[derive(Debug, Clone)]
pub struct Row {
    pub kind: RowKind,
    pub old_num: Option<usize>,
    pub new_num: Option<usize>,
    /// 1-based position in the fully expanded diff
    pub vline: Option<usize>,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentMarker {
    pub count: usize,
    pub num_lines: usize,
    pub unresolved: usize,
}

#[derive(Debug, Clone)]
pub struct AnchorNode {
    pub name: String,
    pub kind: AnchorKind,
    /// Row within the enclosing group
    pub row: usize,
    pub vline: Option<usize>,
    pub marker: Option<CommentMarker>,
}

#[derive(Debug, Clone)]
pub struct RowGroup {
    pub kind: GroupKind,
    pub chunk_index: Option<usize>,
    pub whitespace_only: bool,
    pub rows: Vec<Row>,
    pub anchors: Vec<AnchorNode>,
}

/// Display switches carried by each rendered file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderFlags {
    pub collapse_whitespace_chunks: bool,
    pub show_extra_whitespace: bool,
}

#[derive(Debug, Clone)]
pub struct RenderedFile {
    pub path: String,
    pub status: FileStatus,
    pub adds: usize,
    pub dels: usize,
    pub groups: Vec<RowGroup>,
    pub flags: RenderFlags,
}

impl RenderedFile {
    pub fn is_group_visible(&self, group: &RowGroup) -> bool {
        !(self.flags.collapse_whitespace_chunks && group.whitespace_only)
    }

    fn height(&self) -> usize {
        self.groups
            .iter()
            .filter(|g| self.is_group_visible(g))
            .map(|g| g.rows.len())
            .sum()
    }
}

#[derive(Debug, Clone)]
pub enum ContainerState {
    Placeholder,
    Failed(String),
    Rendered(RenderedFile),
}

#[derive(Debug, Clone)]
pub struct FileContainer {
    pub file: DiffFile,
    pub state: ContainerState,
}

impl FileContainer {
    pub fn rendered(&self) -> Option<&RenderedFile> {
        match &self.state {
            ContainerState::Rendered(r) => Some(r),
            _ => None,
        }
    }

    pub fn is_rendered(&self) -> bool {
        self.rendered().is_some()
    }

    fn height(&self) -> usize {
        match &self.state {
            ContainerState::Rendered(r) => r.height(),
            _ => PENDING_HEIGHT,
        }
    }
}

/// One row of the document as seen through the viewport
pub enum DocRow<'a> {
    Pending {
        container: &'a FileContainer,
        line: usize,
    },
    Line {
        container: usize,
        group_index: usize,
        file: &'a RenderedFile,
        group: &'a RowGroup,
        row_index: usize,
        row: &'a Row,
    },
}

/// The whole diff page: one container per file in file order.
#[derive(Debug, Clone, Default)]
pub struct DiffDocument {
    containers: Vec<FileContainer>,
    /// Flags handed to files rendered from now on
    defaults: RenderFlags,
}

impl DiffDocument {
    pub fn new(files: Vec<DiffFile>, defaults: RenderFlags) -> Self {
        DiffDocument {
            containers: files
                .into_iter()
                .map(|file| FileContainer {
                    file,
                    state: ContainerState::Placeholder,
                })
                .collect(),
            defaults,
        }
    }

    pub fn containers(&self) -> &[FileContainer] {
        &self.containers
    }

    pub fn container(&self, index: usize) -> Option<&FileContainer> {
        self.containers.get(index)
    }

    pub fn defaults(&self) -> RenderFlags {
        self.defaults
    }

    pub fn is_rendered(&self, index: usize) -> bool {
        self.containers.get(index).is_some_and(|c| c.is_rendered())
    }

    pub fn set_rendered(&mut self, index: usize, rendered: RenderedFile) {
        if let Some(c) = self.containers.get_mut(index) {
            c.state = ContainerState::Rendered(rendered);
        }
    }

    pub fn set_failed(&mut self, index: usize, message: String) {
        if let Some(c) = self.containers.get_mut(index) {
            c.state = ContainerState::Failed(message);
        }
    }

    pub fn rendered_mut(&mut self, index: usize) -> Option<&mut RenderedFile> {
        match self.containers.get_mut(index).map(|c| &mut c.state) {
            Some(ContainerState::Rendered(r)) => Some(r),
            _ => None,
        }
    }

    /// Put every file back to its loading placeholder
    pub fn reset(&mut self) {
        for c in &mut self.containers {
            c.state = ContainerState::Placeholder;
        }
    }

    pub fn failed_containers(&self) -> Vec<usize> {
        self.containers
            .iter()
            .enumerate()
            .filter(|(_, c)| matches!(c.state, ContainerState::Failed(_)))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn loaded_count(&self) -> usize {
        self.containers.iter().filter(|c| c.is_rendered()).count()
    }

    /// Flip whitespace-only chunk hiding on every loaded file.
    /// Returns the new page default.
    pub fn toggle_whitespace_only_chunks(&mut self) -> bool {
        self.defaults.collapse_whitespace_chunks = !self.defaults.collapse_whitespace_chunks;
        for c in &mut self.containers {
            if let ContainerState::Rendered(r) = &mut c.state {
                r.flags.collapse_whitespace_chunks = !r.flags.collapse_whitespace_chunks;
            }
        }
        self.defaults.collapse_whitespace_chunks
    }

    /// Flip extra-whitespace highlighting on every loaded file.
    /// Returns the new page default.
    pub fn toggle_extra_whitespace(&mut self) -> bool {
        self.defaults.show_extra_whitespace = !self.defaults.show_extra_whitespace;
        for c in &mut self.containers {
            if let ContainerState::Rendered(r) = &mut c.state {
                r.flags.show_extra_whitespace = !r.flags.show_extra_whitespace;
            }
        }
        self.defaults.show_extra_whitespace
    }

    pub fn total_height(&self) -> usize {
        self.containers.iter().map(FileContainer::height).sum()
    }

    /// First document row of a container
    pub fn container_offset(&self, index: usize) -> usize {
        self.containers[..index.min(self.containers.len())]
            .iter()
            .map(FileContainer::height)
            .sum()
    }

    /// Container holding a document row
    pub fn container_at(&self, row: usize) -> Option<usize> {
        let mut top = 0;
        for (i, c) in self.containers.iter().enumerate() {
            let height = c.height();
            if row < top + height {
                return Some(i);
            }
            top += height;
        }
        None
    }

    fn group(&self, node: &AnchorRef) -> Option<(&RenderedFile, &RowGroup)> {
        let rendered = self.containers.get(node.container)?.rendered()?;
        let group = rendered.groups.get(node.group)?;
        Some((rendered, group))
    }

    fn node(&self, node: &AnchorRef) -> Option<&AnchorNode> {
        self.group(node)?.1.anchors.get(node.slot)
    }

    pub fn is_node_visible(&self, node: &AnchorRef) -> bool {
        match self.group(node) {
            Some((rendered, group)) => {
                rendered.is_group_visible(group) && group.anchors.get(node.slot).is_some()
            }
            None => false,
        }
    }

    pub fn node_offset(&self, node: &AnchorRef) -> Option<usize> {
        if !self.is_node_visible(node) {
            return None;
        }
        let rendered = self.containers[node.container].rendered()?;
        let before: usize = rendered.groups[..node.group]
            .iter()
            .filter(|g| rendered.is_group_visible(g))
            .map(|g| g.rows.len())
            .sum();
        let anchor = self.node(node)?;
        Some(self.container_offset(node.container) + before + anchor.row)
    }

    /// Anchors of one container in document order
    pub fn scan_container(&self, index: usize) -> Vec<Anchor> {
        let Some(rendered) = self.containers.get(index).and_then(|c| c.rendered()) else {
            return Vec::new();
        };
        rendered
            .groups
            .iter()
            .enumerate()
            .flat_map(|(gi, group)| {
                group.anchors.iter().enumerate().map(move |(slot, node)| Anchor {
                    name: node.name.clone(),
                    kind: node.kind,
                    node: AnchorRef {
                        container: index,
                        group: gi,
                        slot,
                    },
                })
            })
            .collect()
    }

    /// Document rows `[top, top + height)`, skipping hidden groups
    pub fn rows(&self, top: usize, height: usize) -> Vec<DocRow<'_>> {
        let end = top.saturating_add(height);
        let mut out = Vec::with_capacity(height);
        let mut y = 0;

        for (ci, container) in self.containers.iter().enumerate() {
            let h = container.height();
            if y + h <= top {
                y += h;
                continue;
            }
            if y >= end {
                break;
            }
            match &container.state {
                ContainerState::Rendered(file) => {
                    for (gi, group) in file.groups.iter().enumerate() {
                        if !file.is_group_visible(group) {
                            continue;
                        }
                        for (ri, row) in group.rows.iter().enumerate() {
                            if y >= top && y < end {
                                out.push(DocRow::Line {
                                    container: ci,
                                    group_index: gi,
                                    file,
                                    group,
                                    row_index: ri,
                                    row,
                                });
                            }
                            y += 1;
                        }
                    }
                }
                _ => {
                    for line in 0..PENDING_HEIGHT {
                        if y >= top && y < end {
                            out.push(DocRow::Pending { container, line });
                        }
                        y += 1;
                    }
                }
            }
        }
        out
    }
}

/// Scroll position and highlighted row group
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Viewport {
    pub scroll_top: usize,
    /// (container, group)
    pub highlighted: Option<(usize, usize)>,
}

/// The document seen through a viewport: what the anchor index drives.
pub struct PageSurface<'a> {
    pub document: &'a DiffDocument,
    pub viewport: &'a mut Viewport,
}

impl AnchorSurface for PageSurface<'_> {
    fn scan_anchors(&self, container: usize) -> Vec<Anchor> {
        self.document.scan_container(container)
    }

    fn is_visible(&self, node: &AnchorRef) -> bool {
        self.document.is_node_visible(node)
    }

    fn offset_of(&self, node: &AnchorRef) -> Option<usize> {
        self.document.node_offset(node)
    }

    fn scroll_to(&mut self, top: usize) {
        self.viewport.scroll_top = top;
    }

    fn highlight(&mut self, node: &AnchorRef) {
        self.viewport.highlighted = Some((node.container, node.group));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::parse_file_patch;

    fn file(index: usize) -> DiffFile {
        DiffFile {
            filediff_id: 100 + index as u64,
            interfilediff_id: None,
            revision: 1,
            interdiff_revision: None,
            index,
            path: format!("f{}.txt", index),
        }
    }

    /// Two files; file 1 has a whitespace-only change
    fn document() -> DiffDocument {
        let mut doc = DiffDocument::new(vec![file(0), file(1)], RenderFlags::default());
        let p0 = parse_file_patch("@@ -1,2 +1,2 @@\n a\n-b\n+c\n", "f0.txt");
        let p1 = parse_file_patch("@@ -1,2 +1,2 @@\n x\n-y\n+y \n", "f1.txt");
        let r0 = render_file(&file(0), &p0, &[], doc.defaults());
        let r1 = render_file(&file(1), &p1, &[], doc.defaults());
        doc.set_rendered(0, r0);
        doc.set_rendered(1, r1);
        doc
    }

    #[test]
    fn placeholders_take_fixed_height() {
        let doc = DiffDocument::new(vec![file(0), file(1)], RenderFlags::default());
        assert_eq!(doc.total_height(), 2 * PENDING_HEIGHT);
        assert_eq!(doc.container_offset(1), PENDING_HEIGHT);
        assert!(doc.scan_container(0).is_empty());
    }

    #[test]
    fn offsets_stack_containers() {
        let doc = document();
        // f0: header + equal(a) + replace(b,c) = 4 rows
        assert_eq!(doc.container_offset(1), 4);
        let anchors = doc.scan_container(1);
        assert_eq!(anchors[0].name, "1");
        assert_eq!(doc.node_offset(&anchors[0].node), Some(4));
        assert_eq!(doc.node_offset(&anchors[1].node), Some(6));
        assert_eq!(doc.container_at(5), Some(1));
    }

    #[test]
    fn hiding_whitespace_chunks_hides_their_anchors() {
        let mut doc = document();
        let anchors = doc.scan_container(1);
        let chunk = anchors[1].node;
        assert!(doc.is_node_visible(&chunk));

        assert!(doc.toggle_whitespace_only_chunks());
        assert!(!doc.is_node_visible(&chunk));
        assert_eq!(doc.node_offset(&chunk), None);
        assert_eq!(doc.total_height(), 4 + 2);
    }

    #[test]
    fn double_toggle_restores_every_renderer() {
        let mut doc = document();
        let before: Vec<RenderFlags> = doc
            .containers()
            .iter()
            .filter_map(|c| c.rendered().map(|r| r.flags))
            .collect();

        doc.toggle_whitespace_only_chunks();
        doc.toggle_extra_whitespace();
        doc.toggle_whitespace_only_chunks();
        doc.toggle_extra_whitespace();

        let after: Vec<RenderFlags> = doc
            .containers()
            .iter()
            .filter_map(|c| c.rendered().map(|r| r.flags))
            .collect();
        assert_eq!(before, after);
        assert_eq!(doc.defaults(), RenderFlags::default());
    }

    #[test]
    fn rows_window_matches_layout() {
        let doc = document();
        let rows = doc.rows(3, 3);
        assert_eq!(rows.len(), 3);
        match &rows[1] {
            DocRow::Line { container, row, .. } => {
                assert_eq!(*container, 1);
                assert_eq!(row.kind, RowKind::FileHeader);
            }
            DocRow::Pending { .. } => panic!("expected a rendered row"),
        }
    }

    #[test]
    fn surface_scroll_and_highlight_update_viewport() {
        let doc = document();
        let mut viewport = Viewport::default();
        let node = doc.scan_container(1)[1].node;
        let mut surface = PageSurface { document: &doc, viewport: &mut viewport };
        surface.scroll_to(9);
        surface.highlight(&node);
        assert_eq!(viewport.scroll_top, 9);
        assert_eq!(viewport.highlighted, Some((1, node.group)));
    }

    #[test]
    fn failed_containers_are_listed() {
        let mut doc = DiffDocument::new(vec![file(0), file(1)], RenderFlags::default());
        doc.set_failed(1, "boom".into());
        assert_eq!(doc.failed_containers(), vec![1]);
        doc.reset();
        assert!(doc.failed_containers().is_empty());
    }
}
