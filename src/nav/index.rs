use super::{Anchor, AnchorKinds, AnchorSurface, Direction};
use std::collections::HashSet;

/// The ordered list of navigable anchors plus the navigation cursor.
///
/// The cursor is either unset (`None`) or a valid index into the list.
/// Anchors are only ever added, in document order, until [`reset`]
/// drops them all and unsets the cursor.
///
/// [`reset`]: AnchorIndex::reset
#[derive(Debug, Default)]
pub struct AnchorIndex {
    anchors: Vec<Anchor>,
    scanned: HashSet<usize>,
    cursor: Option<usize>,
    /// Rows kept above a selected anchor when scrolling to it
    anchor_offset: usize,
}

impl AnchorIndex {
    pub fn new(anchor_offset: usize) -> Self {
        AnchorIndex {
            anchor_offset,
            ..Default::default()
        }
    }

    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn selected(&self) -> Option<&Anchor> {
        self.cursor.and_then(|i| self.anchors.get(i))
    }

    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.anchors.iter().position(|a| a.name == name)
    }

    /// Drop every anchor and unset the cursor. Used when the whole
    /// document is replaced.
    pub fn reset(&mut self) {
        self.anchors.clear();
        self.scanned.clear();
        self.cursor = None;
    }

    /// Scan one file container and add its anchors in document order.
    ///
    /// A container is scanned at most once; repeat calls return 0. When
    /// this is the first registration that yields anchors, the cursor
    /// moves to the first anchor and it is highlighted without scrolling.
    pub fn register_anchors(&mut self, container: usize, surface: &mut dyn AnchorSurface) -> usize {
        if !self.scanned.insert(container) {
            log::debug!("container {} already scanned, skipping", container);
            return 0;
        }

        let found = surface.scan_anchors(container);
        let count = found.len();
        if count == 0 {
            return 0;
        }

        // Containers normally register in order, which makes this an append.
        // A retried file registers late and lands in its document position.
        let at = self
            .anchors
            .partition_point(|a| a.node < found[0].node);
        self.anchors.splice(at..at, found);

        match self.cursor {
            Some(i) if i >= at => self.cursor = Some(i + count),
            Some(_) => {}
            None => {
                self.cursor = Some(0);
                let node = self.anchors[0].node;
                if surface.is_visible(&node) {
                    surface.highlight(&node);
                }
            }
        }

        log::debug!(
            "registered {} anchors from container {} ({} total)",
            count,
            container,
            self.anchors.len()
        );
        count
    }

    /// Make the anchor at `index` the current one.
    ///
    /// Returns false without touching the cursor when there is no such
    /// anchor or it is hidden. With `scroll`, the viewport moves so the
    /// anchor sits `anchor_offset` rows below the top.
    pub fn select_anchor(&mut self, index: usize, scroll: bool, surface: &mut dyn AnchorSurface) -> bool {
        let Some(anchor) = self.anchors.get(index) else {
            return false;
        };
        let node = anchor.node;
        if !surface.is_visible(&node) {
            return false;
        }

        if scroll {
            let Some(offset) = surface.offset_of(&node) else {
                return false;
            };
            surface.scroll_to(offset.saturating_sub(self.anchor_offset));
        }

        surface.highlight(&node);
        self.cursor = Some(index);
        true
    }

    pub fn select_anchor_by_name(&mut self, name: &str, scroll: bool, surface: &mut dyn AnchorSurface) -> bool {
        match self.position_of(name) {
            Some(index) => self.select_anchor(index, scroll, surface),
            None => false,
        }
    }

    /// Nearest anchor after (or before) the cursor whose kind is in
    /// `kinds`. Stops at the ends of the list; never wraps around.
    pub fn find_next_anchor(&self, direction: Direction, kinds: AnchorKinds) -> Option<usize> {
        self.find_from(self.cursor, direction, kinds)
    }

    fn find_from(&self, from: Option<usize>, direction: Direction, kinds: AnchorKinds) -> Option<usize> {
        let len = self.anchors.len() as isize;
        let mut i = from.map(|c| c as isize).unwrap_or(-1) + direction.step();
        while i >= 0 && i < len {
            if kinds.contains(self.anchors[i as usize].kind) {
                return Some(i as usize);
            }
            i += direction.step();
        }
        None
    }

    /// Move to the next matching anchor that is currently visible.
    /// Hidden matches are stepped over. A no-op at the end of the list.
    pub fn navigate(&mut self, direction: Direction, kinds: AnchorKinds, surface: &mut dyn AnchorSurface) -> bool {
        let mut from = self.cursor;
        while let Some(candidate) = self.find_from(from, direction, kinds) {
            if self.select_anchor(candidate, true, surface) {
                return true;
            }
            from = Some(candidate);
        }
        false
    }

    pub fn select_previous_file(&mut self, surface: &mut dyn AnchorSurface) -> bool {
        self.navigate(Direction::Previous, AnchorKinds::FILE, surface)
    }

    pub fn select_next_file(&mut self, surface: &mut dyn AnchorSurface) -> bool {
        self.navigate(Direction::Next, AnchorKinds::FILE, surface)
    }

    pub fn select_previous_diff(&mut self, surface: &mut dyn AnchorSurface) -> bool {
        self.navigate(Direction::Previous, AnchorKinds::CHUNK | AnchorKinds::FILE, surface)
    }

    pub fn select_next_diff(&mut self, surface: &mut dyn AnchorSurface) -> bool {
        self.navigate(Direction::Next, AnchorKinds::CHUNK | AnchorKinds::FILE, surface)
    }

    pub fn select_previous_comment(&mut self, surface: &mut dyn AnchorSurface) -> bool {
        self.navigate(Direction::Previous, AnchorKinds::COMMENT, surface)
    }

    pub fn select_next_comment(&mut self, surface: &mut dyn AnchorSurface) -> bool {
        self.navigate(Direction::Next, AnchorKinds::COMMENT, surface)
    }

    /// Re-apply the current selection after a layout change so the
    /// viewport and highlight follow the anchor's new position.
    pub fn recenter_selected(&mut self, surface: &mut dyn AnchorSurface) -> bool {
        match self.cursor {
            Some(index) => self.select_anchor(index, true, surface),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nav::{AnchorKind, AnchorRef};
    use std::collections::HashMap;

    /// In-memory surface: each anchor has a fixed row offset and a
    /// visibility flag.
    #[derive(Default)]
    struct FakeSurface {
        containers: HashMap<usize, Vec<Anchor>>,
        offsets: HashMap<AnchorRef, usize>,
        hidden: HashSet<AnchorRef>,
        scroll_top: usize,
        highlighted: Option<AnchorRef>,
    }

    impl FakeSurface {
        fn add(&mut self, container: usize, name: &str, kind: AnchorKind, offset: usize) -> AnchorRef {
            let list = self.containers.entry(container).or_default();
            let node = AnchorRef { container, group: list.len(), slot: 0 };
            list.push(Anchor { name: name.to_string(), kind, node });
            self.offsets.insert(node, offset);
            node
        }
    }

    impl AnchorSurface for FakeSurface {
        fn scan_anchors(&self, container: usize) -> Vec<Anchor> {
            self.containers.get(&container).cloned().unwrap_or_default()
        }

        fn is_visible(&self, node: &AnchorRef) -> bool {
            self.offsets.contains_key(node) && !self.hidden.contains(node)
        }

        fn offset_of(&self, node: &AnchorRef) -> Option<usize> {
            if self.hidden.contains(node) {
                return None;
            }
            self.offsets.get(node).copied()
        }

        fn scroll_to(&mut self, top: usize) {
            self.scroll_top = top;
        }

        fn highlight(&mut self, node: &AnchorRef) {
            self.highlighted = Some(*node);
        }
    }

    /// Three files, each a file anchor followed by two chunk anchors
    fn three_files() -> (AnchorIndex, FakeSurface) {
        let mut surface = FakeSurface::default();
        let mut offset = 0;
        for file in 0..3 {
            surface.add(file, &file.to_string(), AnchorKind::File, offset);
            surface.add(file, &format!("{}.1", file), AnchorKind::Chunk, offset + 4);
            surface.add(file, &format!("{}.3", file), AnchorKind::Chunk, offset + 12);
            offset += 20;
        }
        let mut index = AnchorIndex::new(3);
        for file in 0..3 {
            index.register_anchors(file, &mut surface);
        }
        (index, surface)
    }

    #[test]
    fn first_registration_sets_cursor_to_zero_without_scrolling() {
        let mut surface = FakeSurface::default();
        surface.add(0, "0", AnchorKind::File, 10);
        let mut index = AnchorIndex::new(3);
        assert_eq!(index.cursor(), None);

        index.register_anchors(0, &mut surface);
        assert_eq!(index.cursor(), Some(0));
        assert_eq!(surface.scroll_top, 0);
        assert_eq!(surface.highlighted, Some(AnchorRef { container: 0, group: 0, slot: 0 }));
    }

    #[test]
    fn empty_container_leaves_cursor_unset() {
        let mut surface = FakeSurface::default();
        let mut index = AnchorIndex::new(3);
        assert_eq!(index.register_anchors(0, &mut surface), 0);
        assert_eq!(index.cursor(), None);
    }

    #[test]
    fn registering_same_container_twice_adds_no_duplicates() {
        let (mut index, mut surface) = three_files();
        assert_eq!(index.len(), 9);
        assert_eq!(index.register_anchors(1, &mut surface), 0);
        assert_eq!(index.len(), 9);
    }

    #[test]
    fn late_container_is_inserted_in_document_order() {
        let mut surface = FakeSurface::default();
        surface.add(0, "0", AnchorKind::File, 0);
        surface.add(1, "1", AnchorKind::File, 10);
        surface.add(2, "2", AnchorKind::File, 20);
        let mut index = AnchorIndex::new(0);
        index.register_anchors(0, &mut surface);
        index.register_anchors(2, &mut surface);
        assert!(index.select_anchor(1, true, &mut surface));

        index.register_anchors(1, &mut surface);
        let names: Vec<&str> = index.anchors().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["0", "1", "2"]);
        // Cursor still points at "2"
        assert_eq!(index.selected().unwrap().name, "2");
    }

    #[test]
    fn next_file_from_last_file_returns_none() {
        let (mut index, mut surface) = three_files();
        assert!(index.select_anchor_by_name("2", true, &mut surface));
        assert_eq!(index.find_next_anchor(Direction::Next, AnchorKinds::FILE), None);
        assert!(!index.select_next_file(&mut surface));
        assert_eq!(index.selected().unwrap().name, "2");
    }

    #[test]
    fn previous_from_first_anchor_does_not_wrap() {
        let (mut index, mut surface) = three_files();
        assert_eq!(index.cursor(), Some(0));
        assert_eq!(index.find_next_anchor(Direction::Previous, AnchorKinds::ALL), None);
        assert!(!index.select_previous_diff(&mut surface));
        assert_eq!(index.cursor(), Some(0));
    }

    #[test]
    fn diff_navigation_stops_at_chunks_and_file_boundaries() {
        let (mut index, mut surface) = three_files();
        let mut visited = Vec::new();
        while index.select_next_diff(&mut surface) {
            visited.push(index.selected().unwrap().name.clone());
        }
        assert_eq!(visited, vec!["0.1", "0.3", "1", "1.1", "1.3", "2", "2.1", "2.3"]);
    }

    #[test]
    fn file_navigation_skips_chunks() {
        let (mut index, mut surface) = three_files();
        assert!(index.select_next_file(&mut surface));
        assert_eq!(index.selected().unwrap().name, "1");
        assert!(index.select_previous_file(&mut surface));
        assert_eq!(index.selected().unwrap().name, "0");
    }

    #[test]
    fn hidden_anchor_cannot_be_selected() {
        let (mut index, mut surface) = three_files();
        let node = index.anchors()[4].node;
        surface.hidden.insert(node);
        let before = index.cursor();

        assert!(!index.select_anchor(4, true, &mut surface));
        assert_eq!(index.cursor(), before);
    }

    #[test]
    fn navigation_steps_over_hidden_anchors() {
        let (mut index, mut surface) = three_files();
        let node = index.anchors()[1].node; // "0.1"
        surface.hidden.insert(node);
        assert!(index.select_next_diff(&mut surface));
        assert_eq!(index.selected().unwrap().name, "0.3");
    }

    #[test]
    fn select_by_name_scrolls_anchor_to_fixed_offset() {
        let (mut index, mut surface) = three_files();
        assert!(index.select_anchor_by_name("1.3", true, &mut surface));
        assert_eq!(index.cursor(), Some(5));
        let offset = surface.offsets[&index.anchors()[5].node];
        assert_eq!(surface.scroll_top + 3, offset);
    }

    #[test]
    fn select_without_scroll_keeps_viewport() {
        let (mut index, mut surface) = three_files();
        surface.scroll_top = 7;
        assert!(index.select_anchor_by_name("2", false, &mut surface));
        assert_eq!(surface.scroll_top, 7);
        assert_eq!(index.cursor(), Some(6));
    }

    #[test]
    fn unknown_name_is_a_no_op() {
        let (mut index, mut surface) = three_files();
        assert!(!index.select_anchor_by_name("nope", true, &mut surface));
        assert_eq!(index.cursor(), Some(0));
    }

    #[test]
    fn comment_navigation_with_no_comments_does_nothing() {
        let (mut index, mut surface) = three_files();
        assert!(!index.select_next_comment(&mut surface));
        assert!(!index.select_previous_comment(&mut surface));
    }

    #[test]
    fn recenter_follows_moved_anchor() {
        let (mut index, mut surface) = three_files();
        assert!(index.select_anchor_by_name("1", true, &mut surface));
        let node = index.selected().unwrap().node;
        surface.offsets.insert(node, 40);

        assert!(index.recenter_selected(&mut surface));
        assert_eq!(surface.scroll_top, 37);
        assert_eq!(index.selected().unwrap().name, "1");
    }

    #[test]
    fn reset_unsets_cursor_and_allows_rescan() {
        let (mut index, mut surface) = three_files();
        index.reset();
        assert_eq!(index.cursor(), None);
        assert!(index.is_empty());
        assert!(!index.recenter_selected(&mut surface));
        assert_eq!(index.register_anchors(0, &mut surface), 3);
        assert_eq!(index.cursor(), Some(0));
    }
}
