//! Navigable anchors over the rendered diff and the cursor that moves
//! between them. Nothing here knows how the diff is drawn: all layout
//! questions go through [`AnchorSurface`].

mod index;

pub use index::AnchorIndex;

use std::ops::BitOr;

/// What a navigable point marks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorKind {
    File,
    Chunk,
    Comment,
}

impl AnchorKind {
    pub fn mask(self) -> AnchorKinds {
        match self {
            AnchorKind::File => AnchorKinds::FILE,
            AnchorKind::Chunk => AnchorKinds::CHUNK,
            AnchorKind::Comment => AnchorKinds::COMMENT,
        }
    }
}

/// Bitmask of anchor kinds a navigation command stops at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorKinds(u8);

impl AnchorKinds {
    pub const FILE: AnchorKinds = AnchorKinds(0b001);
    pub const CHUNK: AnchorKinds = AnchorKinds(0b010);
    pub const COMMENT: AnchorKinds = AnchorKinds(0b100);
    pub const ALL: AnchorKinds = AnchorKinds(0b111);

    pub fn contains(self, kind: AnchorKind) -> bool {
        self.0 & kind.mask().0 != 0
    }
}

impl BitOr for AnchorKinds {
    type Output = AnchorKinds;

    fn bitor(self, rhs: AnchorKinds) -> AnchorKinds {
        AnchorKinds(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Previous,
    Next,
}

impl Direction {
    fn step(self) -> isize {
        match self {
            Direction::Previous => -1,
            Direction::Next => 1,
        }
    }
}

/// Live reference to an anchor node: file container, row group within
/// it, and the node's slot within the group. Ordering is document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AnchorRef {
    pub container: usize,
    pub group: usize,
    pub slot: usize,
}

/// An entry in the anchor index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub name: String,
    pub kind: AnchorKind,
    pub node: AnchorRef,
}

/// Adapter between the anchor index and whatever renders the diff.
pub trait AnchorSurface {
    /// Anchors found in one file container, in document order
    fn scan_anchors(&self, container: usize) -> Vec<Anchor>;

    /// False when the node is gone or anything enclosing it is hidden
    fn is_visible(&self, node: &AnchorRef) -> bool;

    /// Row offset of the node from the top of the document
    fn offset_of(&self, node: &AnchorRef) -> Option<usize>;

    fn scroll_to(&mut self, top: usize);

    /// Highlight the row group enclosing the node
    fn highlight(&mut self, node: &AnchorRef);
}
