use super::{AnchorNode, ChangeKind, CommentMarker, GroupKind, RenderFlags, RenderedFile, Row, RowGroup, RowKind};
use crate::diff::{CommentBlock, DiffFile, DiffLine, FilePatch, LineType};
use crate::nav::AnchorKind;

/// Turn one file's patch into row groups.
///
/// Groups come out in document order: the file header, then for each
/// hunk a collapsed group for any unchanged lines skipped before it,
/// followed by alternating equal and change runs. Every non-header group
/// gets the next chunk index. Change groups carry a chunk anchor, and
/// each comment block adds a comment anchor to the group holding its
/// first line.
pub fn render_file(
    file: &DiffFile,
    patch: &FilePatch,
    comments: &[CommentBlock],
    flags: RenderFlags,
) -> RenderedFile {
    let mut builder = Builder::new(file);

    for hunk in &patch.hunks {
        let first_old = if hunk.old_count == 0 {
            hunk.old_start + 1
        } else {
            hunk.old_start
        };
        let first_new = if hunk.new_count == 0 {
            hunk.new_start + 1
        } else {
            hunk.new_start
        };
        let gap = first_old.saturating_sub(builder.next_old);
        if gap > 0 {
            builder.push_collapsed(gap, first_new.saturating_sub(gap));
        }

        let mut run: Vec<&DiffLine> = Vec::new();
        for line in &hunk.lines {
            let is_context = line.line_type == LineType::Context;
            if let Some(prev) = run.last() {
                if (prev.line_type == LineType::Context) != is_context {
                    builder.push_run(&run);
                    run.clear();
                }
            }
            run.push(line);
        }
        builder.push_run(&run);

        builder.next_old = first_old + hunk.old_count;
    }

    let mut groups = builder.groups;
    for block in comments {
        place_comment(&mut groups, file, block);
    }

    RenderedFile {
        path: patch.path.clone(),
        status: patch.status.clone(),
        adds: patch.adds,
        dels: patch.dels,
        groups,
        flags,
    }
}

/// Replace a collapsed group with the unchanged lines it stood for.
///
/// Returns false when `group` is not a collapsed chunk. Anchors in the
/// group keep their slots and move onto the rows of their lines.
pub fn expand_collapsed(rendered: &mut RenderedFile, group: usize, lines: Vec<String>) -> bool {
    let Some(target) = rendered.groups.get_mut(group) else {
        return false;
    };
    let GroupKind::Collapsed {
        old_start,
        new_start,
        first_vline,
        ..
    } = target.kind
    else {
        return false;
    };

    target.rows = lines
        .into_iter()
        .enumerate()
        .map(|(i, text)| Row {
            kind: RowKind::Context,
            old_num: Some(old_start + i),
            new_num: Some(new_start + i),
            vline: Some(first_vline + i),
            text,
        })
        .collect();
    target.kind = GroupKind::Equal;

    // Slots are already in line order, and rows follow lines, so the
    // anchor index's references to these slots stay valid.
    let last_row = target.rows.len().saturating_sub(1);
    for anchor in &mut target.anchors {
        if let Some(vline) = anchor.vline {
            anchor.row = vline.saturating_sub(first_vline).min(last_row);
        }
    }
    debug_assert!(target.anchors.windows(2).all(|w| w[0].row <= w[1].row));
    true
}

struct Builder<'a> {
    file: &'a DiffFile,
    groups: Vec<RowGroup>,
    next_chunk: usize,
    next_vline: usize,
    next_old: usize,
}

impl<'a> Builder<'a> {
    fn new(file: &'a DiffFile) -> Self {
        let header = RowGroup {
            kind: GroupKind::Header,
            chunk_index: None,
            whitespace_only: false,
            rows: vec![Row {
                kind: RowKind::FileHeader,
                old_num: None,
                new_num: None,
                vline: None,
                text: file.path.clone(),
            }],
            anchors: vec![AnchorNode {
                name: file.anchor_name(),
                kind: AnchorKind::File,
                row: 0,
                vline: None,
                marker: None,
            }],
        };
        Builder {
            file,
            groups: vec![header],
            next_chunk: 0,
            next_vline: 1,
            next_old: 1,
        }
    }

    fn take_chunk(&mut self) -> usize {
        let chunk = self.next_chunk;
        self.next_chunk += 1;
        chunk
    }

    fn push_collapsed(&mut self, count: usize, new_start: usize) {
        let chunk = self.take_chunk();
        let first_vline = self.next_vline;
        self.next_vline += count;
        self.groups.push(RowGroup {
            kind: GroupKind::Collapsed {
                count,
                old_start: self.next_old,
                new_start: new_start.max(1),
                first_vline,
            },
            chunk_index: Some(chunk),
            whitespace_only: false,
            rows: vec![Row {
                kind: RowKind::Collapsed,
                old_num: None,
                new_num: None,
                vline: None,
                text: format!(
                    "⋯ {} unchanged line{}",
                    count,
                    if count == 1 { "" } else { "s" }
                ),
            }],
            anchors: Vec::new(),
        });
    }

    fn push_run(&mut self, run: &[&DiffLine]) {
        if run.is_empty() {
            return;
        }
        let chunk = self.take_chunk();
        let rows: Vec<Row> = run
            .iter()
            .map(|line| {
                let vline = self.next_vline;
                self.next_vline += 1;
                Row {
                    kind: match line.line_type {
                        LineType::Context => RowKind::Context,
                        LineType::Add => RowKind::Insert,
                        LineType::Delete => RowKind::Delete,
                    },
                    old_num: line.old_num,
                    new_num: line.new_num,
                    vline: Some(vline),
                    text: line.content.clone(),
                }
            })
            .collect();

        let adds = run.iter().any(|l| l.line_type == LineType::Add);
        let dels = run.iter().any(|l| l.line_type == LineType::Delete);
        let (kind, anchors) = if !adds && !dels {
            (GroupKind::Equal, Vec::new())
        } else {
            let change = match (adds, dels) {
                (true, false) => ChangeKind::Insert,
                (false, true) => ChangeKind::Delete,
                _ => ChangeKind::Replace,
            };
            let anchor = AnchorNode {
                name: format!("{}.{}", self.file.index, chunk),
                kind: AnchorKind::Chunk,
                row: 0,
                vline: None,
                marker: None,
            };
            (GroupKind::Change(change), vec![anchor])
        };

        let whitespace_only = kind == GroupKind::Change(ChangeKind::Replace) && differs_only_in_whitespace(run);
        self.groups.push(RowGroup {
            kind,
            chunk_index: Some(chunk),
            whitespace_only,
            rows,
            anchors,
        });
    }
}

fn differs_only_in_whitespace(run: &[&DiffLine]) -> bool {
    let squash = |wanted: LineType| -> String {
        run.iter()
            .filter(|l| l.line_type == wanted)
            .flat_map(|l| l.content.chars())
            .filter(|c| !c.is_whitespace())
            .collect()
    };
    squash(LineType::Delete) == squash(LineType::Add)
}

fn place_comment(groups: &mut [RowGroup], file: &DiffFile, block: &CommentBlock) {
    let target = groups.iter().enumerate().find_map(|(gi, group)| {
        if let GroupKind::Collapsed {
            count, first_vline, ..
        } = group.kind
        {
            if (first_vline..first_vline + count).contains(&block.linenum) {
                return Some((gi, 0));
            }
            return None;
        }
        group
            .rows
            .iter()
            .position(|r| r.vline == Some(block.linenum))
            .map(|ri| (gi, ri))
    });

    let Some((gi, row)) = target else {
        log::debug!(
            "comment block at line {} is outside the rendered diff of {}",
            block.linenum,
            file.path
        );
        return;
    };

    let group = &mut groups[gi];
    group.anchors.push(AnchorNode {
        name: format!("file{}line{}", file.filediff_id, block.linenum),
        kind: AnchorKind::Comment,
        row,
        vline: Some(block.linenum),
        marker: Some(CommentMarker {
            count: block.comments.len(),
            num_lines: block.num_lines,
            unresolved: block
                .comments
                .iter()
                .filter(|c| c.issue_status.is_some_and(|s| s.is_unresolved()))
                .count(),
        }),
    });
    // Every comment in a collapsed group sits on row 0 until it is
    // expanded, so line order breaks the tie. Chunk anchors carry no line
    // and stay ahead of a comment on the same row.
    group.anchors.sort_by_key(|a| (a.row, a.vline));
}
