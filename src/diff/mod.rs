mod comments;
mod file;
mod patch;

pub use comments::{load_comment_blocks, Comment, CommentBlock, IssueStatus};
pub use file::DiffFile;
pub use patch::{
    parse_context_lines, parse_file_patch, parse_patch, DiffHunk, DiffLine, FilePatch, FileStatus,
    LineType,
};
