use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// State of the issue a review comment opened, if any
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueStatus {
    Open,
    Resolved,
    Dropped,
    VerifyingResolved,
    VerifyingDropped,
}

impl IssueStatus {
    pub fn label(&self) -> &'static str {
        match self {
            IssueStatus::Open => "open",
            IssueStatus::Resolved => "resolved",
            IssueStatus::Dropped => "dropped",
            IssueStatus::VerifyingResolved => "verifying resolved",
            IssueStatus::VerifyingDropped => "verifying dropped",
        }
    }

    /// Open and verifying issues still need attention
    pub fn is_unresolved(&self) -> bool {
        matches!(
            self,
            IssueStatus::Open | IssueStatus::VerifyingResolved | IssueStatus::VerifyingDropped
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Comment {
    pub text: String,
    #[serde(default)]
    pub issue_status: Option<IssueStatus>,
}

/// Comments anchored to a range of diff rows.
/// `linenum` is the 1-based virtual line number of the first row.
#[derive(Debug, Clone, Deserialize)]
pub struct CommentBlock {
    pub linenum: usize,
    #[serde(default = "default_num_lines")]
    pub num_lines: usize,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

fn default_num_lines() -> usize {
    1
}

/// Load serialized comment blocks keyed by filediff id
pub fn load_comment_blocks(path: &Path) -> Result<HashMap<u64, Vec<CommentBlock>>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read comments file {}", path.display()))?;
    parse_comment_blocks(&content)
        .with_context(|| format!("Failed to parse comments file {}", path.display()))
}

fn parse_comment_blocks(content: &str) -> Result<HashMap<u64, Vec<CommentBlock>>> {
    let raw: HashMap<String, Vec<CommentBlock>> = serde_json::from_str(content)?;
    let mut blocks = HashMap::new();
    for (key, mut value) in raw {
        let id: u64 = key
            .parse()
            .with_context(|| format!("Filediff id '{}' is not a number", key))?;
        value.sort_by_key(|b| b.linenum);
        blocks.insert(id, value);
    }
    Ok(blocks)
}
