/// How a file changed between the two sides of the diff
#[derive(Debug, Clone, PartialEq)]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
    Renamed(String), // old path
}

impl FileStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            FileStatus::Added => "+",
            FileStatus::Modified => "~",
            FileStatus::Deleted => "-",
            FileStatus::Renamed(_) => "R",
        }
    }
}

/// A single line in a diff hunk
#[derive(Debug, Clone)]
pub struct DiffLine {
    pub line_type: LineType,
    pub content: String,
    pub old_num: Option<usize>,
    pub new_num: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineType {
    Context,
    Add,
    Delete,
}

/// A diff hunk with header and lines
#[derive(Debug, Clone)]
pub struct DiffHunk {
    pub header: String,
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
    pub lines: Vec<DiffLine>,
}

/// One file's parsed unified patch
#[derive(Debug, Clone)]
pub struct FilePatch {
    pub path: String,
    pub status: FileStatus,
    pub hunks: Vec<DiffHunk>,
    pub adds: usize,
    pub dels: usize,
}

impl FilePatch {
    fn new(path: String) -> Self {
        FilePatch {
            path,
            status: FileStatus::Modified, // refined by the extended headers
            hunks: Vec::new(),
            adds: 0,
            dels: 0,
        }
    }
}

/// Parse unified diff output into structured data.
///
/// Accepts both `git diff` output (`diff --git` file headers) and bare
/// single-file patches that start at `---`/`+++` or directly at `@@`.
pub fn parse_patch(raw: &str) -> Vec<FilePatch> {
    let mut files: Vec<FilePatch> = Vec::new();
    let mut current_file: Option<FilePatch> = None;
    let mut current_hunk: Option<DiffHunk> = None;
    let mut old_line: usize = 0;
    let mut new_line: usize = 0;

    for line in raw.lines() {
        if line.starts_with("diff --git") {
            flush_hunk(&mut current_file, &mut current_hunk);
            if let Some(file) = current_file.take() {
                files.push(file);
            }

            // "diff --git a/path b/path"
            let path = line.split(" b/").last().unwrap_or("").to_string();
            current_file = Some(FilePatch::new(path));
            continue;
        }

        // Bare patch: "+++ b/path" outside a hunk names the file
        if current_hunk.is_none() {
            if let Some(rest) = line.strip_prefix("+++ ") {
                let path = rest.strip_prefix("b/").unwrap_or(rest).to_string();
                match current_file {
                    Some(ref mut file) if file.path.is_empty() || file.hunks.is_empty() => {
                        if file.path.is_empty() && path != "/dev/null" {
                            file.path = path;
                        }
                    }
                    _ => {
                        if let Some(file) = current_file.take() {
                            files.push(file);
                        }
                        current_file = Some(FilePatch::new(path));
                    }
                }
                continue;
            }
        }

        // Extended headers only appear between files; inside a hunk a
        // "--- " line is a deleted line that starts with "-- "
        if current_hunk.is_none() {
            if let Some(ref mut file) = current_file {
                if line.starts_with("new file") {
                    file.status = FileStatus::Added;
                    continue;
                }
                if line.starts_with("deleted file") {
                    file.status = FileStatus::Deleted;
                    continue;
                }
                if let Some(old_path) = line.strip_prefix("rename from ") {
                    file.status = FileStatus::Renamed(old_path.to_string());
                    continue;
                }
                if line.starts_with("index ")
                    || line.starts_with("--- ")
                    || line.starts_with("similarity index")
                    || line.starts_with("rename to")
                    || line.starts_with("old mode")
                    || line.starts_with("new mode")
                {
                    continue;
                }
            } else if line.starts_with("--- ") || line.starts_with("index ") {
                continue;
            }
        }

        // Hunk header: @@ -old_start,old_count +new_start,new_count @@ context
        if line.starts_with("@@") {
            flush_hunk(&mut current_file, &mut current_hunk);
            if let Some(parsed) = parse_hunk_header(line) {
                old_line = parsed.old_start;
                new_line = parsed.new_start;
                current_hunk = Some(parsed);
                if current_file.is_none() {
                    current_file = Some(FilePatch::new(String::new()));
                }
            }
            continue;
        }

        if let Some(ref mut hunk) = current_hunk {
            if let Some(content) = line.strip_prefix('+') {
                hunk.lines.push(DiffLine {
                    line_type: LineType::Add,
                    content: content.to_string(),
                    old_num: None,
                    new_num: Some(new_line),
                });
                new_line += 1;
                if let Some(ref mut file) = current_file {
                    file.adds += 1;
                }
            } else if let Some(content) = line.strip_prefix('-') {
                hunk.lines.push(DiffLine {
                    line_type: LineType::Delete,
                    content: content.to_string(),
                    old_num: Some(old_line),
                    new_num: None,
                });
                old_line += 1;
                if let Some(ref mut file) = current_file {
                    file.dels += 1;
                }
            } else if line.starts_with(' ') || line.is_empty() {
                hunk.lines.push(DiffLine {
                    line_type: LineType::Context,
                    content: line.get(1..).unwrap_or("").to_string(),
                    old_num: Some(old_line),
                    new_num: Some(new_line),
                });
                old_line += 1;
                new_line += 1;
            }
            // Skip \ No newline at end of file

            // A hunk that has consumed its declared counts is closed, so a
            // following "--- "/"+++ " pair starts the next file.
            if old_line - hunk.old_start >= hunk.old_count
                && new_line - hunk.new_start >= hunk.new_count
            {
                flush_hunk(&mut current_file, &mut current_hunk);
            }
        }
    }

    flush_hunk(&mut current_file, &mut current_hunk);
    if let Some(file) = current_file {
        files.push(file);
    }

    files
}

/// Parse a fragment body holding exactly one file's patch.
/// Falls back to `path` when the body carries no file header.
pub fn parse_file_patch(raw: &str, path: &str) -> FilePatch {
    let mut file = parse_patch(raw)
        .into_iter()
        .next()
        .unwrap_or_else(|| FilePatch::new(String::new()));
    if file.path.is_empty() {
        file.path = path.to_string();
    }
    file
}

/// Parse the body of a chunk fragment: the unchanged lines of one
/// collapsed region, optionally preceded by a hunk header.
pub fn parse_context_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .filter(|line| !line.starts_with("@@") && !line.starts_with('\\'))
        .map(|line| line.strip_prefix(' ').unwrap_or(line).to_string())
        .collect()
}

fn flush_hunk(file: &mut Option<FilePatch>, hunk: &mut Option<DiffHunk>) {
    if let Some(hunk) = hunk.take() {
        if let Some(ref mut file) = file {
            file.hunks.push(hunk);
        }
    }
}

/// Parse a hunk header like "@@ -10,4 +10,15 @@ fn foo()"
fn parse_hunk_header(line: &str) -> Option<DiffHunk> {
    let after_first = line.strip_prefix("@@ ")?;
    let end_idx = after_first.find(" @@")?;
    let range_str = &after_first[..end_idx];
    let context = after_first[end_idx + 3..].trim().to_string();

    let parts: Vec<&str> = range_str.split_whitespace().collect();
    if parts.len() < 2 {
        return None;
    }

    let (old_start, old_count) = parse_range(parts[0].trim_start_matches('-'))?;
    let (new_start, new_count) = parse_range(parts[1].trim_start_matches('+'))?;

    let header = if context.is_empty() {
        format!("@@ -{},{} +{},{} @@", old_start, old_count, new_start, new_count)
    } else {
        format!(
            "@@ -{},{} +{},{} @@ {}",
            old_start, old_count, new_start, new_count, context
        )
    };

    Some(DiffHunk {
        header,
        old_start,
        old_count,
        new_start,
        new_count,
        lines: Vec::new(),
    })
}

/// Parse "start,count" or just "start" (count defaults to 1)
fn parse_range(s: &str) -> Option<(usize, usize)> {
    if let Some((start, count)) = s.split_once(',') {
        Some((start.parse().ok()?, count.parse().ok()?))
    } else {
        Some((s.parse().ok()?, 1))
    }
}
