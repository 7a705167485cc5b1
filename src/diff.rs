//! Parsing of the per-file `patch` text GitHub returns for pull request
//! files.
//!
//! Only a single file's hunks are handled here; the pipeline walks files one
//! at a time.

use std::sync::LazyLock;

use regex::Regex;

static HUNK_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").expect("valid hunk header regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Added,
    Removed,
    Context,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub kind: LineKind,
    pub content: String,
    /// Line number in the new file; `None` for removed lines.
    pub new_line: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub old_start: u64,
    pub new_start: u64,
    pub lines: Vec<DiffLine>,
}

/// A line as it reads in the new version of the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSideLine {
    pub line: u64,
    pub content: String,
    pub added: bool,
}

impl Hunk {
    /// Context and added lines in new-file order.
    pub fn new_side(&self) -> Vec<NewSideLine> {
        self.lines
            .iter()
            .filter_map(|l| {
                l.new_line.map(|line| NewSideLine {
                    line,
                    content: l.content.clone(),
                    added: l.kind == LineKind::Added,
                })
            })
            .collect()
    }
}

fn parse_header(line: &str) -> Option<(u64, u64)> {
    let caps = HUNK_HEADER.captures(line)?;
    let old_start = caps.get(1)?.as_str().parse().ok()?;
    let new_start = caps.get(3)?.as_str().parse().ok()?;
    Some((old_start, new_start))
}

/// Splits a unified diff patch into hunks.
///
/// Lines before the first valid hunk header, and lines following a
/// malformed header, are skipped.
pub fn parse_patch(patch: &str) -> Vec<Hunk> {
    let mut hunks = Vec::new();
    let mut current: Option<Hunk> = None;
    let mut next_new_line = 0;

    for raw in patch.lines() {
        if raw.starts_with("@@") {
            if let Some(hunk) = current.take() {
                hunks.push(hunk);
            }
            if let Some((old_start, new_start)) = parse_header(raw) {
                next_new_line = new_start;
                current = Some(Hunk {
                    old_start,
                    new_start,
                    lines: Vec::new(),
                });
            }
            continue;
        }

        let Some(hunk) = current.as_mut() else {
            continue;
        };

        let (kind, content) = match raw.chars().next() {
            Some('+') => (LineKind::Added, &raw[1..]),
            Some('-') => (LineKind::Removed, &raw[1..]),
            Some(' ') => (LineKind::Context, &raw[1..]),
            Some('\\') => continue,
            // Some producers strip the leading space from blank context lines.
            None => (LineKind::Context, ""),
            Some(_) => continue,
        };

        let new_line = match kind {
            LineKind::Removed => None,
            LineKind::Added | LineKind::Context => {
                let n = next_new_line;
                next_new_line += 1;
                Some(n)
            }
        };

        hunk.lines.push(DiffLine {
            kind,
            content: content.to_string(),
            new_line,
        });
    }

    if let Some(hunk) = current {
        hunks.push(hunk);
    }

    hunks
}
