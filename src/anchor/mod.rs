//! Semantic line anchors that survive full view rebuilds.
//!
//! A rendered line number is only valid for the render that produced it: header length,
//! expanded comment threads and reordered files all shift it. An anchor instead records
//! `(path, new_line | old_line)` and is re-located against each fresh [`LineContext`].

mod cursor;
mod pending;

pub use cursor::{capture_cursor, restore_cursor, CursorAnchor};
pub use pending::{reanchor, PendingComment};

use serde::{Deserialize, Serialize};

use crate::git::{LineContext, LineInfo};

/// Diff-relative coordinates of one line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineAnchor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_line: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_line: Option<usize>,
}

impl LineAnchor {
    pub fn from_info(info: &LineInfo) -> Self {
        Self {
            new_line: info.new_line,
            old_line: info.old_line,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.new_line.is_none() && self.old_line.is_none()
    }
}

/// How to pick between several rows carrying the same `(path, line)` pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Lowest output line wins
    FirstMatch,
    /// A row in the anchor's own hunk wins; otherwise lowest output line
    #[default]
    PreferSameHunk,
}

/// Find the output line currently showing `anchor` for `path`.
/// `new_line` is tried first; `old_line` only when no post-image row matches.
pub fn locate(
    lines: &LineContext,
    path: &str,
    anchor: &LineAnchor,
    hunk: Option<&str>,
    policy: DuplicatePolicy,
) -> Option<usize> {
    let hunk = match policy {
        DuplicatePolicy::FirstMatch => None,
        DuplicatePolicy::PreferSameHunk => hunk,
    };

    if let Some(new_line) = anchor.new_line {
        if let Some(line) = scan(lines, path, hunk, |info| info.new_line == Some(new_line)) {
            return Some(line);
        }
    }
    let old_line = anchor.old_line?;
    scan(lines, path, hunk, |info| info.old_line == Some(old_line))
}

fn scan(
    lines: &LineContext,
    path: &str,
    hunk: Option<&str>,
    matches: impl Fn(&LineInfo) -> bool,
) -> Option<usize> {
    let mut first = None;
    for (line, info) in lines.iter() {
        if info.path.as_deref() != Some(path) || !matches(info) {
            continue;
        }
        match hunk {
            Some(h) if info.hunk.as_deref() == Some(h) => return Some(line),
            Some(_) => {
                first.get_or_insert(line);
            }
            None => return Some(line),
        }
    }
    first
}
