use serde::{Deserialize, Serialize};

use super::{locate, DuplicatePolicy, LineAnchor};
use crate::git::LineContext;

/// A locally drafted review comment that has not been submitted yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingComment {
    pub id: u64,
    pub path: String,
    /// Hunk header the comment was written against
    #[serde(default)]
    pub hunk: Option<String>,
    /// Output line as of the last successful re-anchor
    pub line: usize,
    #[serde(default)]
    pub start_line: Option<usize>,
    #[serde(default)]
    pub end_line: Option<usize>,
    pub body: String,
    pub anchor: LineAnchor,
    #[serde(default)]
    pub start_anchor: Option<LineAnchor>,
    #[serde(default)]
    pub end_anchor: Option<LineAnchor>,
}

impl PendingComment {
    /// Draft a comment on output line `line`. None when that line is not a diff row.
    pub fn at_line(id: u64, line: usize, body: String, lines: &LineContext) -> Option<Self> {
        let info = lines.get(line)?;
        let path = info.path.clone()?;
        let anchor = LineAnchor::from_info(info);
        if anchor.is_empty() {
            return None;
        }
        Some(Self {
            id,
            path,
            hunk: info.hunk.clone(),
            line,
            start_line: None,
            end_line: None,
            body,
            anchor,
            start_anchor: None,
            end_anchor: None,
        })
    }

    /// Draft a comment spanning two output lines of the same file (order doesn't matter).
    /// The end of the range doubles as the comment's main line.
    pub fn for_range(
        id: u64,
        start: usize,
        end: usize,
        body: String,
        lines: &LineContext,
    ) -> Option<Self> {
        let (start, end) = (start.min(end), start.max(end));
        let mut comment = Self::at_line(id, end, body, lines)?;
        if start == end {
            return Some(comment);
        }

        let start_info = lines.get(start)?;
        if start_info.path.as_deref() != Some(comment.path.as_str()) {
            return None;
        }
        let start_anchor = LineAnchor::from_info(start_info);
        if start_anchor.is_empty() {
            return None;
        }

        comment.start_line = Some(start);
        comment.end_line = Some(end);
        comment.start_anchor = Some(start_anchor);
        comment.end_anchor = Some(comment.anchor);
        Some(comment)
    }

    pub fn is_range(&self) -> bool {
        self.start_line.is_some() && self.end_line.is_some()
    }

    /// Anchor for the start of a range, falling back to the main anchor
    pub fn start_anchor(&self) -> &LineAnchor {
        self.start_anchor.as_ref().unwrap_or(&self.anchor)
    }

    /// Anchor for the end of a range, falling back to the main anchor
    pub fn end_anchor(&self) -> &LineAnchor {
        self.end_anchor.as_ref().unwrap_or(&self.anchor)
    }
}

/// Move every pending comment's cached output lines to wherever its anchors live in `lines`.
/// Comments whose anchor can't be found keep their last known lines. `anchor` fields are
/// never touched.
pub fn reanchor(pending: &mut [PendingComment], lines: &LineContext, policy: DuplicatePolicy) {
    for comment in pending.iter_mut() {
        let hunk = comment.hunk.clone();
        let find = |anchor: &LineAnchor| locate(lines, &comment.path, anchor, hunk.as_deref(), policy);

        let main = find(&comment.anchor);
        let start = comment.start_line.and(find(comment.start_anchor()));
        let end = comment.end_line.and(find(comment.end_anchor()));

        match main {
            Some(line) => comment.line = line,
            None => log::warn!(
                "pending comment {} lost its anchor in {} (keeping line {})",
                comment.id,
                comment.path,
                comment.line
            ),
        }
        if let Some(line) = start {
            comment.start_line = Some(line);
        }
        if let Some(line) = end {
            comment.end_line = Some(line);
        }
    }
}
