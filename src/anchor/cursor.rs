use super::{locate, DuplicatePolicy, LineAnchor};
use crate::git::LineContext;

/// Where the cursor was, in diff terms, just before a rebuild
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CursorAnchor {
    pub path: Option<String>,
    pub hunk: Option<String>,
    pub new_line: Option<usize>,
    pub old_line: Option<usize>,
    pub raw_line: usize,
}

/// Record the diff coordinates under `current_line`.
/// Lines outside the line context only keep the raw position.
pub fn capture_cursor(current_line: usize, lines: &LineContext) -> CursorAnchor {
    match lines.get(current_line) {
        Some(info) => CursorAnchor {
            path: info.path.clone(),
            hunk: info.hunk.clone(),
            new_line: info.new_line,
            old_line: info.old_line,
            raw_line: current_line,
        },
        None => CursorAnchor {
            raw_line: current_line,
            ..CursorAnchor::default()
        },
    }
}

/// Output line to put the cursor on after a rebuild. Falls back to the old raw
/// position clamped to `line_count` when the anchored row is gone.
pub fn restore_cursor(
    anchor: &CursorAnchor,
    lines: &LineContext,
    line_count: usize,
    policy: DuplicatePolicy,
) -> usize {
    if let Some(ref path) = anchor.path {
        let line_anchor = LineAnchor {
            new_line: anchor.new_line,
            old_line: anchor.old_line,
        };
        if let Some(line) = locate(lines, path, &line_anchor, anchor.hunk.as_deref(), policy) {
            return line;
        }
    }
    anchor.raw_line.min(line_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::parse_diff;

    const DIFF: &str = "diff --git a/a.txt b/a.txt\n@@ -1,3 +1,3 @@\n one\n-two\n+TWO\n three\n";

    #[test]
    fn capture_on_diff_row() {
        let parsed = parse_diff(DIFF, 1);
        let anchor = capture_cursor(4, &parsed.lines);
        assert_eq!(anchor.path.as_deref(), Some("a.txt"));
        assert_eq!(anchor.old_line, Some(2));
        assert_eq!(anchor.new_line, None);
        assert_eq!(anchor.raw_line, 4);
    }

    #[test]
    fn capture_outside_diff_keeps_raw_line_only() {
        let parsed = parse_diff(DIFF, 10);
        let anchor = capture_cursor(3, &parsed.lines);
        assert_eq!(anchor, CursorAnchor { raw_line: 3, ..CursorAnchor::default() });
    }

    #[test]
    fn restore_follows_anchor_after_reflow() {
        let before = parse_diff(DIFF, 1);
        let anchor = capture_cursor(5, &before.lines);

        let after = parse_diff(DIFF, 9);
        let target = restore_cursor(&anchor, &after.lines, 14, DuplicatePolicy::default());
        assert_eq!(target, 13);
    }

    #[test]
    fn restore_deleted_row_by_old_line() {
        let before = parse_diff(DIFF, 1);
        let anchor = capture_cursor(4, &before.lines);

        let after = parse_diff(DIFF, 3);
        assert_eq!(restore_cursor(&anchor, &after.lines, 8, DuplicatePolicy::default()), 6);
    }

    #[test]
    fn restore_without_path_clamps_raw_line() {
        let parsed = parse_diff(DIFF, 1);
        let anchor = CursorAnchor { raw_line: 40, ..CursorAnchor::default() };
        assert_eq!(restore_cursor(&anchor, &parsed.lines, 6, DuplicatePolicy::default()), 6);

        let anchor = CursorAnchor { raw_line: 2, ..CursorAnchor::default() };
        assert_eq!(restore_cursor(&anchor, &parsed.lines, 6, DuplicatePolicy::default()), 2);
    }

    #[test]
    fn restore_missing_row_falls_back_to_raw_line() {
        let before = parse_diff(DIFF, 1);
        let anchor = capture_cursor(6, &before.lines);

        let after = parse_diff("diff --git a/a.txt b/a.txt\n@@ -1 +1 @@\n-one\n+ONE\n", 1);
        assert_eq!(restore_cursor(&anchor, &after.lines, 4, DuplicatePolicy::default()), 4);
    }

    #[test]
    fn restore_header_row_falls_back_to_raw_line() {
        let before = parse_diff(DIFF, 1);
        let anchor = capture_cursor(2, &before.lines);
        assert!(anchor.path.is_some());

        let after = parse_diff(DIFF, 5);
        assert_eq!(restore_cursor(&anchor, &after.lines, 10, DuplicatePolicy::default()), 2);
    }
}
