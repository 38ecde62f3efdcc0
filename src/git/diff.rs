use serde::Serialize;
use std::collections::BTreeMap;

use super::status::FileStatus;

/// Position of a `diff --git` header in the rendered output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileMarker {
    pub line: usize,
    pub path: String,
    pub status: FileStatus,
}

/// Position of a `@@ ... @@` header in the rendered output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HunkMarker {
    pub line: usize,
    /// None when the hunk shows up before any file header
    pub path: Option<String>,
    pub header: String,
    pub old_start: usize,
    pub new_start: usize,
}

/// Diff coordinates of one rendered line
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LineInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hunk: Option<String>,
    /// Canonical reference number: new_line when present, old_line for pure deletions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff_line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_line: Option<usize>,
}

impl LineInfo {
    /// True for `+`, `-` and context rows; false for headers and other decoration
    pub fn has_numbers(&self) -> bool {
        self.old_line.is_some() || self.new_line.is_some()
    }
}

/// Per-output-line lookup table, ordered by output line
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LineContext {
    entries: BTreeMap<usize, LineInfo>,
}

impl LineContext {
    pub fn get(&self, line: usize) -> Option<&LineInfo> {
        self.entries.get(&line)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &LineInfo)> {
        self.entries.iter().map(|(line, info)| (*line, info))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn insert(&mut self, line: usize, info: LineInfo) {
        self.entries.insert(line, info);
    }
}

/// Everything one parse produces
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedDiff {
    pub files: Vec<FileMarker>,
    pub hunks: Vec<HunkMarker>,
    pub lines: LineContext,
    /// Number of text lines consumed
    pub line_count: usize,
}

/// Scan state, local to a single parse call
#[derive(Default)]
struct ParseState {
    current_file: Option<String>,
    current_hunk: Option<String>,
    /// Latest file marker still waiting for a status-bearing metadata line
    status_open: bool,
    in_hunk: bool,
    old_line: usize,
    new_line: usize,
}

impl ParseState {
    fn bare_info(&self) -> LineInfo {
        LineInfo {
            path: self.current_file.clone(),
            hunk: self.current_hunk.clone(),
            ..LineInfo::default()
        }
    }
}

/// Parse unified diff text into file/hunk markers and a line context.
/// Line `i` of `raw` (0-based) is keyed as `start_line + i`. Never fails: lines that
/// don't fit the format get a context-only entry.
pub fn parse_diff(raw: &str, start_line: usize) -> ParsedDiff {
    let mut parsed = ParsedDiff::default();
    let mut state = ParseState::default();

    for (idx, line) in raw.lines().enumerate() {
        let key = start_line + idx;
        parsed.line_count = idx + 1;

        // New file header: diff --git a/path b/path
        if let Some(path) = parse_file_header(line) {
            parsed.files.push(FileMarker {
                line: key,
                path: path.clone(),
                status: FileStatus::Modified, // refined by metadata below
            });
            state.current_file = Some(path);
            state.current_hunk = None;
            state.status_open = true;
            state.in_hunk = false;
            state.old_line = 0;
            state.new_line = 0;
            parsed.lines.insert(key, state.bare_info());
            continue;
        }

        if state.status_open {
            if let Some(status) = FileStatus::from_metadata(line) {
                if let Some(file) = parsed.files.last_mut() {
                    file.status = status;
                }
                state.status_open = false;
            }
        }

        // Hunk header: @@ -old_start,old_count +new_start,new_count @@ context
        if line.starts_with("@@") {
            let (old_start, new_start) = parse_hunk_header(line)
                .map(|(old_start, _, new_start, _)| (old_start, new_start))
                .unwrap_or_else(|| {
                    log::debug!("unparseable hunk header at line {}: {:?}", key, line);
                    (0, 0)
                });
            parsed.hunks.push(HunkMarker {
                line: key,
                path: state.current_file.clone(),
                header: line.to_string(),
                old_start,
                new_start,
            });
            state.current_hunk = Some(line.to_string());
            state.in_hunk = true;
            state.old_line = old_start;
            state.new_line = new_start;
            parsed.lines.insert(key, state.bare_info());
            continue;
        }

        let mut info = state.bare_info();
        if state.in_hunk {
            if line.starts_with('+') && !line.starts_with("+++") {
                info.diff_line = Some(state.new_line);
                info.new_line = Some(state.new_line);
                state.new_line += 1;
            } else if line.starts_with('-') && !line.starts_with("---") {
                info.diff_line = Some(state.old_line);
                info.old_line = Some(state.old_line);
                state.old_line += 1;
            } else if line.starts_with(' ') {
                info.diff_line = Some(state.new_line);
                info.old_line = Some(state.old_line);
                info.new_line = Some(state.new_line);
                state.old_line += 1;
                state.new_line += 1;
            }
            // Anything else (\ No newline at end of file) carries no numbers
        }
        parsed.lines.insert(key, info);
    }

    log::debug!(
        "parsed diff: {} files, {} hunks, {} lines from line {}",
        parsed.files.len(),
        parsed.hunks.len(),
        parsed.line_count,
        start_line
    );

    parsed
}

/// Extract the post-image path from "diff --git a/path b/path"
fn parse_file_header(line: &str) -> Option<String> {
    let rest = line.strip_prefix("diff --git a/")?;
    let (_, new_path) = rest.rsplit_once(" b/")?;
    if new_path.is_empty() {
        return None;
    }
    Some(new_path.to_string())
}

/// Parse a hunk header like "@@ -10,4 +10,15 @@ fn foo()" into
/// (old_start, old_count, new_start, new_count). The closing "@@" is not required.
pub fn parse_hunk_header(line: &str) -> Option<(usize, usize, usize, usize)> {
    let after_first = line.strip_prefix("@@ -")?;
    let mut parts = after_first.split_whitespace();

    let (old_start, old_count) = parse_range(parts.next()?)?;
    let (new_start, new_count) = parse_range(parts.next()?.strip_prefix('+')?)?;

    Some((old_start, old_count, new_start, new_count))
}

/// Parse "start,count" or just "start" (count defaults to 1)
fn parse_range(s: &str) -> Option<(usize, usize)> {
    if let Some((start, count)) = s.split_once(',') {
        Some((start.parse().ok()?, count.parse().ok()?))
    } else {
        Some((s.parse().ok()?, 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_diff() {
        let raw = r#"diff --git a/src/main.rs b/src/main.rs
index abc123..def456 100644
--- a/src/main.rs
+++ b/src/main.rs
@@ -1,3 +1,4 @@ fn main()
 fn main() {
+    println!("hello");
     let x = 1;
 }
"#;
        let parsed = parse_diff(raw, 1);
        assert_eq!(parsed.files.len(), 1);
        assert_eq!(parsed.files[0].path, "src/main.rs");
        assert_eq!(parsed.files[0].status, FileStatus::Modified);
        assert_eq!(parsed.files[0].line, 1);
        assert_eq!(parsed.hunks.len(), 1);
        assert_eq!(parsed.hunks[0].line, 5);
        assert_eq!(parsed.line_count, 9);
        assert_eq!(parsed.lines.len(), 9);

        let added = parsed.lines.get(7).unwrap();
        assert_eq!(added.new_line, Some(2));
        assert_eq!(added.old_line, None);
        assert_eq!(added.path.as_deref(), Some("src/main.rs"));
        assert_eq!(added.hunk.as_deref(), Some("@@ -1,3 +1,4 @@ fn main()"));
    }

    #[test]
    fn test_round_trip_scenario() {
        let raw = "diff --git a/x b/x\n@@ -1,2 +1,3 @@\n a\n-b\n+b2\n+c\n";
        let parsed = parse_diff(raw, 0);

        assert_eq!(parsed.files.len(), 1);
        assert_eq!(parsed.files[0].path, "x");
        assert_eq!(parsed.hunks.len(), 1);
        assert_eq!(parsed.hunks[0].old_start, 1);
        assert_eq!(parsed.hunks[0].new_start, 1);

        let context = parsed.lines.get(2).unwrap();
        assert_eq!((context.old_line, context.new_line), (Some(1), Some(1)));
        let removed = parsed.lines.get(3).unwrap();
        assert_eq!((removed.old_line, removed.new_line), (Some(2), None));
        let added = parsed.lines.get(4).unwrap();
        assert_eq!((added.old_line, added.new_line), (None, Some(2)));
        let added = parsed.lines.get(5).unwrap();
        assert_eq!((added.old_line, added.new_line), (None, Some(3)));
    }

    #[test]
    fn test_parse_new_file() {
        let raw = r#"diff --git a/new.rs b/new.rs
new file mode 100644
index 0000000..abc1234
--- /dev/null
+++ b/new.rs
@@ -0,0 +1,2 @@
+fn hello() {}
+fn world() {}
"#;
        let parsed = parse_diff(raw, 1);
        assert_eq!(parsed.files[0].status, FileStatus::Added);
        // --- and +++ before the hunk are not content
        assert!(!parsed.lines.get(4).unwrap().has_numbers());
        assert!(!parsed.lines.get(5).unwrap().has_numbers());
        assert_eq!(parsed.lines.get(7).unwrap().new_line, Some(1));
        assert_eq!(parsed.lines.get(8).unwrap().new_line, Some(2));
    }

    #[test]
    fn test_parse_deleted_and_renamed_files() {
        let raw = "diff --git a/gone.rs b/gone.rs\n\
deleted file mode 100644\n\
--- a/gone.rs\n\
+++ /dev/null\n\
@@ -1 +0,0 @@\n\
-bye\n\
diff --git a/old.rs b/new.rs\n\
similarity index 100%\n\
rename from old.rs\n\
rename to new.rs\n\
diff --git a/plain.rs b/plain.rs\n\
index 1..2 100644\n";
        let parsed = parse_diff(raw, 1);
        let statuses: Vec<char> = parsed.files.iter().map(|f| f.status.as_char()).collect();
        assert_eq!(statuses, vec!['D', 'R', 'M']);
        assert_eq!(parsed.files[1].path, "new.rs");
        assert_eq!(parsed.lines.get(6).unwrap().old_line, Some(1));
    }

    #[test]
    fn test_parse_hunk_header() {
        let (old_start, old_count, new_start, new_count) =
            parse_hunk_header("@@ -10,4 +10,15 @@ impl Foo").unwrap();
        assert_eq!(old_start, 10);
        assert_eq!(old_count, 4);
        assert_eq!(new_start, 10);
        assert_eq!(new_count, 15);
    }

    #[test]
    fn test_parse_hunk_header_starts() {
        let (old_start, _, new_start, _) = parse_hunk_header("@@ -12,5 +20,3 @@").unwrap();
        assert_eq!((old_start, new_start), (12, 20));
    }

    #[test]
    fn test_parse_hunk_header_without_counts() {
        let (old_start, old_count, new_start, new_count) = parse_hunk_header("@@ -7 +9 @@").unwrap();
        assert_eq!((old_start, old_count), (7, 1));
        assert_eq!((new_start, new_count), (9, 1));
    }

    #[test]
    fn test_parse_hunk_header_rejects_garbage() {
        assert!(parse_hunk_header("@@ nonsense @@").is_none());
        assert!(parse_hunk_header("@@ -a,b +c,d @@").is_none());
    }

    #[test]
    fn test_counts_of_numbered_lines() {
        // 2 context, 3 added, 1 deleted
        let raw = "diff --git a/f b/f\n@@ -5,3 +5,5 @@\n ctx\n+a1\n-d1\n+a2\n ctx\n+a3\n";
        let parsed = parse_diff(raw, 1);
        let with_new = parsed.lines.iter().filter(|(_, i)| i.new_line.is_some()).count();
        let with_old = parsed.lines.iter().filter(|(_, i)| i.old_line.is_some()).count();
        assert_eq!(with_new, 2 + 3);
        assert_eq!(with_old, 2 + 1);
    }

    #[test]
    fn test_line_numbers_monotonic_within_hunk() {
        let raw = "diff --git a/f b/f\n@@ -1,4 +1,4 @@\n a\n-b\n+B\n c\n-d\n+D\n";
        let parsed = parse_diff(raw, 1);
        let mut last_old = 0;
        let mut last_new = 0;
        for (_, info) in parsed.lines.iter() {
            if let Some(old) = info.old_line {
                assert!(old >= last_old);
                last_old = old;
            }
            if let Some(new) = info.new_line {
                assert!(new >= last_new);
                last_new = new;
            }
        }
    }

    #[test]
    fn test_diff_line_prefers_new_side() {
        let raw = "diff --git a/f b/f\n@@ -10,2 +20,2 @@\n same\n-gone\n+here\n";
        let parsed = parse_diff(raw, 1);
        assert_eq!(parsed.lines.get(3).unwrap().diff_line, Some(20));
        assert_eq!(parsed.lines.get(4).unwrap().diff_line, Some(11));
        assert_eq!(parsed.lines.get(5).unwrap().diff_line, Some(21));
    }

    #[test]
    fn test_no_newline_marker_has_no_numbers() {
        let raw = "diff --git a/f b/f\n@@ -1 +1 @@\n-old\n\\ No newline at end of file\n+new\n";
        let parsed = parse_diff(raw, 1);
        let marker = parsed.lines.get(4).unwrap();
        assert!(!marker.has_numbers());
        assert_eq!(marker.path.as_deref(), Some("f"));
        // Counter untouched by the marker line
        assert_eq!(parsed.lines.get(5).unwrap().new_line, Some(1));
    }

    #[test]
    fn test_hunk_without_file_header() {
        let raw = "@@ -1,1 +1,1 @@\n-a\n+b\n";
        let parsed = parse_diff(raw, 1);
        assert!(parsed.files.is_empty());
        assert_eq!(parsed.hunks.len(), 1);
        assert_eq!(parsed.hunks[0].path, None);
        assert_eq!(parsed.lines.get(3).unwrap().new_line, Some(1));
        assert_eq!(parsed.lines.get(3).unwrap().path, None);
    }

    #[test]
    fn test_start_line_offsets_keys() {
        let raw = "diff --git a/x b/x\n@@ -1 +1 @@\n+a\n";
        let parsed = parse_diff(raw, 40);
        assert_eq!(parsed.files[0].line, 40);
        assert_eq!(parsed.hunks[0].line, 41);
        assert_eq!(parsed.lines.get(42).unwrap().new_line, Some(1));
        assert!(parsed.lines.get(39).is_none());
    }

    #[test]
    fn test_second_file_resets_counters() {
        let raw = "diff --git a/a b/a\n@@ -1 +1 @@\n+x\ndiff --git a/b b/b\n+not content\n@@ -3 +3 @@\n+y\n";
        let parsed = parse_diff(raw, 1);
        let stray = parsed.lines.get(5).unwrap();
        assert!(!stray.has_numbers());
        assert_eq!(stray.path.as_deref(), Some("b"));
        assert_eq!(stray.hunk, None);
        assert_eq!(parsed.hunks[1].path.as_deref(), Some("b"));
        assert_eq!(parsed.lines.get(7).unwrap().new_line, Some(3));
    }

    #[test]
    fn test_empty_input() {
        let parsed = parse_diff("", 1);
        assert!(parsed.files.is_empty());
        assert!(parsed.lines.is_empty());
        assert_eq!(parsed.line_count, 0);
    }
}
