use anyhow::Result;
use std::collections::HashSet;

use crate::anchor::{self, capture_cursor, restore_cursor, DuplicatePolicy, PendingComment};
use crate::config::{LayoutConfig, ReviewConfig};
use crate::git::{self, FileMarker, HunkMarker, LineContext, ParsedDiff};
use crate::github::{self, ApiCommentTarget, Comment, Resolution, Thread};

/// Monotonic tag for one refresh cycle
pub type Generation = u64;

/// One fetched view of the review: raw diff text plus the remote comment list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub diff: String,
    pub comments: Vec<Comment>,
}

/// Rendered position of a thread header in the thread block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadRow {
    pub line: usize,
    pub thread_id: u64,
}

/// Review state that survives refreshes.
///
/// Parsed markers and threads are rebuilt from scratch on every snapshot. The UI overlay
/// (collapsed thread ids, pending comments, cursor) is keyed by stable ids and merged
/// back in after each rebuild.
#[derive(Debug, Clone)]
pub struct ReviewSession {
    config: ReviewConfig,
    snapshot: Option<Snapshot>,
    parsed: ParsedDiff,
    threads: Vec<Thread>,
    /// First output line of the diff text in the current layout
    diff_start: usize,
    collapsed: HashSet<u64>,
    pending: Vec<PendingComment>,
    next_pending_id: u64,
    cursor_line: usize,
    generation: Generation,
    applied_generation: Option<Generation>,
}

impl ReviewSession {
    pub fn new(config: ReviewConfig) -> Self {
        Self {
            config,
            snapshot: None,
            parsed: ParsedDiff::default(),
            threads: Vec::new(),
            diff_start: 1,
            collapsed: HashSet::new(),
            pending: Vec::new(),
            next_pending_id: 1,
            cursor_line: 1,
            generation: 0,
            applied_generation: None,
        }
    }

    fn policy(&self) -> DuplicatePolicy {
        self.config.anchor.policy()
    }

    // ── Refresh ──

    /// Start a refresh cycle. Results tagged with an older generation will be dropped.
    pub fn begin_refresh(&mut self) -> Generation {
        self.generation += 1;
        self.generation
    }

    /// Whether `generation` is still the newest refresh started
    pub fn is_current(&self, generation: Generation) -> bool {
        generation == self.generation
    }

    pub fn applied_generation(&self) -> Option<Generation> {
        self.applied_generation
    }

    /// Rebuild the view from a fetched snapshot. Returns false (and changes nothing)
    /// when a newer refresh has started since `generation` was issued.
    pub fn apply_snapshot(&mut self, generation: Generation, snapshot: Snapshot) -> bool {
        if !self.is_current(generation) {
            log::warn!(
                "dropping stale snapshot (generation {}, latest {})",
                generation,
                self.generation
            );
            return false;
        }

        self.snapshot = Some(snapshot);
        self.rebuild();
        self.applied_generation = Some(generation);
        log::info!(
            "applied generation {}: {} files, {} threads, {} pending",
            generation,
            self.parsed.files.len(),
            self.threads.len(),
            self.pending.len()
        );
        true
    }

    /// Re-run layout, parse and anchoring over the current snapshot
    fn rebuild(&mut self) {
        let cursor = capture_cursor(self.cursor_line, &self.parsed.lines);
        let Some(snapshot) = self.snapshot.as_ref() else {
            return;
        };

        let mut threads = github::build_threads(&snapshot.comments);
        github::apply_collapsed(&mut threads, &self.collapsed);

        let diff_start = diff_start_line(&self.config.layout, &threads);
        self.parsed = git::parse_diff(&snapshot.diff, diff_start);
        self.threads = threads;
        self.diff_start = diff_start;

        let policy = self.policy();
        anchor::reanchor(&mut self.pending, &self.parsed.lines, policy);
        self.cursor_line = restore_cursor(&cursor, &self.parsed.lines, self.line_count(), policy).max(1);
        log::debug!(
            "rebuilt layout: diff starts at line {}, cursor {} -> {}",
            diff_start,
            cursor.raw_line,
            self.cursor_line
        );
    }

    // ── Threads ──

    pub fn threads(&self) -> &[Thread] {
        &self.threads
    }

    /// Collapse or expand a thread. The layout shifts, so pending comments and the
    /// cursor are re-anchored. Returns false for unknown thread ids.
    pub fn toggle_thread(&mut self, thread_id: u64) -> bool {
        if !self.threads.iter().any(|t| t.id == thread_id) {
            return false;
        }
        if !self.collapsed.remove(&thread_id) {
            self.collapsed.insert(thread_id);
        }
        self.rebuild();
        true
    }

    /// Header line of every thread in the thread block
    pub fn thread_rows(&self) -> Vec<ThreadRow> {
        let mut line = self.config.layout.header_lines + 1;
        self.threads
            .iter()
            .map(|thread| {
                let row = ThreadRow {
                    line,
                    thread_id: thread.id,
                };
                line += thread_height(thread);
                row
            })
            .collect()
    }

    // ── Diff view ──

    pub fn file_markers(&self) -> &[FileMarker] {
        &self.parsed.files
    }

    pub fn hunk_markers(&self) -> &[HunkMarker] {
        &self.parsed.hunks
    }

    pub fn line_context(&self) -> &LineContext {
        &self.parsed.lines
    }

    pub fn diff_start(&self) -> usize {
        self.diff_start
    }

    /// Total rendered lines: header, thread block and diff text
    pub fn line_count(&self) -> usize {
        self.diff_start - 1 + self.parsed.line_count
    }

    pub fn cursor(&self) -> usize {
        self.cursor_line
    }

    pub fn set_cursor(&mut self, line: usize) {
        self.cursor_line = line.clamp(1, self.line_count().max(1));
    }

    pub fn next_hunk_line(&self, from: usize) -> Option<usize> {
        self.parsed.hunks.iter().map(|h| h.line).find(|&l| l > from)
    }

    pub fn prev_hunk_line(&self, from: usize) -> Option<usize> {
        self.parsed.hunks.iter().rev().map(|h| h.line).find(|&l| l < from)
    }

    pub fn next_file_line(&self, from: usize) -> Option<usize> {
        self.parsed.files.iter().map(|f| f.line).find(|&l| l > from)
    }

    pub fn prev_file_line(&self, from: usize) -> Option<usize> {
        self.parsed.files.iter().rev().map(|f| f.line).find(|&l| l < from)
    }

    // ── Pending comments ──

    pub fn pending(&self) -> &[PendingComment] {
        &self.pending
    }

    /// Draft a comment on an output line. None when the line isn't a diff row.
    pub fn add_pending(&mut self, line: usize, body: String) -> Option<u64> {
        let comment = PendingComment::at_line(self.next_pending_id, line, body, &self.parsed.lines)?;
        Some(self.push_pending(comment))
    }

    /// Draft a comment over a line range of one file
    pub fn add_pending_range(&mut self, start: usize, end: usize, body: String) -> Option<u64> {
        let comment =
            PendingComment::for_range(self.next_pending_id, start, end, body, &self.parsed.lines)?;
        Some(self.push_pending(comment))
    }

    fn push_pending(&mut self, comment: PendingComment) -> u64 {
        let id = comment.id;
        self.next_pending_id = id + 1;
        self.pending.push(comment);
        id
    }

    /// Bring back drafts from an earlier session and pin them to the current view
    pub fn restore_pending(&mut self, mut comments: Vec<PendingComment>) {
        anchor::reanchor(&mut comments, &self.parsed.lines, self.policy());
        let max_id = comments.iter().map(|c| c.id).max().unwrap_or(0);
        self.next_pending_id = self.next_pending_id.max(max_id + 1);
        self.pending.extend(comments);
    }

    pub fn edit_pending(&mut self, id: u64, body: String) -> bool {
        match self.pending.iter_mut().find(|c| c.id == id) {
            Some(comment) => {
                comment.body = body;
                true
            }
            None => false,
        }
    }

    pub fn discard_pending(&mut self, id: u64) -> bool {
        let before = self.pending.len();
        self.pending.retain(|c| c.id != id);
        self.pending.len() != before
    }

    // ── Submission ──

    /// Resolve every pending comment against the current view without consuming them
    pub fn resolve_pending(&self) -> Resolution {
        github::resolve_targets(&self.pending, &self.parsed.lines, self.policy())
    }

    /// Submit all pending comments as one batch. Nothing is sent when any comment fails
    /// to resolve; drafts are only cleared once `send` succeeds.
    pub fn submit<F>(&mut self, send: F) -> Result<usize>
    where
        F: FnOnce(&[ApiCommentTarget]) -> Result<()>,
    {
        let targets = self.resolve_pending().into_batch()?;
        send(&targets)?;
        self.pending.clear();
        Ok(targets.len())
    }
}

fn thread_height(thread: &Thread) -> usize {
    if thread.collapsed {
        1
    } else {
        1 + thread.comments.len()
    }
}

/// First output line of the diff text: header, then the thread block, then an optional blank
fn diff_start_line(layout: &LayoutConfig, threads: &[Thread]) -> usize {
    let thread_lines: usize = threads.iter().map(thread_height).sum();
    let blank = usize::from(layout.blank_after_threads && !threads.is_empty());
    1 + layout.header_lines + thread_lines + blank
}
