use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::anchor::{locate, DuplicatePolicy, LineAnchor, PendingComment};
use crate::git::{LineContext, LineInfo};

/// Which half of the diff a review comment attaches to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Pre-image (old file)
    Left,
    /// Post-image (new file)
    Right,
}

/// Payload for one pull-request review comment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiCommentTarget {
    pub path: String,
    pub body: String,
    pub line: usize,
    pub side: Side,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_side: Option<Side>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("{} pending comment(s) no longer map onto the diff: {ids:?}", .ids.len())]
    Unresolved { ids: Vec<u64> },
}

/// Targets for every pending comment that could be placed, plus the ids that couldn't
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub targets: Vec<ApiCommentTarget>,
    pub unresolved_ids: Vec<u64>,
}

impl Resolution {
    /// All-or-nothing view of the batch: any unresolved id fails the whole submission.
    pub fn into_batch(self) -> Result<Vec<ApiCommentTarget>, ResolveError> {
        if self.unresolved_ids.is_empty() {
            Ok(self.targets)
        } else {
            Err(ResolveError::Unresolved {
                ids: self.unresolved_ids,
            })
        }
    }
}

/// Turn pending comments into review API targets against the current line context.
/// Always walks the whole list so the caller gets every unresolved id at once.
pub fn resolve_targets(
    pending: &[PendingComment],
    lines: &LineContext,
    policy: DuplicatePolicy,
) -> Resolution {
    let mut resolution = Resolution::default();

    for comment in pending {
        match resolve_one(comment, lines, policy) {
            Some(target) => resolution.targets.push(target),
            None => {
                log::warn!("pending comment {} could not be resolved", comment.id);
                resolution.unresolved_ids.push(comment.id);
            }
        }
    }

    resolution
}

fn resolve_one(
    comment: &PendingComment,
    lines: &LineContext,
    policy: DuplicatePolicy,
) -> Option<ApiCommentTarget> {
    if comment.path.is_empty() {
        return None;
    }

    let end_cached = comment.end_line.unwrap_or(comment.line);
    let (line, side) = resolve_endpoint(comment, end_cached, comment.end_anchor(), lines, policy)?;

    let mut target = ApiCommentTarget {
        path: comment.path.clone(),
        body: comment.body.clone(),
        line,
        side,
        start_line: None,
        start_side: None,
    };

    if let Some(start_cached) = comment.start_line.filter(|_| comment.is_range()) {
        match resolve_endpoint(comment, start_cached, comment.start_anchor(), lines, policy) {
            Some((start_line, start_side)) if start_side == side && start_line < line => {
                target.start_line = Some(start_line);
                target.start_side = Some(start_side);
            }
            Some((_, start_side)) if start_side != side => {
                log::debug!(
                    "pending comment {} spans both sides; submitting end line only",
                    comment.id
                );
            }
            _ => {}
        }
    }

    Some(target)
}

/// Three-step lookup: cached output line, then anchor scan, then the anchor's raw numbers
fn resolve_endpoint(
    comment: &PendingComment,
    cached_line: usize,
    anchor: &LineAnchor,
    lines: &LineContext,
    policy: DuplicatePolicy,
) -> Option<(usize, Side)> {
    let cached = lines
        .get(cached_line)
        .filter(|info| info.path.as_deref() == Some(comment.path.as_str()))
        .and_then(side_of);
    if cached.is_some() {
        return cached;
    }

    let scanned = locate(lines, &comment.path, anchor, comment.hunk.as_deref(), policy)
        .and_then(|line| lines.get(line))
        .and_then(side_of);
    if scanned.is_some() {
        return scanned;
    }

    // May point outside the current diff; the remote API gets the final say
    anchor
        .new_line
        .map(|n| (n, Side::Right))
        .or_else(|| anchor.old_line.map(|o| (o, Side::Left)))
}

fn side_of(info: &LineInfo) -> Option<(usize, Side)> {
    info.new_line
        .map(|n| (n, Side::Right))
        .or_else(|| info.old_line.map(|o| (o, Side::Left)))
}
