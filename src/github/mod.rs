mod target;
mod threads;

pub use target::{resolve_targets, ApiCommentTarget, Resolution, ResolveError, Side};
pub use threads::{apply_collapsed, build_threads, Thread};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// GitHub review comment from the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub line: Option<usize>,
    #[serde(default)]
    pub original_line: Option<usize>,
    #[serde(default)]
    pub diff_hunk: Option<String>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub user: GitHubUser,
    #[serde(default)]
    pub in_reply_to_id: Option<u64>,
    #[serde(default)]
    pub start_line: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitHubUser {
    #[serde(default)]
    pub login: String,
}

/// Decode a review comment list.
/// A paginating client concatenates pages as `[...][...]`; every page is read in turn.
/// Pages after an undecodable one are dropped with a warning, but the first page must decode.
pub fn parse_comments_json(raw: &str) -> Result<Vec<Comment>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut all_comments = Vec::new();
    let pages = serde_json::Deserializer::from_str(raw).into_iter::<Vec<Comment>>();
    for (idx, page) in pages.enumerate() {
        match page {
            Ok(mut batch) => all_comments.append(&mut batch),
            Err(e) if idx == 0 => {
                return Err(e).context("Failed to parse review comments");
            }
            Err(e) => {
                log::warn!("Skipping review comments after page {}: {}", idx, e);
                break;
            }
        }
    }

    Ok(all_comments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_single_page() {
        let raw = r#"[
            {"id": 1, "path": "src/lib.rs", "line": 10, "body": "hi", "user": {"login": "octo"}},
            {"id": 2, "path": "src/lib.rs", "line": 10, "body": "re", "user": {"login": "cat"}, "in_reply_to_id": 1}
        ]"#;
        let comments = parse_comments_json(raw).unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].user.login, "octo");
        assert_eq!(comments[1].in_reply_to_id, Some(1));
    }

    #[test]
    fn parse_paginated_pages() {
        let raw = r#"[{"id": 1, "path": "a", "body": "[x]"}][{"id": 2, "path": "b", "body": "]["}]"#;
        let comments = parse_comments_json(raw).unwrap();
        let ids: Vec<u64> = comments.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(comments[1].body, "][");
    }

    #[test]
    fn parse_ignores_unknown_fields() {
        let raw = r#"[{"id": 9, "path": "a", "side": "RIGHT", "created_at": "2024-01-01T00:00:00Z",
            "original_line": 4, "diff_hunk": "@@ -1 +1 @@", "start_line": null}]"#;
        let comments = parse_comments_json(raw).unwrap();
        assert_eq!(comments[0].original_line, Some(4));
        assert_eq!(comments[0].diff_hunk.as_deref(), Some("@@ -1 +1 @@"));
        assert_eq!(comments[0].line, None);
        assert_eq!(comments[0].user, GitHubUser::default());
    }

    #[test]
    fn parse_empty_input() {
        assert!(parse_comments_json("").unwrap().is_empty());
        assert!(parse_comments_json("  \n").unwrap().is_empty());
        assert!(parse_comments_json("[]").unwrap().is_empty());
    }

    #[test]
    fn parse_invalid_first_page_is_error() {
        assert!(parse_comments_json("{\"not\": \"a list\"}").is_err());
    }

    #[test]
    fn parse_keeps_pages_before_invalid_one() {
        let raw = r#"[{"id": 1, "path": "a"}][{"id": "oops"}]"#;
        let comments = parse_comments_json(raw).unwrap();
        assert_eq!(comments.len(), 1);
    }
}
