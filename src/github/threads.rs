use serde::Serialize;
use std::collections::{HashMap, HashSet};

use super::Comment;

/// A root review comment plus its replies in arrival order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Thread {
    /// Id of the root comment
    pub id: u64,
    pub path: String,
    pub line: Option<usize>,
    pub comments: Vec<Comment>,
    pub collapsed: bool,
}

impl Thread {
    fn new(root: Comment) -> Self {
        Self {
            id: root.id,
            path: root.path.clone(),
            line: root.line.or(root.original_line),
            comments: vec![root],
            collapsed: false,
        }
    }

    pub fn root(&self) -> &Comment {
        &self.comments[0]
    }

    pub fn reply_count(&self) -> usize {
        self.comments.len() - 1
    }
}

/// Group a flat comment list into threads.
///
/// Threads come out in the order their roots were first seen. A reply whose parent
/// never appeared starts a thread of its own instead of being dropped, so every
/// input comment lands in exactly one thread. Replies to replies join the thread
/// of the comment they answer.
pub fn build_threads(comments: &[Comment]) -> Vec<Thread> {
    let mut threads: Vec<Thread> = Vec::new();
    // comment id -> index of the thread holding it
    let mut thread_of: HashMap<u64, usize> = HashMap::new();

    for comment in comments {
        let parent = comment
            .in_reply_to_id
            .and_then(|parent_id| thread_of.get(&parent_id).copied());

        match parent {
            Some(idx) => {
                thread_of.insert(comment.id, idx);
                threads[idx].comments.push(comment.clone());
            }
            None => {
                if let Some(parent_id) = comment.in_reply_to_id {
                    log::debug!(
                        "comment {} replies to unknown comment {}; showing it as its own thread",
                        comment.id,
                        parent_id
                    );
                }
                thread_of.insert(comment.id, threads.len());
                threads.push(Thread::new(comment.clone()));
            }
        }
    }

    threads
}

/// Carry collapsed state over from the caller's overlay
pub fn apply_collapsed(threads: &mut [Thread], collapsed: &HashSet<u64>) {
    for thread in threads.iter_mut() {
        thread.collapsed = collapsed.contains(&thread.id);
    }
}
