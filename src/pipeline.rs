use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;

use crate::anchor::PendingComment;
use crate::app::{Generation, ReviewSession, Snapshot};
use crate::github;

/// Somewhere a fresh diff + comment list can be fetched from
pub trait SnapshotSource {
    fn fetch(&self) -> Result<Snapshot>;
}

/// Reads the diff text and (optionally) a comment list JSON from disk
#[derive(Debug, Clone)]
pub struct FileSource {
    pub diff_path: PathBuf,
    pub comments_path: Option<PathBuf>,
}

impl FileSource {
    pub fn new(diff_path: PathBuf, comments_path: Option<PathBuf>) -> Self {
        Self {
            diff_path,
            comments_path,
        }
    }

    /// Paths whose changes should trigger a refresh
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        let mut paths = vec![self.diff_path.clone()];
        paths.extend(self.comments_path.iter().cloned());
        paths
    }
}

impl SnapshotSource for FileSource {
    fn fetch(&self) -> Result<Snapshot> {
        let diff = std::fs::read_to_string(&self.diff_path)
            .with_context(|| format!("Failed to read diff {}", self.diff_path.display()))?;
        let comments = match self.comments_path {
            Some(ref path) => load_comments(path)?,
            None => Vec::new(),
        };
        Ok(Snapshot { diff, comments })
    }
}

/// Load a review comment list from a JSON file
pub fn load_comments(path: &Path) -> Result<Vec<github::Comment>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read comments {}", path.display()))?;
    github::parse_comments_json(&raw).with_context(|| format!("In {}", path.display()))
}

/// Load drafted comments saved by an earlier session
pub fn load_pending(path: &Path) -> Result<Vec<PendingComment>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read pending comments {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse pending comments {}", path.display()))
}

/// Compute SHA-256 over a snapshot (for skipping no-op refreshes)
pub fn snapshot_hash(snapshot: &Snapshot) -> String {
    let mut hasher = Sha256::new();
    hasher.update(snapshot.diff.as_bytes());
    hasher.update([0u8]);
    hasher.update(serde_json::to_vec(&snapshot.comments).unwrap_or_default());
    format!("{:x}", hasher.finalize())
}

/// A completed fetch, tagged with the generation that requested it
#[derive(Debug)]
pub struct FetchResult {
    pub generation: Generation,
    pub result: Result<Snapshot>,
}

/// Fetch on a background thread and report back over `tx`
pub fn spawn_fetch<S>(
    generation: Generation,
    source: Arc<S>,
    tx: mpsc::Sender<FetchResult>,
) -> JoinHandle<()>
where
    S: SnapshotSource + Send + Sync + 'static,
{
    std::thread::spawn(move || {
        let result = source.fetch();
        // Receiver gone means the session shut down; nothing left to update
        let _ = tx.send(FetchResult { generation, result });
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Applied,
    /// Same content as the last applied snapshot
    Unchanged,
    /// A newer refresh started before this one finished
    Stale,
}

/// Feeds fetch results into a session, enforcing generation order
#[derive(Debug, Default)]
pub struct Refresher {
    last_hash: Option<String>,
}

impl Refresher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, session: &mut ReviewSession, fetched: FetchResult) -> Result<RefreshOutcome> {
        if !session.is_current(fetched.generation) {
            log::warn!("discarding fetch for stale generation {}", fetched.generation);
            return Ok(RefreshOutcome::Stale);
        }

        let snapshot = fetched
            .result
            .with_context(|| format!("Refresh {} failed", fetched.generation))?;
        let hash = snapshot_hash(&snapshot);
        if self.last_hash.as_deref() == Some(hash.as_str()) {
            log::debug!("generation {} unchanged, skipping rebuild", fetched.generation);
            return Ok(RefreshOutcome::Unchanged);
        }

        session.apply_snapshot(fetched.generation, snapshot);
        self.last_hash = Some(hash);
        Ok(RefreshOutcome::Applied)
    }
}

/// Fetch synchronously and apply: one full refresh cycle
pub fn refresh_now<S: SnapshotSource>(
    session: &mut ReviewSession,
    refresher: &mut Refresher,
    source: &S,
) -> Result<RefreshOutcome> {
    let generation = session.begin_refresh();
    let result = source.fetch();
    refresher.apply(session, FetchResult { generation, result })
}
