use anyhow::{Context, Result};
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebouncedEvent, DebouncedEventKind};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

/// Events emitted by the file watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// One or more input files changed; time to start a new refresh generation
    FilesChanged(Vec<PathBuf>),
}

/// A debounced watcher over the snapshot input files (diff text, comment list)
pub struct FileWatcher {
    _watcher: notify_debouncer_mini::Debouncer<RecommendedWatcher>,
}

impl FileWatcher {
    /// Start watching `files`. Their parent directories are watched so that editors
    /// replacing a file by rename are still noticed. Events are debounced by `debounce_ms`.
    pub fn new(files: &[PathBuf], debounce_ms: u64, tx: mpsc::Sender<WatchEvent>) -> Result<Self> {
        let targets: Vec<PathBuf> = files.iter().map(|f| absolute(f)).collect();
        let filter_targets = targets.clone();

        let mut debouncer = new_debouncer(
            Duration::from_millis(debounce_ms),
            move |result: std::result::Result<Vec<DebouncedEvent>, notify::Error>| match result {
                Ok(events) => {
                    let touched = events
                        .iter()
                        .filter(|e| e.kind == DebouncedEventKind::Any)
                        .map(|e| e.path.as_path());
                    let changed = matching_paths(touched, &filter_targets);
                    if !changed.is_empty() {
                        let _ = tx.send(WatchEvent::FilesChanged(changed));
                    }
                }
                Err(e) => log::warn!("file watcher error: {}", e),
            },
        )
        .context("Failed to start file watcher")?;

        let dirs: BTreeSet<PathBuf> = targets
            .iter()
            .map(|t| t.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from(".")))
            .collect();
        for dir in &dirs {
            debouncer
                .watcher()
                .watch(dir, RecursiveMode::NonRecursive)
                .with_context(|| format!("Failed to watch {}", dir.display()))?;
        }
        log::debug!("watching {} file(s) in {} dir(s)", targets.len(), dirs.len());

        Ok(FileWatcher {
            _watcher: debouncer,
        })
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Watched files among a batch of touched paths, each reported once
fn matching_paths<'a>(touched: impl IntoIterator<Item = &'a Path>, targets: &[PathBuf]) -> Vec<PathBuf> {
    let mut changed: Vec<PathBuf> = Vec::new();
    for path in touched {
        if let Some(target) = targets.iter().find(|t| t.as_path() == path) {
            if !changed.contains(target) {
                changed.push(target.clone());
            }
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_watched_files_are_reported() {
        let targets = vec![PathBuf::from("/w/pr.diff"), PathBuf::from("/w/comments.json")];
        let touched = [
            Path::new("/w/pr.diff"),
            Path::new("/w/other.txt"),
            Path::new("/w/pr.diff"),
        ];
        assert_eq!(matching_paths(touched, &targets), vec![PathBuf::from("/w/pr.diff")]);
    }

    #[test]
    fn nothing_touched_reports_nothing() {
        let targets = vec![PathBuf::from("/w/pr.diff")];
        assert!(matching_paths(std::iter::empty(), &targets).is_empty());
    }

    #[test]
    fn watcher_starts_on_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("pr.diff");
        std::fs::write(&file, "").unwrap();
        let (tx, _rx) = mpsc::channel();
        assert!(FileWatcher::new(&[file], 50, tx).is_ok());
    }
}
