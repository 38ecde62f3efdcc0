use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use review_anchor::app::ReviewSession;
use review_anchor::config::{self, ReviewConfig};
use review_anchor::pipeline::{self, FileSource, Refresher, RefreshOutcome};
use review_anchor::watch::{FileWatcher, WatchEvent};
use review_anchor::{git, github};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::time::Duration;

/// Diff parsing, comment threading and draft-comment anchoring for code review
#[derive(Parser)]
#[command(name = "ranchor", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a unified diff and print its file/hunk markers and line context as JSON
    Parse {
        diff: PathBuf,
        /// Output line the diff text starts at
        #[arg(long, default_value_t = 1)]
        start_line: usize,
    },
    /// Group a review comment list (JSON) into threads
    Threads { comments: PathBuf },
    /// Resolve drafted comments into review API targets (fails if any can't be placed)
    Resolve {
        #[arg(long)]
        diff: PathBuf,
        #[arg(long)]
        comments: Option<PathBuf>,
        #[arg(long)]
        pending: PathBuf,
    },
    /// Re-run the refresh pipeline whenever the inputs change
    Watch {
        #[arg(long)]
        diff: PathBuf,
        #[arg(long)]
        comments: Option<PathBuf>,
        #[arg(long)]
        pending: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let config = config::load_config(&cwd);

    match cli.command {
        Command::Parse { diff, start_line } => {
            let raw = std::fs::read_to_string(&diff)
                .with_context(|| format!("Failed to read diff {}", diff.display()))?;
            print_json(&git::parse_diff(&raw, start_line))
        }
        Command::Threads { comments } => {
            let comments = pipeline::load_comments(&comments)?;
            print_json(&github::build_threads(&comments))
        }
        Command::Resolve {
            diff,
            comments,
            pending,
        } => resolve(config, FileSource::new(diff, comments), &pending),
        Command::Watch {
            diff,
            comments,
            pending,
        } => watch(config, FileSource::new(diff, comments), pending.as_deref()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn resolve(config: ReviewConfig, source: FileSource, pending_path: &Path) -> Result<()> {
    let mut session = ReviewSession::new(config);
    let mut refresher = Refresher::new();
    pipeline::refresh_now(&mut session, &mut refresher, &source)?;
    session.restore_pending(pipeline::load_pending(pending_path)?);

    let targets = session
        .resolve_pending()
        .into_batch()
        .context("Nothing submitted; fix or discard the listed comments and retry")?;
    print_json(&targets)
}

fn watch(config: ReviewConfig, source: FileSource, pending_path: Option<&Path>) -> Result<()> {
    let debounce_ms = config.watch.debounce_ms;
    let mut session = ReviewSession::new(config);
    let mut refresher = Refresher::new();
    let source = Arc::new(source);

    // Channel for file watch events
    let (watch_tx, watch_rx) = mpsc::channel::<WatchEvent>();
    let _watcher = FileWatcher::new(&source.watched_paths(), debounce_ms, watch_tx)?;

    // Channel for completed fetches
    let (fetch_tx, fetch_rx) = mpsc::channel();

    pipeline::refresh_now(&mut session, &mut refresher, source.as_ref())?;
    if let Some(path) = pending_path {
        session.restore_pending(pipeline::load_pending(path)?);
    }
    print_summary(&session);

    loop {
        while let Ok(WatchEvent::FilesChanged(paths)) = watch_rx.try_recv() {
            let generation = session.begin_refresh();
            log::debug!("{} file(s) changed, starting generation {}", paths.len(), generation);
            pipeline::spawn_fetch(generation, Arc::clone(&source), fetch_tx.clone());
        }

        match fetch_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(fetched) => match refresher.apply(&mut session, fetched) {
                Ok(RefreshOutcome::Applied) => print_summary(&session),
                Ok(_) => {}
                Err(e) => log::warn!("{:#}", e),
            },
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    Ok(())
}

fn print_summary(session: &ReviewSession) {
    println!(
        "generation {}: {} files, {} hunks, {} threads, {} lines",
        session.applied_generation().unwrap_or(0),
        session.file_markers().len(),
        session.hunk_markers().len(),
        session.threads().len(),
        session.line_count()
    );
    for comment in session.pending() {
        println!("  pending #{} {}:{}", comment.id, comment.path, comment.line);
    }
}
