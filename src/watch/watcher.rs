// src/watch/watcher.rs

use std::path::{Path, PathBuf};

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{info, trace, warn};

use crate::errors::{PipelineError, Result};
use crate::watch::path_utils::relative_str;

/// Whether a changed path still exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Created or modified.
    Upsert,
    Removed,
}

/// One filesystem change, project-relative with forward slashes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: String,
    pub kind: ChangeKind,
}

impl FileChange {
    pub fn upsert(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: ChangeKind::Upsert,
        }
    }

    pub fn removed(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: ChangeKind::Removed,
        }
    }
}

/// Keeps the underlying `notify` watcher alive. Dropping it stops watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Watch `dir` recursively and forward changes (relative to `root`) over an
/// unbounded channel.
///
/// Renames and editors that replace files report a mix of event kinds, so
/// the kind is decided by whether the path exists when the event arrives.
pub fn spawn_watcher(root: &Path, dir: &Path) -> Result<(WatcherHandle, mpsc::UnboundedReceiver<FileChange>)> {
    let root: PathBuf = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    let (tx, rx) = mpsc::unbounded_channel();

    let callback_root = root.clone();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if !matches!(
                    event.kind,
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                ) {
                    return;
                }
                for path in event.paths {
                    let Some(rel) = relative_str(&callback_root, &path) else {
                        trace!(?path, "event outside project root");
                        continue;
                    };
                    let change = if std::fs::symlink_metadata(&path).is_ok() {
                        if path.is_dir() {
                            continue;
                        }
                        FileChange::upsert(rel)
                    } else {
                        FileChange::removed(rel)
                    };
                    if tx.send(change).is_err() {
                        return;
                    }
                }
            }
            Err(err) => warn!(error = %err, "file watch error"),
        },
        Config::default(),
    )
    .map_err(|e| PipelineError::Other(e.into()))?;

    watcher
        .watch(dir, RecursiveMode::Recursive)
        .map_err(|e| PipelineError::Other(e.into()))?;
    info!(?dir, "file watcher started");

    Ok((WatcherHandle { _inner: watcher }, rx))
}
