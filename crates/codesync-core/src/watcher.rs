//! Recursive change notifications for the source tree

use std::path::{Path, PathBuf};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{trace, warn};

use crate::error::{Error, Result};

/// One filesystem change under the watched root
///
/// The session only cares that something changed; the payload is kept for
/// logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: EventKind,
    pub paths: Vec<PathBuf>,
}

/// Whether an event kind is an actual change.
///
/// Access notifications (open, read, close) are produced by the transfer
/// tool itself while it reads the tree, so they must not re-trigger a run.
pub fn is_change(kind: &EventKind) -> bool {
    !matches!(kind, EventKind::Access(_))
}

/// Keeps a recursive watch alive for as long as it is held
#[derive(Debug)]
pub struct ChangeWatcher {
    root: PathBuf,
    _watcher: RecommendedWatcher,
}

impl ChangeWatcher {
    /// Start watching `root` recursively, forwarding every change to `changes`.
    ///
    /// Events are forwarded one by one, in delivery order, without any
    /// debouncing. Failure to establish the watch is fatal for the session.
    pub fn start(root: &Path, changes: mpsc::UnboundedSender<ChangeEvent>) -> Result<Self> {
        let watch_error = |source| Error::Watch {
            path: root.to_path_buf(),
            source,
        };

        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            match result {
                Ok(event) if is_change(&event.kind) => {
                    trace!(kind = ?event.kind, paths = ?event.paths, "Change detected");
                    let _ = changes.send(ChangeEvent {
                        kind: event.kind,
                        paths: event.paths,
                    });
                }
                Ok(_) => {}
                Err(e) => warn!("Watch error: {}", e),
            }
        })
        .map_err(watch_error)?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(watch_error)?;

        Ok(Self {
            root: root.to_path_buf(),
            _watcher: watcher,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
