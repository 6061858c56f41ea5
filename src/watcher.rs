//! # Directory Watcher
//!
//! Optional low-latency trigger for the poll loop. The watcher never decides
//! what changed; it only asks for a detection cycle to run before the next
//! tick. The poll loop waits for nudges to stop arriving before it scans, so
//! a burst of writes still yields one event.

use anyhow::Result;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{info, warn};

/// Keeps the underlying OS watch alive; dropping it stops the nudges.
pub struct DirectoryWatcher {
    _watcher: RecommendedWatcher,
    path: PathBuf,
}

impl DirectoryWatcher {
    pub fn start(path: &Path, nudge: Arc<Notify>) -> Result<Self> {
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) if is_relevant(&event.kind) => nudge.notify_one(),
            Ok(_) => {}
            Err(e) => warn!("File system watch error: {}", e),
        })?;

        watcher.watch(path, RecursiveMode::NonRecursive)?;
        info!("Watching {} for activity", path.display());

        Ok(Self {
            _watcher: watcher,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn is_relevant(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}
