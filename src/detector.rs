//! # Change Detector
//!
//! Turns directory snapshots into [`SyncEvent`]s by diffing them against the
//! shared [`KnownFiles`] map.
//!
//! A cycle classifies every file in the current snapshot as new or modified
//! (absent from the map, or an mtime strictly greater than the recorded one)
//! and every recorded name missing from the snapshot as deleted. Writes that
//! happen between two cycles collapse into one `Create` carrying whatever the
//! file holds when it is read.
//!
//! Files too large for one datagram are recognised from their scanned size
//! and never read.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::directory::{self, SyncDirectory};
use crate::event::SyncEvent;
use crate::known_files::{FileTimes, KnownFiles, Mtime};
use crate::protocol;

/// Classification of one name after comparing a snapshot to known state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    /// New file, or a file whose mtime moved forward.
    Changed { name: String, mtime: Mtime },
    /// A known file no longer present.
    Removed { name: String },
}

/// Compare a directory snapshot to known state.
///
/// Changes come first, then removals, each in filename order.
pub fn diff(known: &FileTimes, current: &FileTimes) -> Vec<FileChange> {
    let changed = current
        .iter()
        .filter(|(name, mtime)| known.get(*name).map_or(true, |seen| *mtime > seen))
        .map(|(name, mtime)| FileChange::Changed {
            name: name.clone(),
            mtime: *mtime,
        });

    let removed = known
        .keys()
        .filter(|name| !current.contains_key(*name))
        .map(|name| FileChange::Removed { name: name.clone() });

    changed.chain(removed).collect()
}

/// Outcome of one detection cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollOutcome {
    /// Events to broadcast, creates before deletes.
    pub events: Vec<SyncEvent>,
    /// Changed files that cannot fit in one datagram. Recorded as known but
    /// not announced.
    pub oversized: Vec<String>,
}

impl PollOutcome {
    /// Number of local changes found, announced or not.
    pub fn detected(&self) -> usize {
        self.events.len() + self.oversized.len()
    }
}

/// Periodic local change detection against the shared known-state map.
pub struct ChangeDetector {
    dir: Arc<dyn SyncDirectory>,
    known: KnownFiles,
}

impl ChangeDetector {
    pub fn new(dir: Arc<dyn SyncDirectory>, known: KnownFiles) -> Self {
        Self { dir, known }
    }

    /// Seed known state from the directory as it is now, without emitting
    /// events. Files present at startup are treated as already in sync.
    ///
    /// Returns the number of files recorded.
    pub async fn baseline(&self) -> std::io::Result<usize> {
        let mut known = self.known.lock().await;
        let current = self.dir.scan().await?;
        let count = current.len();

        known.extend(directory::mtimes(&current));

        info!(
            "Baseline scan of {} complete. Known files: {:?}",
            self.dir.root().display(),
            known.keys().collect::<Vec<_>>()
        );
        Ok(count)
    }

    /// Run one detection cycle and return the events to broadcast.
    pub async fn poll(&self) -> Vec<SyncEvent> {
        self.poll_cycle().await.events
    }

    /// Run one detection cycle.
    ///
    /// A failed listing skips the cycle. A file that cannot be read is left
    /// unrecorded so the next cycle tries again.
    pub async fn poll_cycle(&self) -> PollOutcome {
        // Held for the whole cycle so a concurrent remote apply is either
        // fully visible or not started.
        let mut known = self.known.lock().await;

        let current = match self.dir.scan().await {
            Ok(current) => current,
            Err(e) => {
                warn!("Failed to list {}: {}", self.dir.root().display(), e);
                return PollOutcome::default();
            }
        };

        let mut outcome = PollOutcome::default();
        for change in diff(&known, &directory::mtimes(&current)) {
            match change {
                FileChange::Changed { name, mtime } => {
                    let size = current.get(&name).map_or(0, |stat| stat.size);
                    if !protocol::fits_in_datagram(&name, size) {
                        warn!(
                            "{} is {} bytes, too large for one datagram; not announcing it",
                            name, size
                        );
                        known.insert(name.clone(), mtime);
                        outcome.oversized.push(name);
                        continue;
                    }
                    match self.dir.read_file(&name).await {
                        Ok(content) => {
                            info!("Detected new or modified file: {}", name);
                            known.insert(name.clone(), mtime);
                            outcome.events.push(SyncEvent::Create {
                                filename: name,
                                content,
                            });
                        }
                        Err(e) => {
                            error!("Failed to read {} for broadcast: {}", name, e);
                        }
                    }
                }
                FileChange::Removed { name } => {
                    info!("Detected deleted file: {}", name);
                    known.remove(&name);
                    outcome.events.push(SyncEvent::Delete { filename: name });
                }
            }
        }

        if outcome.detected() == 0 {
            debug!("No local changes in {}", self.dir.root().display());
        }
        outcome
    }
}
