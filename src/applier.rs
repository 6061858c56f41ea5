//! # Replication Applier
//!
//! Applies events received from peers to the local sync directory and records
//! the outcome in [`KnownFiles`], so the next detection cycle sees the file as
//! already known and does not send it back out.

use std::io;
use std::sync::Arc;
use tracing::{error, info};

use crate::directory::SyncDirectory;
use crate::event::SyncEvent;
use crate::known_files::KnownFiles;

pub struct ReplicationApplier {
    dir: Arc<dyn SyncDirectory>,
    known: KnownFiles,
}

impl ReplicationApplier {
    pub fn new(dir: Arc<dyn SyncDirectory>, known: KnownFiles) -> Self {
        Self { dir, known }
    }

    /// Apply one remote event. Failures are logged and the event dropped;
    /// known state is only touched when the filesystem change succeeded.
    pub async fn apply(&self, event: &SyncEvent) -> io::Result<()> {
        let result = match event {
            SyncEvent::Create { filename, content } => self.apply_create(filename, content).await,
            SyncEvent::Delete { filename } => self.apply_delete(filename).await,
        };

        if let Err(e) = &result {
            error!("Failed to apply remote {}: {}", event, e);
        }
        result
    }

    /// Write `content` to the sync directory and record its new mtime.
    pub async fn apply_create(&self, filename: &str, content: &[u8]) -> io::Result<()> {
        let mut known = self.known.lock().await;

        let mtime = self.dir.write_file(filename, content).await?;
        known.insert(filename.to_string(), mtime);

        info!(
            "Received file saved: {} ({} bytes)",
            self.dir.root().join(filename).display(),
            content.len()
        );
        Ok(())
    }

    /// Remove a file if present and forget it. Absence is not an error.
    pub async fn apply_delete(&self, filename: &str) -> io::Result<()> {
        let mut known = self.known.lock().await;

        let removed = self.dir.remove_file(filename).await?;
        known.remove(filename);

        if removed {
            info!("Remote deletion applied: {}", filename);
        } else {
            info!("Remote deletion of {} ignored, file not present", filename);
        }
        Ok(())
    }
}
