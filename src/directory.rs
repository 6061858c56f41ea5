//! # Sync Directory Access
//!
//! The filesystem seam shared by the change detector and the replication
//! applier. Only regular files directly inside the sync directory take part
//! in replication; subdirectories are ignored.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::UNIX_EPOCH;
use tokio::fs;
use tracing::{debug, warn};

use crate::known_files::{FileTimes, Mtime};

/// Prefix of the applier's in-flight files. Names starting with it are
/// never scanned.
pub const TEMP_PREFIX: &str = ".peersync-tmp-";

/// What one scan records about a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub mtime: Mtime,
    pub size: u64,
}

/// Result of one directory scan, in filename order.
pub type Snapshot = BTreeMap<String, FileStat>;

/// Project a snapshot onto modification times.
pub fn mtimes(snapshot: &Snapshot) -> FileTimes {
    snapshot
        .iter()
        .map(|(name, stat)| (name.clone(), stat.mtime))
        .collect()
}

/// Operations the sync loops need from the directory being replicated.
#[async_trait]
pub trait SyncDirectory: Send + Sync {
    /// Directory being replicated, for log messages.
    fn root(&self) -> &Path;

    /// List the regular files currently present with their mtimes and sizes.
    async fn scan(&self) -> io::Result<Snapshot>;

    /// Read the whole content of one file.
    async fn read_file(&self, name: &str) -> io::Result<Bytes>;

    /// Replace (or create) one file and return its resulting mtime.
    async fn write_file(&self, name: &str, content: &[u8]) -> io::Result<Mtime>;

    /// Remove one file. Returns `false` if it was already absent.
    async fn remove_file(&self, name: &str) -> io::Result<bool>;
}

/// [`SyncDirectory`] backed by a real directory on disk.
#[derive(Debug)]
pub struct LocalDirectory {
    root: PathBuf,
    next_temp: AtomicU64,
    unsupported_names: Mutex<HashSet<OsString>>,
}

impl LocalDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            next_temp: AtomicU64::new(0),
            unsupported_names: Mutex::new(HashSet::new()),
        }
    }

    fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Fixed-length temp name, so any name that fits the filesystem can be
    /// written.
    fn next_temp_path(&self) -> PathBuf {
        let id = self.next_temp.fetch_add(1, Ordering::Relaxed);
        self.root
            .join(format!("{}{:08x}-{:016x}", TEMP_PREFIX, std::process::id(), id))
    }

    /// Returns `true` the first time a given unsupported name is seen.
    fn first_sighting(&self, raw: &OsString) -> bool {
        self.unsupported_names.lock().insert(raw.clone())
    }
}

#[async_trait]
impl SyncDirectory for LocalDirectory {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn scan(&self) -> io::Result<Snapshot> {
        let mut entries = fs::read_dir(&self.root).await?;
        let mut files = Snapshot::new();

        while let Some(entry) = entries.next_entry().await? {
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    if self.first_sighting(&raw) {
                        warn!("Skipping file with non UTF-8 name: {:?}", raw);
                    } else {
                        debug!("Skipping file with non UTF-8 name: {:?}", raw);
                    }
                    continue;
                }
            };
            if is_temp_name(&name) {
                continue;
            }

            // Follows symlinks, so a link to a regular file counts as a file.
            let metadata = match fs::metadata(entry.path()).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    debug!("Entry {} vanished during scan: {}", name, e);
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }

            files.insert(
                name,
                FileStat {
                    mtime: mtime_of(&metadata)?,
                    size: metadata.len(),
                },
            );
        }

        Ok(files)
    }

    async fn read_file(&self, name: &str) -> io::Result<Bytes> {
        fs::read(self.path_of(name)).await.map(Bytes::from)
    }

    async fn write_file(&self, name: &str, content: &[u8]) -> io::Result<Mtime> {
        let target = self.path_of(name);
        let temp = self.next_temp_path();

        // Write beside the target and rename so readers never see a partial file.
        if let Err(e) = fs::write(&temp, content).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e);
        }
        if let Err(e) = fs::rename(&temp, &target).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e);
        }

        let metadata = fs::metadata(&target).await?;
        mtime_of(&metadata)
    }

    async fn remove_file(&self, name: &str) -> io::Result<bool> {
        match fs::remove_file(self.path_of(name)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Milliseconds since the Unix epoch; pre-epoch times clamp to zero.
pub fn mtime_of(metadata: &std::fs::Metadata) -> io::Result<Mtime> {
    let modified = metadata.modified()?;
    Ok(modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as Mtime)
        .unwrap_or(0))
}

fn is_temp_name(name: &str) -> bool {
    name.starts_with(TEMP_PREFIX)
}
