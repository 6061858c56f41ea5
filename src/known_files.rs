//! # Known-State Map
//!
//! `KnownFiles` records the last modification time this node has observed for
//! every file in the sync directory, whether the observation came from a local
//! scan or from writing a file received from a peer.
//!
//! It is the only state shared between the poll loop and the receive loop.
//! Both take the lock for their whole check-then-update sequence: the detector
//! holds it across listing, diffing and content reads, and the applier holds
//! it across the file write and the map update. That is what stops a freshly
//! applied remote file from being seen as unknown and broadcast straight back.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// Modification time in milliseconds since the Unix epoch.
///
/// Staleness is a strict `>` at this resolution, so a rewrite that keeps the
/// same millisecond mtime goes unnoticed.
pub type Mtime = u64;

/// Filename to mtime, ordered by name.
pub type FileTimes = BTreeMap<String, Mtime>;

/// Cloneable handle to the shared known-state map.
#[derive(Clone, Debug, Default)]
pub struct KnownFiles {
    inner: Arc<Mutex<FileTimes>>,
}

impl KnownFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the map for a critical section.
    pub async fn lock(&self) -> MutexGuard<'_, FileTimes> {
        self.inner.lock().await
    }

    /// Copy of the current contents.
    pub async fn snapshot(&self) -> FileTimes {
        self.inner.lock().await.clone()
    }

    pub async fn get(&self, name: &str) -> Option<Mtime> {
        self.inner.lock().await.get(name).copied()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Mtime)> for KnownFiles {
    fn from_iter<I: IntoIterator<Item = (S, Mtime)>>(iter: I) -> Self {
        let map = iter.into_iter().map(|(name, mtime)| (name.into(), mtime)).collect();
        Self {
            inner: Arc::new(Mutex::new(map)),
        }
    }
}
