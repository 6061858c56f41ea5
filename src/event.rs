use bytes::Bytes;
use std::fmt;

/// A single replicated change to the sync directory.
///
/// Produced by the change detector for local activity and by the protocol
/// decoder for remote activity. Carries no identity; two events with the same
/// fields are interchangeable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A file appeared or was modified. `content` is the whole file.
    Create { filename: String, content: Bytes },
    /// A file was removed.
    Delete { filename: String },
}

impl SyncEvent {
    pub fn create(filename: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self::Create {
            filename: filename.into(),
            content: content.into(),
        }
    }

    pub fn delete(filename: impl Into<String>) -> Self {
        Self::Delete {
            filename: filename.into(),
        }
    }

    pub fn filename(&self) -> &str {
        match self {
            Self::Create { filename, .. } | Self::Delete { filename } => filename,
        }
    }
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create { filename, content } => {
                write!(f, "CREATE {} ({} bytes)", filename, content.len())
            }
            Self::Delete { filename } => write!(f, "DELETE {}", filename),
        }
    }
}
