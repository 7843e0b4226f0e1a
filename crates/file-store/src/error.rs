//! Store error types.

use std::path::{Path, PathBuf};

/// Errors produced by the file store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A filesystem operation failed for reasons outside the caller's control.
    #[error("{op} failed for {}: {source}", path.display())]
    Storage {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid file name: {0}")]
    InvalidName(String),

    #[error("file not found: {0}")]
    NotFound(String),
}

impl StoreError {
    pub(crate) fn storage(op: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Storage {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Returns the underlying I/O error kind for storage faults.
    pub fn io_kind(&self) -> Option<std::io::ErrorKind> {
        match self {
            Self::Storage { source, .. } => Some(source.kind()),
            _ => None,
        }
    }
}
