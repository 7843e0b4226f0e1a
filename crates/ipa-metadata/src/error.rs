//! Metadata extraction errors.

/// Errors produced while extracting package metadata.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("package not found: {0}")]
    NotFound(String),

    /// The archive lacks the expected `Payload/<name>.app` structure.
    #[error("malformed archive: {0}")]
    MalformedArchive(String),

    #[error("metadata descriptor missing in {0}")]
    MissingMetadata(String),

    #[error("unreadable metadata: {0}")]
    UnreadableMetadata(String),

    #[error("{op} failed: {source}")]
    Storage {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("base64 error: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl MetadataError {
    pub(crate) fn storage(op: &'static str) -> impl FnOnce(std::io::Error) -> Self {
        move |source| Self::Storage { op, source }
    }
}
