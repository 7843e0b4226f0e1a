//! Upload sessions with pause, resume and cancel.
//!
//! An [`UploadSession`] wraps one in-flight upload driven by a
//! [`TransferHandle`]. The handle reports through [`TransferEvent`]s; the
//! session caches the latest progress and notifies its observers.
//! [`HttpUploadHandle`] is the multipart/form-data implementation.

mod handle;
mod http;
mod session;

pub use handle::{TransferEvent, TransferHandle, TransferOutcome};
pub use http::{HttpUploadHandle, UploadRequest, upload_file};
pub use session::{CompletionCallback, PauseCallback, ProgressCallback, UploadSession};

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
