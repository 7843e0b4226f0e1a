//! Shared data model for the appdb local package transfer subsystem.
//!
//! Types in this crate cross component boundaries: the file store hands
//! [`ManagedFile`] values to the UI and the server, and the upload session
//! publishes [`TransferProgress`] snapshots to its observers.

pub mod constants;
pub mod size;
pub mod types;

pub use size::human_readable_size;
pub use types::{ManagedFile, TransferProgress, UploadState};
