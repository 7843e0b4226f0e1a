//! Error types for the file server.

use std::net::SocketAddr;

use crate::LeaseError;

/// Errors produced by the file server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listening socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("server already running")]
    AlreadyRunning,

    #[error("execution lease unavailable: {0}")]
    Lease(#[source] LeaseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
